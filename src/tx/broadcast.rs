//! Broadcast and inclusion tracking.
//!
//! Transactions are broadcast sync: the node runs CheckTx and returns before
//! the tx is committed, so inclusion is confirmed by polling the tx endpoint
//! until the hash is found or the block timeout elapses. A CheckTx rejection
//! from a well-known SDK pre-inclusion check is reported as a `TxResponse`
//! carrying the error code rather than as an error, matching how the SDK's
//! own client surfaces them. Broadcast is never retried; a tx that reached
//! the mempool once must not be submitted twice.
use std::time::Duration;

use async_trait::async_trait;
use cosmos_sdk_proto::cosmos::tx::v1beta1::GetTxResponse;
use cosmrs::Any;
use tendermint::Hash;
use tendermint_rpc::{
    endpoint::{broadcast::tx_sync, tx},
    Client,
};
use tokio::time::{sleep, timeout, Instant};

use crate::{
    error::{ChainClientError, GrpcError, RpcError, TxError},
    grpc::GrpcClient,
    rpc::RpcHttpClient,
};

const BROADCAST_POLL_INTERVAL: Duration = Duration::from_millis(100);

const SDK_CODESPACE: &str = "sdk";

/// SDK error codes that reject a tx before inclusion: out of gas (11),
/// insufficient fee (13), tx already in mempool cache (19), mempool full
/// (20), tx too large (21), invalid gas adjustment (25), timeout height
/// reached (30), wrong sequence (32)
const PRE_INCLUSION_REJECT_CODES: [u32; 8] = [11, 13, 19, 20, 21, 25, 30, 32];

/// Result of a broadcast, reported whether or not the tx succeeded. A
/// nonzero `code` means the tx was rejected or failed execution; `raw_log`
/// carries the node's explanation.
#[derive(Clone, Debug, Default)]
pub struct TxResponse {
    pub txhash: String,
    pub code: u32,
    pub codespace: String,
    pub height: u64,
    pub raw_log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub tx: Option<Any>,
}

/// The two node calls broadcast needs, factored out so tests can drive the
/// flow without a node
#[async_trait]
pub trait BroadcastClient {
    async fn broadcast_tx_sync(&self, tx: Vec<u8>) -> Result<tx_sync::Response, RpcError>;

    async fn tx(&self, hash: Hash) -> Result<tx::Response, RpcError>;
}

#[async_trait]
impl BroadcastClient for RpcHttpClient {
    async fn broadcast_tx_sync(&self, tx: Vec<u8>) -> Result<tx_sync::Response, RpcError> {
        Ok(Client::broadcast_tx_sync(self, tx).await?)
    }

    async fn tx(&self, hash: Hash) -> Result<tx::Response, RpcError> {
        Ok(Client::tx(self, hash, false).await?)
    }
}

/// Broadcasts an encoded tx and waits for it to appear in a block.
///
/// Dropping the returned future cancels the wait but not the tx itself:
/// once CheckTx has accepted it, the tx may still be committed.
pub async fn broadcast_tx<C: BroadcastClient>(
    client: &C,
    tx_bytes: Vec<u8>,
    wait_timeout: Duration,
) -> Result<TxResponse, ChainClientError> {
    let sync = client.broadcast_tx_sync(tx_bytes).await?;
    let hash = sync.hash;

    if sync.code.is_err() {
        let code = sync.code.value();
        if sync.codespace == SDK_CODESPACE && PRE_INCLUSION_REJECT_CODES.contains(&code) {
            return Ok(TxResponse {
                txhash: hash.to_string(),
                code,
                codespace: sync.codespace,
                raw_log: sync.log,
                ..Default::default()
            });
        }
        // other CheckTx codes are module-specific and the tx may still be
        // gossiped by other nodes, so fall through and poll for inclusion
    }

    let committed = timeout(wait_timeout, wait_for_inclusion(client, hash)).await;

    match committed {
        Ok(response) => response,
        Err(_) => Err(TxError::BroadcastTimeout {
            hash: hash.to_string(),
            timeout: wait_timeout,
        }
        .into()),
    }
}

async fn wait_for_inclusion<C: BroadcastClient>(
    client: &C,
    hash: Hash,
) -> Result<TxResponse, ChainClientError> {
    loop {
        // the endpoint errors until the tx is committed
        if let Ok(response) = client.tx(hash).await {
            return Ok(committed_response(response));
        }
        sleep(BROADCAST_POLL_INTERVAL).await;
    }
}

fn committed_response(response: tx::Response) -> TxResponse {
    TxResponse {
        txhash: response.hash.to_string(),
        code: response.tx_result.code.value(),
        codespace: response.tx_result.codespace.clone(),
        height: response.height.value(),
        raw_log: response.tx_result.log.clone(),
        gas_wanted: response.tx_result.gas_wanted,
        gas_used: response.tx_result.gas_used,
        tx: Some(Any {
            type_url: "/cosmos.tx.v1beta1.Tx".to_string(),
            value: response.tx,
        }),
    }
}

/// Polls the tx service until the given hash is committed or the timeout
/// elapses. Useful for confirming txs broadcast elsewhere. The timeout error
/// carries the last lookup failure so callers can tell "not yet committed"
/// from "node unreachable".
pub async fn await_tx(
    grpc: &GrpcClient,
    hash: &str,
    wait_timeout: Duration,
) -> Result<GetTxResponse, ChainClientError> {
    poll_get_tx(|| grpc.get_tx(hash), hash, wait_timeout).await
}

async fn poll_get_tx<F, Fut>(
    mut lookup: F,
    hash: &str,
    wait_timeout: Duration,
) -> Result<GetTxResponse, ChainClientError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<GetTxResponse, GrpcError>>,
{
    let deadline = Instant::now() + wait_timeout;
    let mut last_error;

    loop {
        match lookup().await {
            Ok(response) => return Ok(response),
            Err(err) => last_error = err.to_string(),
        }
        if Instant::now() >= deadline {
            return Err(TxError::AwaitTimeout {
                hash: hash.to_string(),
                timeout: wait_timeout,
                last_error,
            }
            .into());
        }
        sleep(BROADCAST_POLL_INTERVAL).await;
    }
}
