//! Gas estimation through the tx service's ABCI simulate endpoint.
//!
//! The simulated tx carries the signer's real public key and sequence but an
//! empty signature and a zero fee, which is what the SDK's ante handlers
//! accept in simulate-only execution.
use cosmos_sdk_proto::cosmos::tx::v1beta1::{
    mode_info, AuthInfo, Fee, ModeInfo, SignerInfo, SimulateRequest, SimulateResponse, Tx, TxBody,
};
use cosmrs::{tx::Body, Any};
use prost::Message;
use tendermint_rpc::Client;

use crate::{
    chain::SignMode,
    error::{ChainClientError, RpcError, TxError},
    retry::with_retry,
    rpc::RpcHttpClient,
    tx::TxFactory,
};

const SIMULATE_QUERY_PATH: &str = "/cosmos.tx.v1beta1.Service/Simulate";

/// Simulates the tx body against the node and returns the adjusted gas
/// amount: simulated usage scaled by the configured gas adjustment, floored
/// at the configured minimum. Retried on transient node failures.
pub async fn simulate_gas(
    rpc: &RpcHttpClient,
    factory: &TxFactory,
    body: &Body,
    public_key: &Any,
) -> Result<u64, ChainClientError> {
    let tx_bytes = simulate_tx_bytes(factory, body, public_key);
    let simulated = with_retry(|| simulate_once(rpc, tx_bytes.clone()), "tx simulation").await?;

    Ok(factory.adjust_gas(simulated))
}

async fn simulate_once(rpc: &RpcHttpClient, tx_bytes: Vec<u8>) -> Result<u64, ChainClientError> {
    #[allow(deprecated)]
    let request = SimulateRequest { tx: None, tx_bytes };
    let response = rpc
        .abci_query(
            Some(SIMULATE_QUERY_PATH.to_string()),
            request.encode_to_vec(),
            None,
            false,
        )
        .await
        .map_err(RpcError::from)?;

    if response.code.is_err() {
        return Err(TxError::SimulateFailed {
            code: response.code.value(),
            codespace: response.codespace,
            log: response.log,
        }
        .into());
    }

    let response =
        SimulateResponse::decode(response.value.as_slice()).map_err(|err| {
            ChainClientError::Tx(TxError::Serialization(err.to_string()))
        })?;
    let gas_info = response.gas_info.ok_or_else(|| {
        ChainClientError::Tx(TxError::Serialization(
            "simulate response has no gas info".to_string(),
        ))
    })?;

    Ok(gas_info.gas_used)
}

fn simulate_tx_bytes(factory: &TxFactory, body: &Body, public_key: &Any) -> Vec<u8> {
    let mode = match factory.sign_mode {
        SignMode::Direct => cosmos_sdk_proto::cosmos::tx::signing::v1beta1::SignMode::Direct,
        SignMode::AminoJson => {
            cosmos_sdk_proto::cosmos::tx::signing::v1beta1::SignMode::LegacyAminoJson
        }
    };
    let signer_info = SignerInfo {
        public_key: Some(public_key.clone()),
        mode_info: Some(ModeInfo {
            sum: Some(mode_info::Sum::Single(mode_info::Single {
                mode: mode as i32,
            })),
        }),
        sequence: factory.sequence,
    };
    let auth_info = AuthInfo {
        signer_infos: vec![signer_info],
        fee: Some(Fee {
            amount: vec![],
            gas_limit: 0,
            payer: String::new(),
            granter: String::new(),
        }),
        tip: None,
    };

    let tx = Tx {
        body: Some(TxBody::from(body.clone())),
        auth_info: Some(auth_info),
        // ante handlers expect one (empty) signature per signer
        signatures: vec![vec![]],
    };

    tx.encode_to_vec()
}
