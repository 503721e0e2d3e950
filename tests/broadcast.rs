use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use spyglass::error::{ChainClientError, RpcError, TxError};
use spyglass::tx::broadcast::{broadcast_tx, BroadcastClient};
use tendermint::abci::types::ExecTxResult;
use tendermint::abci::Code;
use tendermint::Hash;
use tendermint_rpc::endpoint::{broadcast::tx_sync, tx};

const WAIT: Duration = Duration::from_secs(10);

fn test_hash() -> Hash {
    Hash::Sha256([7u8; 32])
}

fn sync_response(code: u32, codespace: &str) -> tx_sync::Response {
    tx_sync::Response {
        codespace: codespace.to_string(),
        code: Code::from(code),
        data: Default::default(),
        log: "checktx log".to_string(),
        hash: test_hash(),
    }
}

fn committed_response(code: u32) -> tx::Response {
    tx::Response {
        hash: test_hash(),
        height: 1234u32.into(),
        index: 0,
        tx_result: ExecTxResult {
            code: Code::from(code),
            log: "delivertx log".to_string(),
            gas_wanted: 200_000,
            gas_used: 180_000,
            ..Default::default()
        },
        tx: vec![0xde, 0xad],
        proof: None,
    }
}

/// Node double: fails the first `polls_before_found` inclusion polls, then
/// reports the committed tx (or never, if there is none)
struct MockNode {
    sync: Result<tx_sync::Response, ()>,
    committed: Option<tx::Response>,
    polls_before_found: u32,
    polls: AtomicU32,
}

impl MockNode {
    fn new(sync: tx_sync::Response, committed: Option<tx::Response>) -> Self {
        MockNode {
            sync: Ok(sync),
            committed,
            polls_before_found: 0,
            polls: AtomicU32::new(0),
        }
    }

    fn unreachable() -> Self {
        MockNode {
            sync: Err(()),
            committed: None,
            polls_before_found: 0,
            polls: AtomicU32::new(0),
        }
    }

    fn poll_count(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BroadcastClient for MockNode {
    async fn broadcast_tx_sync(&self, _tx: Vec<u8>) -> Result<tx_sync::Response, RpcError> {
        match &self.sync {
            Ok(response) => Ok(response.clone()),
            Err(()) => Err(RpcError::UnhealthyEndpoint("connection refused".to_string())),
        }
    }

    async fn tx(&self, hash: Hash) -> Result<tx::Response, RpcError> {
        assert_eq!(hash, test_hash());
        let polls = self.polls.fetch_add(1, Ordering::SeqCst);

        match &self.committed {
            Some(response) if polls >= self.polls_before_found => Ok(response.clone()),
            _ => Err(RpcError::UnhealthyEndpoint("tx not found".to_string())),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn committed_tx_is_reported() {
    let mut node = MockNode::new(sync_response(0, ""), Some(committed_response(0)));
    node.polls_before_found = 3;

    let response = broadcast_tx(&node, vec![1, 2, 3], WAIT).await.unwrap();

    assert_eq!(response.txhash, test_hash().to_string());
    assert_eq!(response.code, 0);
    assert_eq!(response.height, 1234);
    assert_eq!(response.gas_used, 180_000);
    assert_eq!(response.raw_log, "delivertx log");
    assert_eq!(response.tx.unwrap().value, vec![0xde, 0xad]);
    assert_eq!(node.poll_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn failed_execution_is_reported_not_an_error() {
    let node = MockNode::new(sync_response(0, ""), Some(committed_response(5)));

    let response = broadcast_tx(&node, vec![1], WAIT).await.unwrap();

    // a committed tx that failed execution still comes back as a response
    assert_eq!(response.code, 5);
}

#[tokio::test(start_paused = true)]
async fn sdk_pre_inclusion_reject_short_circuits() {
    // code 32 is the SDK's wrong-sequence check
    let node = MockNode::new(sync_response(32, "sdk"), Some(committed_response(0)));

    let response = broadcast_tx(&node, vec![1], WAIT).await.unwrap();

    assert_eq!(response.code, 32);
    assert_eq!(response.codespace, "sdk");
    assert_eq!(response.raw_log, "checktx log");
    assert_eq!(response.height, 0);
    // no inclusion polling after a pre-inclusion reject
    assert_eq!(node.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn module_checktx_code_still_polls() {
    // code 1 in a module codespace is not a recognized pre-inclusion reject,
    // so the tx is polled for in case another node gossips it through
    let node = MockNode::new(sync_response(1, "wasm"), Some(committed_response(1)));

    let response = broadcast_tx(&node, vec![1], WAIT).await.unwrap();

    assert_eq!(response.code, 1);
    assert!(node.poll_count() > 0);
}

#[tokio::test(start_paused = true)]
async fn inclusion_timeout() {
    let node = MockNode::new(sync_response(0, ""), None);

    let err = broadcast_tx(&node, vec![1], Duration::from_secs(2))
        .await
        .unwrap_err();

    match err {
        ChainClientError::Tx(TxError::BroadcastTimeout { hash, timeout }) => {
            assert_eq!(hash, test_hash().to_string());
            assert_eq!(timeout, Duration::from_secs(2));
        }
        other => panic!("expected broadcast timeout, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn sync_failure_propagates() {
    let node = MockNode::unreachable();

    let err = broadcast_tx(&node, vec![1], WAIT).await.unwrap_err();

    assert!(matches!(err, ChainClientError::Rpc(_)));
    assert_eq!(node.poll_count(), 0);
}
