//! Tendermint RPC plumbing
use tendermint_rpc::{Client, HttpClient};

use crate::error::RpcError;

pub type RpcHttpClient = HttpClient;

/// Constructs a Tendermint RPC client over HTTP
pub fn new_http_client(address: &str) -> Result<RpcHttpClient, RpcError> {
    if address.is_empty() {
        return Err(RpcError::MissingEndpoint(
            "no RPC address in chain config".to_string(),
        ));
    }

    Ok(HttpClient::new(address)?)
}

/// Errors if the node is catching up or unreachable
pub async fn health_check(client: &RpcHttpClient) -> Result<(), RpcError> {
    let status = client.status().await?;
    if status.sync_info.catching_up {
        return Err(RpcError::UnhealthyEndpoint(
            "node is catching up".to_string(),
        ));
    }

    Ok(())
}

/// The latest committed block height according to the node
pub async fn latest_height(client: &RpcHttpClient) -> Result<u64, RpcError> {
    let status = client.status().await?;

    Ok(status.sync_info.latest_block_height.value())
}
