//! On-chain account lookups.
//!
//! Accounts are fetched through the auth module's ABCI query endpoint so only
//! an RPC connection is needed. Both vanilla `BaseAccount`s and the
//! `EthAccount` wrapper used by Ethermint chains are understood; everything
//! else is rejected by type URL.
use cosmos_sdk_proto::cosmos::auth::v1beta1::{
    BaseAccount as ProtoBaseAccount, QueryAccountRequest, QueryAccountResponse,
};
use cosmrs::Any;
use prost::Message;
use tendermint_rpc::Client;

use crate::{
    error::{AccountError, ChainClientError, RpcError},
    retry::with_retry,
    rpc::RpcHttpClient,
};

const ACCOUNT_QUERY_PATH: &str = "/cosmos.auth.v1beta1.Query/Account";

const BASE_ACCOUNT_TYPE_URL: &str = "/cosmos.auth.v1beta1.BaseAccount";
const ETHERMINT_ACCOUNT_TYPE_URL: &str = "/ethermint.types.v1.EthAccount";
const INJECTIVE_ACCOUNT_TYPE_URL: &str = "/injective.types.v1beta1.EthAccount";

/// The auth module state that transaction construction needs: the account's
/// number and current sequence, plus the on-chain public key if one has been
/// set by a previous transaction.
#[derive(Clone, Debug)]
pub struct BaseAccount {
    pub address: String,
    pub pub_key: Option<Any>,
    pub account_number: u64,
    pub sequence: u64,
}

impl TryFrom<ProtoBaseAccount> for BaseAccount {
    type Error = AccountError;

    fn try_from(account: ProtoBaseAccount) -> Result<BaseAccount, Self::Error> {
        Ok(BaseAccount {
            address: account.address,
            pub_key: account.pub_key,
            account_number: account.account_number,
            sequence: account.sequence,
        })
    }
}

/// Account wrapper used by Ethermint-based chains. The auth query returns
/// this type instead of a bare `BaseAccount` when the chain runs the EVM
/// module.
#[derive(Clone, PartialEq, Message)]
pub struct EthAccount {
    #[prost(message, optional, tag = "1")]
    pub base_account: Option<ProtoBaseAccount>,
    #[prost(bytes = "vec", tag = "2")]
    pub code_hash: Vec<u8>,
}

/// Fetches the base account for a bech32 address, unwrapping Ethermint
/// account envelopes along the way
pub async fn query_account(
    rpc: &RpcHttpClient,
    address: &str,
) -> Result<BaseAccount, ChainClientError> {
    let request = QueryAccountRequest {
        address: address.to_string(),
    };
    let response = rpc
        .abci_query(
            Some(ACCOUNT_QUERY_PATH.to_string()),
            request.encode_to_vec(),
            None,
            false,
        )
        .await
        .map_err(RpcError::from)?;

    if response.code.is_err() {
        return Err(AccountError::NotFound(format!("{address}: {}", response.log)).into());
    }

    let response = QueryAccountResponse::decode(response.value.as_slice())
        .map_err(AccountError::from)?;
    let any = response
        .account
        .ok_or_else(|| AccountError::Empty(address.to_string()))?;

    decode_account(&any).map_err(Into::into)
}

fn decode_account(any: &Any) -> Result<BaseAccount, AccountError> {
    match any.type_url.as_str() {
        BASE_ACCOUNT_TYPE_URL => {
            ProtoBaseAccount::decode(any.value.as_slice())?.try_into()
        }
        ETHERMINT_ACCOUNT_TYPE_URL | INJECTIVE_ACCOUNT_TYPE_URL => {
            let account = EthAccount::decode(any.value.as_slice())?;
            account
                .base_account
                .ok_or_else(|| AccountError::Empty("eth account has no base account".to_string()))?
                .try_into()
        }
        other => Err(AccountError::UnsupportedType(other.to_string())),
    }
}

/// Errors if the address has no account on chain. Useful before issuing fee
/// grants, which require the grantee account to exist.
pub async fn ensure_exists(rpc: &RpcHttpClient, address: &str) -> Result<(), ChainClientError> {
    query_account(rpc, address).await.map(|_| ())
}

/// The account number and sequence for an address, retried on transient
/// node failures
pub async fn account_number_sequence(
    rpc: &RpcHttpClient,
    address: &str,
) -> Result<(u64, u64), ChainClientError> {
    let account = with_retry(|| query_account(rpc, address), "account query").await?;

    Ok((account.account_number, account.sequence))
}
