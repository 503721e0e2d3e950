//! Error types, layered the same way as the public API: one umbrella enum for
//! [`ChainClient`](crate::client::ChainClient) operations, with lower level enums
//! for each subsystem.
use std::time::Duration;

use cosmrs::ErrorReport;
use thiserror::Error;

/// Higher level error for anything that can go wrong during a client operation
#[derive(Debug, Error)]
pub enum ChainClientError {
    #[error("{0}")]
    Account(#[from] AccountError),
    #[error("{0}")]
    Address(#[from] AddressError),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    FeeGrant(#[from] FeeGrantError),
    #[error("{0}")]
    Grpc(#[from] GrpcError),
    #[error("{0}")]
    Keyring(#[from] KeyStoreError),
    #[error("error during RPC call: {0}")]
    Rpc(#[from] RpcError),
    #[error("{0}")]
    Tx(#[from] TxError),
}

// Lower level errors; should be used by higher level errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading file: {0}")]
    FileIO(String),
    #[error("error parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("account prefix must not be empty")]
    EmptyPrefix,
    #[error("invalid endpoint '{0}': {1}")]
    InvalidEndpoint(String, url::ParseError),
    #[error("invalid timeout '{0}': {1}")]
    InvalidTimeout(String, humantime::DurationError),
    #[error("unrecognized sign mode '{0}', expected 'direct' or 'amino-json'")]
    UnrecognizedSignMode(String),
    #[error("no chain '{0}' in config")]
    UnknownChain(String),
}

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("error creating or opening keystore: {0}")]
    CouldNotOpenOrCreateKeyStore(String),
    #[error("key name '{0}' already exists.")]
    Exists(String),
    #[error("key name '{0}' does not exist.")]
    DoesNotExist(String),
    #[error("invalid key name '{0}'")]
    InvalidName(String),
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("error deriving key: {0}")]
    Derivation(String),
    #[error("unable to store key: {0}")]
    UnableToStoreKey(String),
    #[error("unable to delete key: {0}")]
    UnableToDeleteKey(String),
    #[error("unable to retrieve key: {0}")]
    UnableToRetrieveKey(String),
    #[error("error reading file: {0}")]
    FileIO(String),
}

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("bech32 error: {0}")]
    Bech32(#[from] bech32::Error),
    #[error("invalid address: expected prefix '{expected}', found '{found}'")]
    Prefix { expected: String, found: String },
    #[error("invalid address: expected {expected} bytes, found {found}")]
    Length { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account '{0}' not found on chain")]
    NotFound(String),
    #[error("empty account data: {0}")]
    Empty(String),
    #[error("error decoding account data: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("unsupported account type '{0}'")]
    UnsupportedType(String),
    #[error("{0}")]
    PubKey(#[from] ErrorReport),
}

#[derive(Debug, Error)]
pub enum GrpcError {
    #[error("{0}")]
    Connection(#[from] tonic::transport::Error),
    #[error("{0}")]
    MissingEndpoint(String),
    #[error("{0}")]
    Request(#[from] tonic::Status),
    #[error("unhealthy gRPC endpoint: {0}")]
    UnhealthyEndpoint(String),
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{0}")]
    MissingEndpoint(String),
    #[error("tendermint rpc error: {0}")]
    Tendermint(#[from] tendermint_rpc::Error),
    #[error("unhealthy RPC endpoint: {0}")]
    UnhealthyEndpoint(String),
}

#[derive(Debug, Error)]
pub enum TxError {
    #[error("address error: {0}")]
    Address(String),
    #[error("parsing error: {0}")]
    FeeParsing(#[from] eyre::Report),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("error converting types: {0}")]
    TypeConversion(String),
    #[error("error signing message: {0}")]
    Signing(String),
    #[error("transaction is already signed")]
    AlreadySigned,
    #[error("simulation failed with code {code} ({codespace}): {log}")]
    SimulateFailed {
        code: u32,
        codespace: String,
        log: String,
    },
    #[error("error broadcasting message: {0}")]
    Broadcast(String),
    #[error("timed out after waiting {timeout:?} for tx {hash} to be included in a block")]
    BroadcastTimeout { hash: String, timeout: Duration },
    #[error(
        "timed out after waiting {timeout:?} for tx {hash}: last lookup error: {last_error}"
    )]
    AwaitTimeout {
        hash: String,
        timeout: Duration,
        last_error: String,
    },
}

#[derive(Debug, Error)]
pub enum FeeGrantError {
    #[error("fee grants are not configured for this chain")]
    NotConfigured,
    #[error("fee grant configuration has no granter key")]
    NoGranter,
    #[error("fee grant configuration has no managed grantees")]
    NoGrantees,
    #[error("error handling grantee key: {0}")]
    KeyHandling(String),
}
