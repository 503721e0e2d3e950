//! A client library for Cosmos SDK chains: key management, address
//! encoding, transaction construction, gas simulation, signing (direct and
//! legacy amino-json), broadcast with inclusion tracking, and fee grant
//! based signer rotation.
//!
//! One [`ChainClient`] is built per chain from a [`ChainClientConfig`];
//! multiple clients with different bech32 prefixes can coexist in the same
//! process.
pub extern crate cosmrs;

pub mod account;
pub mod address;
pub mod chain;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod feegrant;
pub mod grpc;
pub mod keyring;
pub mod retry;
pub mod rpc;
pub mod tx;

pub use crate::{
    chain::{ChainClientConfig, SignMode},
    client::ChainClient,
    config::Config,
    error::ChainClientError,
    keyring::Keyring,
    tx::{TxFactory, TxResponse, UnsignedTx},
};
