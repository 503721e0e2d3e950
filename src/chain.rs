//! Per-chain client configuration.
//!
//! One [`ChainClientConfig`] per chain; the value is immutable for the
//! lifetime of a transaction. String-typed fields (timeouts, sign mode, gas
//! prices) are validated up front by [`ChainClientConfig::validate`] so the tx
//! pipeline can rely on the accessors never failing mid-flight.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{address::AddressAlgo, error::ConfigError};

/// HD coin type used for Cosmos chains
pub const COSMOS_COIN_TYPE: u32 = 118;
/// HD coin type used for Ethereum-flavored chains
pub const ETH_COIN_TYPE: u32 = 60;

const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_secs(600);

/// Extra codec flag enabling the ethermint key and account types
pub const ETHERMINT_CODEC: &str = "ethermint";

/// Signing scheme for transactions
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SignMode {
    /// Sign over the deterministic proto encoding of a SignDoc
    #[default]
    Direct,
    /// Sign over the legacy JSON canonicalization of a StdSignDoc
    AminoJson,
}

impl SignMode {
    pub fn parse(s: &str) -> Result<SignMode, ConfigError> {
        match s {
            "" | "direct" => Ok(SignMode::Direct),
            "amino-json" => Ok(SignMode::AminoJson),
            other => Err(ConfigError::UnrecognizedSignMode(other.to_string())),
        }
    }
}

/// Fee grant round-robin state for a chain.
///
/// A single granter key funds a rotating set of managed grantee keys which do
/// the actual signing, so that per-address sequence contention is sharded.
/// Mutated only inside the client's fee grant lock.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FeeGrantConfiguration {
    #[serde(rename = "grantees-wanted")]
    pub grantees_wanted: usize,
    #[serde(rename = "granter-key")]
    pub granter_key: String,
    #[serde(rename = "managed-grantees", default)]
    pub managed_grantees: Vec<String>,
    #[serde(rename = "block-height-verified", default)]
    pub block_height_verified: i64,
    #[serde(rename = "grantee-last-signer-index", default)]
    pub grantee_last_signer_index: usize,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ChainClientConfig {
    /// Default signer key name
    pub key: String,
    #[serde(rename = "chain-id")]
    pub chain_id: String,
    #[serde(rename = "rpc-addr")]
    pub rpc_address: String,
    #[serde(rename = "grpc-addr")]
    pub grpc_address: String,
    #[serde(rename = "account-prefix")]
    pub account_prefix: String,
    #[serde(rename = "keyring-backend", default)]
    pub keyring_backend: String,
    #[serde(rename = "key-directory")]
    pub key_directory: String,
    #[serde(rename = "coin-type", default = "default_coin_type")]
    pub coin_type: u32,
    #[serde(rename = "gas-adjustment")]
    pub gas_adjustment: f64,
    #[serde(rename = "gas-prices")]
    pub gas_prices: String,
    /// Lower bound applied to simulated gas; zero disables the floor
    #[serde(rename = "min-gas-amount", default)]
    pub min_gas_amount: u64,
    /// Timeout for ad-hoc RPC queries, e.g. "20s". Empty uses the default.
    #[serde(rename = "rpc-timeout", default)]
    pub rpc_timeout: String,
    /// Timeout for block inclusion after broadcast, e.g. "10m". Empty uses the default.
    #[serde(rename = "block-timeout", default)]
    pub block_timeout: String,
    /// "direct" or "amino-json". Empty means direct.
    #[serde(rename = "sign-mode", default)]
    pub sign_mode: String,
    #[serde(rename = "output-format", default)]
    pub output_format: String,
    #[serde(rename = "feegrants", default)]
    pub feegrants: Option<FeeGrantConfiguration>,
    /// Extra codec flags, e.g. "ethermint" for eth-secp256k1 keys and accounts
    #[serde(rename = "extra-codecs", default)]
    pub extra_codecs: Vec<String>,
}

fn default_coin_type() -> u32 {
    COSMOS_COIN_TYPE
}

impl ChainClientConfig {
    /// Checks the invariants the tx pipeline relies on: both timeout strings
    /// parse, the endpoints parse as URLs, the account prefix is nonempty and
    /// the sign mode string maps to a recognized mode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }

        self.rpc_timeout()?;
        self.block_timeout()?;
        self.sign_mode()?;

        for endpoint in [&self.rpc_address, &self.grpc_address] {
            if endpoint.is_empty() {
                continue;
            }
            url::Url::parse(endpoint)
                .map_err(|e| ConfigError::InvalidEndpoint(endpoint.clone(), e))?;
        }

        Ok(())
    }

    /// Timeout for ad-hoc queries (default 20s)
    pub fn rpc_timeout(&self) -> Result<Duration, ConfigError> {
        parse_timeout(&self.rpc_timeout, DEFAULT_RPC_TIMEOUT)
    }

    /// Timeout for block inclusion after broadcast (default 10m)
    pub fn block_timeout(&self) -> Result<Duration, ConfigError> {
        parse_timeout(&self.block_timeout, DEFAULT_BLOCK_TIMEOUT)
    }

    pub fn sign_mode(&self) -> Result<SignMode, ConfigError> {
        SignMode::parse(&self.sign_mode)
    }

    /// Address algorithm implied by the extra codec flags
    pub fn address_algo(&self) -> AddressAlgo {
        if self.extra_codecs.iter().any(|c| c == ETHERMINT_CODEC) {
            AddressAlgo::EthSecp256k1
        } else {
            AddressAlgo::Cosmos
        }
    }

    /// HD derivation path for this chain's coin type
    pub fn derivation_path(&self) -> String {
        format!("m/44'/{}'/0'/0/0", self.coin_type)
    }
}

fn parse_timeout(value: &str, default: Duration) -> Result<Duration, ConfigError> {
    if value.is_empty() {
        return Ok(default);
    }

    humantime::parse_duration(value).map_err(|e| ConfigError::InvalidTimeout(value.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChainClientConfig {
        ChainClientConfig {
            key: "default".to_string(),
            chain_id: "cosmoshub-4".to_string(),
            rpc_address: "http://localhost:26657".to_string(),
            grpc_address: "http://localhost:9090".to_string(),
            account_prefix: "cosmos".to_string(),
            gas_adjustment: 1.2,
            gas_prices: "0.025uatom".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn validates_defaults() {
        let config = test_config();
        config.validate().unwrap();

        assert_eq!(config.rpc_timeout().unwrap(), Duration::from_secs(20));
        assert_eq!(config.block_timeout().unwrap(), Duration::from_secs(600));
        assert_eq!(config.sign_mode().unwrap(), SignMode::Direct);
        assert_eq!(config.address_algo(), AddressAlgo::Cosmos);
        assert_eq!(config.derivation_path(), "m/44'/118'/0'/0/0");
    }

    #[test]
    fn parses_timeouts() {
        let mut config = test_config();
        config.rpc_timeout = "5s".to_string();
        config.block_timeout = "2m".to_string();

        assert_eq!(config.rpc_timeout().unwrap(), Duration::from_secs(5));
        assert_eq!(config.block_timeout().unwrap(), Duration::from_secs(120));

        config.block_timeout = "not a duration".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_prefix_and_bad_sign_mode() {
        let mut config = test_config();
        config.account_prefix = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyPrefix)));

        let mut config = test_config();
        config.sign_mode = "textual".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnrecognizedSignMode(_))
        ));

        config.sign_mode = "amino-json".to_string();
        assert_eq!(config.sign_mode().unwrap(), SignMode::AminoJson);
    }

    #[test]
    fn ethermint_codec_selects_eth_algo() {
        let mut config = test_config();
        config.extra_codecs = vec![ETHERMINT_CODEC.to_string()];
        config.coin_type = ETH_COIN_TYPE;

        assert_eq!(config.address_algo(), AddressAlgo::EthSecp256k1);
        assert_eq!(config.derivation_path(), "m/44'/60'/0'/0/0");
    }
}
