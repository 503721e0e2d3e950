//! High level chain client: one instance per chain, owning the keyring, the
//! RPC and gRPC connections and the message codec, and driving the full
//! send pipeline (account resolution, simulation, fee pricing, signing,
//! broadcast).
use std::path::Path;

use cosmos_sdk_proto::cosmos::tx::v1beta1::GetTxResponse;
use cosmrs::Any;
use tokio::sync::Mutex;

use crate::{
    account::{self, BaseAccount},
    chain::{ChainClientConfig, FeeGrantConfiguration},
    codec::Codec,
    error::{ChainClientError, TxError},
    grpc::GrpcClient,
    keyring::Keyring,
    rpc::{self, RpcHttpClient},
    tx::{broadcast, sign, simulate, TxFactory, TxResponse},
};

pub struct ChainClient {
    pub config: ChainClientConfig,
    pub keyring: Keyring,
    rpc_client: RpcHttpClient,
    grpc: GrpcClient,
    codec: Codec,
    pub(crate) feegrants: Mutex<Option<FeeGrantConfiguration>>,
}

impl ChainClient {
    /// Builds a client from a validated chain config. The keystore lives
    /// under `<key-directory>/<chain-id>` so keys for different chains never
    /// collide.
    pub fn new(config: ChainClientConfig) -> Result<ChainClient, ChainClientError> {
        config.validate()?;

        let key_path = Path::new(&config.key_directory).join(&config.chain_id);
        let keyring = Keyring::new_file_store(&key_path)?;
        let rpc_client = rpc::new_http_client(&config.rpc_address)?;
        let grpc = GrpcClient::new(&config.grpc_address)?;
        let codec = Codec::for_chain(&config.extra_codecs);
        let feegrants = Mutex::new(config.feegrants.clone());

        Ok(ChainClient {
            config,
            keyring,
            rpc_client,
            grpc,
            codec,
            feegrants,
        })
    }

    pub fn rpc(&self) -> &RpcHttpClient {
        &self.rpc_client
    }

    pub fn grpc(&self) -> &GrpcClient {
        &self.grpc
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// The bech32 account address of a key in this client's keyring
    pub fn signer_address(&self, key_name: &str) -> Result<String, ChainClientError> {
        let output = self.keyring.get_public_key_and_address(
            key_name,
            &self.config.account_prefix,
            self.config.address_algo(),
        )?;

        Ok(output.address)
    }

    /// Errors if the node is catching up or unreachable
    pub async fn health_check(&self) -> Result<(), ChainClientError> {
        rpc::health_check(&self.rpc_client).await.map_err(Into::into)
    }

    pub async fn latest_height(&self) -> Result<u64, ChainClientError> {
        rpc::latest_height(&self.rpc_client).await.map_err(Into::into)
    }

    pub async fn query_account(&self, address: &str) -> Result<BaseAccount, ChainClientError> {
        account::query_account(&self.rpc_client, address).await
    }

    /// Signs and broadcasts messages with the next signer chosen by the fee
    /// grant rotation, falling back to the configured default key when no
    /// rotation is active
    pub async fn send_msgs(
        &self,
        msgs: Vec<Any>,
        memo: &str,
    ) -> Result<TxResponse, ChainClientError> {
        let (key_name, fee_granter) = self.next_signer().await?;

        self.send_msgs_with_key(&key_name, fee_granter.as_deref(), msgs, memo)
            .await
    }

    /// Runs the full pipeline with an explicit signing key: resolve account
    /// state, simulate for gas, price the fee, sign, encode and broadcast.
    /// A fee granter equal to the signer is dropped rather than attached.
    pub async fn send_msgs_with_key(
        &self,
        key_name: &str,
        fee_granter: Option<&str>,
        msgs: Vec<Any>,
        memo: &str,
    ) -> Result<TxResponse, ChainClientError> {
        let signer_address = self.signer_address(key_name)?;
        let algo = self.config.address_algo();

        let mut factory = TxFactory::from_config(&self.config)?;
        factory.memo = memo.to_string();
        factory.prepare(&self.rpc_client, &signer_address).await?;

        let mut tx = factory.build_tx(msgs)?;
        let body = tx.body();

        let secret = self.keyring.secret_key(key_name)?;
        let public_key = crate::codec::pubkey_any(
            &crate::keyring::compressed_public_key(&secret.public_key()),
            algo == crate::address::AddressAlgo::EthSecp256k1,
        );

        let gas = simulate::simulate_gas(&self.rpc_client, &factory, &body, &public_key).await?;
        let mut fee = factory.fee_from_gas(gas)?;

        if let Some(granter) = fee_granter {
            if granter != signer_address {
                let granter = granter
                    .parse()
                    .map_err(|err| TxError::Address(format!("fee granter: {err}")))?;
                fee.granter(granter);
            }
        }

        sign::sign_tx(
            &self.keyring,
            key_name,
            algo,
            &self.codec,
            &factory,
            &mut tx,
            &fee,
            false,
        )?;

        let raw = tx.into_raw()?;
        let tx_bytes = crate::codec::tx_encoder(&raw)?;

        tracing::debug!(
            chain_id = %self.config.chain_id,
            signer = %signer_address,
            gas,
            "broadcasting tx"
        );

        broadcast::broadcast_tx(&self.rpc_client, tx_bytes, self.config.block_timeout()?).await
    }

    /// Waits for a tx broadcast elsewhere to be committed
    pub async fn await_tx(&self, hash: &str) -> Result<GetTxResponse, ChainClientError> {
        broadcast::await_tx(&self.grpc, hash, self.config.block_timeout()?).await
    }
}
