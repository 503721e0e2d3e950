//! gRPC plumbing.
//!
//! [`GrpcClient`] lazily constructs and caches one query client per proto
//! service, keyed by type. Clients are handed out by clone; tonic clients are
//! cheap to clone and share the underlying channel.
use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use async_trait::async_trait;
use cosmos_sdk_proto::cosmos::{
    auth::v1beta1::query_client::QueryClient as AuthQueryClient,
    feegrant::v1beta1::{
        query_client::QueryClient as FeeGrantQueryClient, Grant, QueryAllowanceRequest,
        QueryAllowancesRequest,
    },
    tx::v1beta1::{service_client::ServiceClient as TxServiceClient, GetTxRequest, GetTxResponse},
};
use tonic::transport::Channel;

use crate::error::GrpcError;

pub type AuthClient = AuthQueryClient<Channel>;
pub type FeeGrantClient = FeeGrantQueryClient<Channel>;
pub type TxClient = TxServiceClient<Channel>;

/// Generalizes gRPC client construction so [`GrpcClient::get_client`] can
/// build any service client on demand
#[async_trait]
pub trait ConstructClient<T> {
    async fn new_client(endpoint: String) -> Result<T, GrpcError>;
}

#[async_trait]
impl ConstructClient<AuthClient> for AuthClient {
    async fn new_client(endpoint: String) -> Result<AuthClient, GrpcError> {
        Ok(AuthQueryClient::connect(endpoint).await?)
    }
}

#[async_trait]
impl ConstructClient<FeeGrantClient> for FeeGrantClient {
    async fn new_client(endpoint: String) -> Result<FeeGrantClient, GrpcError> {
        Ok(FeeGrantQueryClient::connect(endpoint).await?)
    }
}

#[async_trait]
impl ConstructClient<TxClient> for TxClient {
    async fn new_client(endpoint: String) -> Result<TxClient, GrpcError> {
        Ok(TxServiceClient::connect(endpoint).await?)
    }
}

/// Cache of service clients for a single gRPC endpoint
pub struct GrpcClient {
    endpoint: String,
    cache: tokio::sync::Mutex<HashMap<TypeId, Box<dyn Any + Send>>>,
}

impl GrpcClient {
    pub fn new(endpoint: &str) -> Result<Self, GrpcError> {
        if endpoint.is_empty() {
            return Err(GrpcError::MissingEndpoint(
                "no gRPC address in chain config".to_string(),
            ));
        }

        Ok(GrpcClient {
            endpoint: endpoint.to_string(),
            cache: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns a clone of the cached client for the requested service,
    /// connecting first if this is the service's first use
    pub async fn get_client<T>(&self) -> Result<T, GrpcError>
    where
        T: Any + Clone + Send + ConstructClient<T>,
    {
        let mut cache = self.cache.lock().await;

        if !cache.contains_key(&TypeId::of::<T>()) {
            let client = T::new_client(self.endpoint.clone()).await?;
            cache.insert(TypeId::of::<T>(), Box::new(client));
        }

        let client = cache
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .ok_or_else(|| GrpcError::MissingEndpoint("client cache corrupted".to_string()))?;

        Ok(client.clone())
    }

    /// All fee allowances where the given address is the grantee
    pub async fn query_allowances(&self, grantee: &str) -> Result<Vec<Grant>, GrpcError> {
        let mut client = self.get_client::<FeeGrantClient>().await?;
        let request = QueryAllowancesRequest {
            grantee: grantee.to_string(),
            pagination: None,
        };

        Ok(client.allowances(request).await?.into_inner().allowances)
    }

    /// The fee allowance granted by `granter` to `grantee`, if any
    pub async fn query_allowance(
        &self,
        granter: &str,
        grantee: &str,
    ) -> Result<Option<Grant>, GrpcError> {
        let mut client = self.get_client::<FeeGrantClient>().await?;
        let request = QueryAllowanceRequest {
            granter: granter.to_string(),
            grantee: grantee.to_string(),
        };

        match client.allowance(request).await {
            Ok(response) => Ok(response.into_inner().allowance),
            Err(status) if status.code() == tonic::Code::NotFound => Ok(None),
            Err(status) => Err(status.into()),
        }
    }

    /// Looks up a committed transaction by hex hash
    pub async fn get_tx(&self, hash: &str) -> Result<GetTxResponse, GrpcError> {
        let mut client = self.get_client::<TxClient>().await?;
        let request = GetTxRequest {
            hash: hash.to_string(),
        };

        Ok(client.get_tx(request).await?.into_inner())
    }
}
