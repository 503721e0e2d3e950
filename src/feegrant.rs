//! Fee grant management and signer rotation.
//!
//! A single granter key funds a set of managed grantee keys. Each send picks
//! the next grantee in round-robin order and attaches the granter's address
//! as the fee payer, so sequence contention is spread across the grantees
//! while fees still come out of one account. The rotation only engages once
//! the grants have been verified on chain; until then every send falls back
//! to the configured default key and pays its own fees.
use std::time::{SystemTime, UNIX_EPOCH};

use cosmos_sdk_proto::cosmos::feegrant::v1beta1::{BasicAllowance, Grant};
use cosmrs::Any;
use prost::Message;

use crate::{
    chain::FeeGrantConfiguration,
    client::ChainClient,
    codec::BASIC_ALLOWANCE_TYPE_URL,
    error::{ChainClientError, FeeGrantError, TxError},
    tx::msg_grant_basic_allowance,
};

/// Prefix for the names of keys created by [`ChainClient::configure_feegrants`]
pub const GRANTEE_KEY_PREFIX: &str = "grantee";

impl ChainClient {
    /// Creates the managed grantee keys and records the fee grant
    /// configuration. No grants are issued yet; call
    /// [`ensure_grants`](ChainClient::ensure_grants) afterwards.
    pub async fn configure_feegrants(
        &mut self,
        grantees_wanted: usize,
        granter_key: &str,
    ) -> Result<(), ChainClientError> {
        if !self.keyring.key_exists(granter_key)? {
            return Err(FeeGrantError::KeyHandling(format!(
                "granter key '{granter_key}' not found in keyring"
            ))
            .into());
        }

        let mut managed_grantees = Vec::with_capacity(grantees_wanted);
        for i in 0..grantees_wanted {
            let name = format!("{GRANTEE_KEY_PREFIX}{i}");
            if !self.keyring.key_exists(&name)? {
                self.keyring
                    .create_key(&name, "", self.config.coin_type, false)?;
            }
            managed_grantees.push(name);
        }

        let configuration = FeeGrantConfiguration {
            grantees_wanted,
            granter_key: granter_key.to_string(),
            managed_grantees,
            block_height_verified: 0,
            grantee_last_signer_index: 0,
        };

        self.config.feegrants = Some(configuration.clone());
        *self.feegrants.lock().await = Some(configuration);

        Ok(())
    }

    /// Issues basic allowances from the granter to every managed grantee
    /// that does not already hold a valid one, then marks the configuration
    /// verified at the current block height. Grants are batched into a
    /// single tx signed by the granter.
    pub async fn ensure_grants(&self) -> Result<(), ChainClientError> {
        let configuration = self
            .feegrants
            .lock()
            .await
            .clone()
            .ok_or(FeeGrantError::NotConfigured)?;
        if configuration.granter_key.is_empty() {
            return Err(FeeGrantError::NoGranter.into());
        }
        if configuration.managed_grantees.is_empty() {
            return Err(FeeGrantError::NoGrantees.into());
        }

        let granter_address = self.signer_address(&configuration.granter_key)?;

        let mut grantees = Vec::with_capacity(configuration.managed_grantees.len());
        for grantee_key in &configuration.managed_grantees {
            let grantee_address = self.signer_address(grantee_key)?;
            let existing = self
                .grpc()
                .query_allowance(&granter_address, &grantee_address)
                .await?;
            grantees.push((grantee_address, existing));
        }

        let msgs = plan_grant_msgs(&granter_address, &grantees, unix_now_seconds());

        if !msgs.is_empty() {
            tracing::info!(
                granter = %granter_address,
                count = msgs.len(),
                "issuing fee grants"
            );
            let response = self
                .send_msgs_with_key(&configuration.granter_key, None, msgs, "")
                .await?;
            if response.code != 0 {
                return Err(TxError::Broadcast(format!(
                    "fee grant tx failed with code {} ({}): {}",
                    response.code, response.codespace, response.raw_log
                ))
                .into());
            }
        }

        let height = self.latest_height().await?;
        if let Some(configuration) = self.feegrants.lock().await.as_mut() {
            configuration.block_height_verified = height as i64;
        }

        Ok(())
    }

    /// Picks the signing key and fee granter address for the next send.
    ///
    /// Falls back to the default key paying its own fees whenever the
    /// rotation is not fully set up: no configuration, no granter key, no
    /// managed grantees, or grants not yet verified on chain.
    pub async fn next_signer(&self) -> Result<(String, Option<String>), ChainClientError> {
        let mut guard = self.feegrants.lock().await;

        let configuration = match guard.as_mut() {
            Some(configuration) => configuration,
            None => return Ok((self.config.key.clone(), None)),
        };
        if configuration.granter_key.is_empty()
            || configuration.managed_grantees.is_empty()
            || configuration.block_height_verified <= 0
        {
            return Ok((self.config.key.clone(), None));
        }

        let index = configuration.grantee_last_signer_index % configuration.managed_grantees.len();
        let key_name = configuration.managed_grantees[index].clone();
        configuration.grantee_last_signer_index =
            (index + 1) % configuration.managed_grantees.len();
        let granter_key = configuration.granter_key.clone();
        drop(guard);

        let granter_address = self.signer_address(&granter_key)?;

        Ok((key_name, Some(granter_address)))
    }
}

/// Whether a grant is usable: it must carry a basic allowance whose
/// expiration is unset or in the future and whose spend limit is either
/// unlimited (empty) or entirely positive
pub fn grant_is_valid(grant: &Grant, now_seconds: i64) -> bool {
    let allowance = match &grant.allowance {
        Some(allowance) if allowance.type_url == BASIC_ALLOWANCE_TYPE_URL => allowance,
        _ => return false,
    };
    let basic = match BasicAllowance::decode(allowance.value.as_slice()) {
        Ok(basic) => basic,
        Err(_) => return false,
    };

    if let Some(expiration) = &basic.expiration {
        if expiration.seconds <= now_seconds {
            return false;
        }
    }

    basic
        .spend_limit
        .iter()
        .all(|coin| matches!(coin.amount.parse::<u128>(), Ok(amount) if amount > 0))
}

/// Plans the grant messages needed to cover every grantee with a valid
/// allowance. Grantees already covered produce no message, so the plan is
/// empty on a second run in the same block.
pub fn plan_grant_msgs(
    granter_address: &str,
    grantees: &[(String, Option<Grant>)],
    now_seconds: i64,
) -> Vec<Any> {
    grantees
        .iter()
        .filter(|(_, existing)| {
            !existing
                .as_ref()
                .map(|grant| grant_is_valid(grant, now_seconds))
                .unwrap_or(false)
        })
        // unlimited spend, no expiration
        .map(|(grantee, _)| msg_grant_basic_allowance(granter_address, grantee, vec![], None))
        .collect()
}

fn unix_now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
