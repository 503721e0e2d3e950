//! Transaction construction, simulation, signing and broadcast.
//!
//! The pipeline mirrors the SDK's client side: build a body, resolve account
//! number and sequence, simulate for gas, price the fee, sign, encode, and
//! broadcast. Each stage lives in its own submodule.
use cosmos_sdk_proto::cosmos::{
    bank::v1beta1::MsgSend,
    base::v1beta1::Coin as ProtoCoin,
    feegrant::v1beta1::{BasicAllowance, MsgGrantAllowance, MsgRevokeAllowance},
    tx::v1beta1::TxRaw,
};
use cosmrs::{
    tx::{Body, BodyBuilder, Raw},
    AccountId, Any, Coin,
};
use prost::Message;
use tendermint_proto::google::protobuf::Timestamp;

use crate::{codec::BASIC_ALLOWANCE_TYPE_URL, error::TxError};

pub mod broadcast;
pub mod factory;
pub mod sign;
pub mod simulate;

pub use broadcast::{broadcast_tx, TxResponse};
pub use factory::TxFactory;

pub const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const MSG_GRANT_ALLOWANCE_TYPE_URL: &str = "/cosmos.feegrant.v1beta1.MsgGrantAllowance";
pub const MSG_REVOKE_ALLOWANCE_TYPE_URL: &str = "/cosmos.feegrant.v1beta1.MsgRevokeAllowance";

/// Packs a bank send message
pub fn msg_send(from_address: &str, to_address: &str, amount: Vec<ProtoCoin>) -> Any {
    let msg = MsgSend {
        from_address: from_address.to_string(),
        to_address: to_address.to_string(),
        amount,
    };

    Any {
        type_url: MSG_SEND_TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    }
}

/// Packs a fee grant of a basic allowance. An empty spend limit means
/// unlimited; a `None` expiration means open-ended.
pub fn msg_grant_basic_allowance(
    granter: &str,
    grantee: &str,
    spend_limit: Vec<ProtoCoin>,
    expiration: Option<Timestamp>,
) -> Any {
    let allowance = BasicAllowance {
        spend_limit,
        expiration,
    };
    let msg = MsgGrantAllowance {
        granter: granter.to_string(),
        grantee: grantee.to_string(),
        allowance: Some(Any {
            type_url: BASIC_ALLOWANCE_TYPE_URL.to_string(),
            value: allowance.encode_to_vec(),
        }),
    };

    Any {
        type_url: MSG_GRANT_ALLOWANCE_TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    }
}

/// Packs a fee grant revocation
pub fn msg_revoke_allowance(granter: &str, grantee: &str) -> Any {
    let msg = MsgRevokeAllowance {
        granter: granter.to_string(),
        grantee: grantee.to_string(),
    };

    Any {
        type_url: MSG_REVOKE_ALLOWANCE_TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    }
}

/// Body bytes, auth info bytes and the signature over them, as produced by
/// the signer. These are the three fields of the broadcastable `TxRaw`.
#[derive(Clone, Debug)]
pub struct SignedPayload {
    pub body_bytes: Vec<u8>,
    pub auth_info_bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Wrapper around a tx body builder that tracks whether the tx has been
/// signed. Mutating a signed tx is rejected so body bytes can never drift
/// from the signature.
#[derive(Clone, Debug, Default)]
pub struct UnsignedTx {
    body: BodyBuilder,
    signed: Option<SignedPayload>,
}

impl UnsignedTx {
    pub fn new() -> Self {
        UnsignedTx::default()
    }

    /// Adds a message to the body
    pub fn add_msg(&mut self, msg: Any) -> Result<&mut Self, TxError> {
        self.ensure_unsigned()?;
        self.body.msg(msg);

        Ok(self)
    }

    /// Adds multiple messages to the body
    pub fn add_msgs(&mut self, msgs: impl IntoIterator<Item = Any>) -> Result<&mut Self, TxError> {
        self.ensure_unsigned()?;
        self.body.msgs(msgs);

        Ok(self)
    }

    pub fn memo(&mut self, memo: impl Into<String>) -> Result<&mut Self, TxError> {
        self.ensure_unsigned()?;
        self.body.memo(memo);

        Ok(self)
    }

    pub fn timeout_height(&mut self, height: u32) -> Result<&mut Self, TxError> {
        self.ensure_unsigned()?;
        let height = tendermint::block::Height::from(height);
        self.body.timeout_height(height);

        Ok(self)
    }

    /// The finished body as it will be signed
    pub fn body(&self) -> Body {
        self.body.finish()
    }

    pub fn is_signed(&self) -> bool {
        self.signed.is_some()
    }

    /// Attaches the signer's output. Errors if a signature is already
    /// present, unless `overwrite` is set.
    pub fn attach_signature(
        &mut self,
        payload: SignedPayload,
        overwrite: bool,
    ) -> Result<(), TxError> {
        if self.signed.is_some() && !overwrite {
            return Err(TxError::AlreadySigned);
        }
        self.signed = Some(payload);

        Ok(())
    }

    /// Assembles the broadcastable raw tx. Errors if the tx is unsigned.
    pub fn into_raw(self) -> Result<Raw, TxError> {
        let payload = self.signed.ok_or_else(|| {
            TxError::Signing("cannot encode an unsigned transaction".to_string())
        })?;

        Ok(TxRaw {
            body_bytes: payload.body_bytes,
            auth_info_bytes: payload.auth_info_bytes,
            signatures: vec![payload.signature],
        }
        .into())
    }

    fn ensure_unsigned(&self) -> Result<(), TxError> {
        if self.signed.is_some() {
            return Err(TxError::AlreadySigned);
        }

        Ok(())
    }
}

/// Fee parameters for a single transaction
#[derive(Clone, Debug)]
pub struct FeeInfo {
    amount: Coin,
    gas_limit: u64,
    granter: Option<AccountId>,
    payer: Option<AccountId>,
}

impl FeeInfo {
    pub fn new(amount: Coin, gas_limit: u64) -> Self {
        FeeInfo {
            amount,
            gas_limit,
            granter: None,
            payer: None,
        }
    }

    pub fn amount(&self) -> &Coin {
        &self.amount
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn granter(&mut self, granter: AccountId) -> &mut Self {
        self.granter = Some(granter);
        self
    }

    pub fn payer(&mut self, payer: AccountId) -> &mut Self {
        self.payer = Some(payer);
        self
    }

    pub fn to_fee(&self) -> cosmrs::tx::Fee {
        let mut fee = cosmrs::tx::Fee::from_amount_and_gas(self.amount.clone(), self.gas_limit);
        fee.granter = self.granter.clone();
        fee.payer = self.payer.clone();

        fee
    }
}
