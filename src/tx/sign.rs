//! Transaction signing.
//!
//! Direct mode signs the deterministic proto `SignDoc`; amino-json mode signs
//! the canonical JSON `StdSignDoc` that pre-0.40 SDK chains and some wallets
//! still require. Canonical here means object keys in lexicographic order,
//! which serde_json's default map type already guarantees.
use cosmos_sdk_proto::cosmos::tx::v1beta1::{
    mode_info, AuthInfo, Fee, ModeInfo, SignDoc, SignerInfo, TxBody,
};
use cosmrs::Any;
use prost::Message;
use serde::Serialize;
use serde_json::Value;

use crate::{
    address::AddressAlgo,
    chain::SignMode,
    codec::{self, Codec},
    error::TxError,
    keyring::{self, Keyring},
    tx::{FeeInfo, SignedPayload, TxFactory, UnsignedTx},
};

/// Legacy amino sign doc. Field declaration order is the canonical key
/// order, so keep these alphabetical.
#[derive(Debug, Serialize)]
struct StdSignDoc {
    account_number: String,
    chain_id: String,
    fee: StdFee,
    memo: String,
    msgs: Vec<Value>,
    sequence: String,
}

#[derive(Debug, Serialize)]
struct StdFee {
    amount: Vec<Value>,
    gas: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    granter: Option<String>,
}

/// Signs the tx with the named key and attaches the result. The signing
/// digest follows the address algorithm: SHA-256 for standard chains,
/// Keccak-256 for Ethereum-flavored ones.
pub fn sign_tx(
    keyring: &Keyring,
    key_name: &str,
    algo: AddressAlgo,
    codec: &Codec,
    factory: &TxFactory,
    tx: &mut UnsignedTx,
    fee: &FeeInfo,
    overwrite: bool,
) -> Result<(), TxError> {
    if tx.is_signed() && !overwrite {
        return Err(TxError::AlreadySigned);
    }

    let body = tx.body();
    let body_bytes = TxBody::from(body.clone()).encode_to_vec();

    let secret = keyring
        .secret_key(key_name)
        .map_err(|err| TxError::Signing(err.to_string()))?;
    let public_key = codec::pubkey_any(
        &keyring::compressed_public_key(&secret.public_key()),
        algo == AddressAlgo::EthSecp256k1,
    );

    let auth_info_bytes = auth_info(factory, fee, &public_key).encode_to_vec();

    let sign_bytes = match factory.sign_mode {
        SignMode::Direct => SignDoc {
            body_bytes: body_bytes.clone(),
            auth_info_bytes: auth_info_bytes.clone(),
            chain_id: factory.chain_id.clone(),
            account_number: factory.account_number,
        }
        .encode_to_vec(),
        SignMode::AminoJson => {
            let doc = std_sign_doc(codec, factory, &body.messages, &body.memo, fee)?;
            serde_json::to_vec(&doc).map_err(|err| TxError::Serialization(err.to_string()))?
        }
    };

    let signature = keyring
        .sign(key_name, &sign_bytes, algo)
        .map_err(|err| TxError::Signing(err.to_string()))?;

    tx.attach_signature(
        SignedPayload {
            body_bytes,
            auth_info_bytes,
            signature,
        },
        overwrite,
    )
}

fn auth_info(factory: &TxFactory, fee: &FeeInfo, public_key: &Any) -> AuthInfo {
    let mode = match factory.sign_mode {
        SignMode::Direct => cosmos_sdk_proto::cosmos::tx::signing::v1beta1::SignMode::Direct,
        SignMode::AminoJson => {
            cosmos_sdk_proto::cosmos::tx::signing::v1beta1::SignMode::LegacyAminoJson
        }
    };

    AuthInfo {
        signer_infos: vec![SignerInfo {
            public_key: Some(public_key.clone()),
            mode_info: Some(ModeInfo {
                sum: Some(mode_info::Sum::Single(mode_info::Single {
                    mode: mode as i32,
                })),
            }),
            sequence: factory.sequence,
        }],
        fee: Some(Fee::from(fee.to_fee())),
        tip: None,
    }
}

fn std_sign_doc(
    codec: &Codec,
    factory: &TxFactory,
    msgs: &[Any],
    memo: &str,
    fee: &FeeInfo,
) -> Result<StdSignDoc, TxError> {
    let msgs = msgs
        .iter()
        .map(|msg| codec.amino_json(msg))
        .collect::<Result<Vec<Value>, TxError>>()?;

    let fee = fee.to_fee();
    let amount = fee
        .amount
        .iter()
        .map(|coin| {
            serde_json::json!({
                "amount": coin.amount.to_string(),
                "denom": coin.denom.to_string(),
            })
        })
        .collect();

    Ok(StdSignDoc {
        account_number: factory.account_number.to_string(),
        chain_id: factory.chain_id.clone(),
        fee: StdFee {
            amount,
            gas: fee.gas_limit.to_string(),
            granter: fee.granter.map(|granter| granter.to_string()),
        },
        memo: memo.to_string(),
        msgs,
        sequence: factory.sequence.to_string(),
    })
}
