//! Message type registry.
//!
//! Maps proto type URLs to their legacy amino names and JSON renderings,
//! which the amino-json sign mode needs to build a canonical `StdSignDoc`.
//! The standard SDK modules are always registered; chains can opt into extra
//! codecs (currently "ethermint") through their config.
use std::collections::HashMap;

use cosmos_sdk_proto::cosmos::{
    bank::v1beta1::MsgSend,
    base::v1beta1::Coin,
    feegrant::v1beta1::{BasicAllowance, MsgGrantAllowance, MsgRevokeAllowance},
};
use cosmrs::Any;
use prost::Message;
use serde_json::{json, Value};

use crate::{chain::ETHERMINT_CODEC, error::TxError};

pub const SECP256K1_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";
pub const ETH_SECP256K1_PUBKEY_TYPE_URL: &str = "/ethermint.crypto.v1.ethsecp256k1.PubKey";

pub const BASIC_ALLOWANCE_TYPE_URL: &str = "/cosmos.feegrant.v1beta1.BasicAllowance";

type AminoRenderer = fn(&Any) -> Result<Value, TxError>;
type AminoParser = fn(&Value) -> Result<Any, TxError>;

/// A registered message type: its proto type URL, legacy amino name, and the
/// renderer/parser pair for its amino JSON form
#[derive(Clone)]
pub struct TypeEntry {
    pub type_url: &'static str,
    pub amino_name: &'static str,
    render: AminoRenderer,
    parse: AminoParser,
}

/// The set of types contributed by one SDK module
pub struct ModuleDescriptor {
    pub name: &'static str,
    pub types: Vec<TypeEntry>,
}

/// Registry of known message types for one chain
pub struct Codec {
    registry: HashMap<&'static str, TypeEntry>,
}

impl Codec {
    /// Builds a codec with the standard SDK modules plus any of the chain's
    /// extra codecs. Unknown extra codec names are ignored.
    pub fn for_chain(extra_codecs: &[String]) -> Codec {
        let mut modules = standard_modules();
        for extra in extra_codecs {
            if extra == ETHERMINT_CODEC {
                modules.push(ethermint_module());
            }
        }

        let mut registry = HashMap::new();
        for module in modules {
            for entry in module.types {
                registry.insert(entry.type_url, entry);
            }
        }

        Codec { registry }
    }

    /// Renders a packed message as its amino JSON form,
    /// `{"type": <amino name>, "value": <fields>}`
    pub fn amino_json(&self, msg: &Any) -> Result<Value, TxError> {
        let entry = self.registry.get(msg.type_url.as_str()).ok_or_else(|| {
            TxError::Serialization(format!(
                "no amino mapping registered for '{}'",
                msg.type_url
            ))
        })?;
        let value = (entry.render)(msg)?;

        Ok(json!({ "type": entry.amino_name, "value": value }))
    }

    /// Parses an amino JSON rendering back into the packed proto message.
    /// Inverse of [`amino_json`](Codec::amino_json) for registered types.
    pub fn from_amino_json(&self, value: &Value) -> Result<Any, TxError> {
        let name = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| TxError::Serialization("amino JSON has no type key".to_string()))?;
        let entry = self
            .registry
            .values()
            .find(|entry| entry.amino_name == name)
            .ok_or_else(|| {
                TxError::Serialization(format!("no amino mapping registered for '{name}'"))
            })?;
        let body = value
            .get("value")
            .ok_or_else(|| TxError::Serialization("amino JSON has no value key".to_string()))?;

        (entry.parse)(body)
    }

    pub fn is_registered(&self, type_url: &str) -> bool {
        self.registry.contains_key(type_url)
    }

    /// Sign modes this codec can produce sign bytes for, in preference order
    pub fn sign_modes(&self) -> Vec<crate::chain::SignMode> {
        vec![crate::chain::SignMode::Direct, crate::chain::SignMode::AminoJson]
    }
}

/// Packs a compressed secp256k1 public key into the Any carried in signer
/// infos, using the ethermint type URL when requested
pub fn pubkey_any(key_bytes: &[u8], ethermint: bool) -> Any {
    let key = cosmos_sdk_proto::cosmos::crypto::secp256k1::PubKey {
        key: key_bytes.to_vec(),
    };
    let type_url = if ethermint {
        ETH_SECP256K1_PUBKEY_TYPE_URL
    } else {
        SECP256K1_PUBKEY_TYPE_URL
    };

    Any {
        type_url: type_url.to_string(),
        value: key.encode_to_vec(),
    }
}

/// Encodes a signed transaction for broadcast
pub fn tx_encoder(raw: &cosmrs::tx::Raw) -> Result<Vec<u8>, TxError> {
    raw.to_bytes()
        .map_err(|err| TxError::Serialization(err.to_string()))
}

/// Decodes committed transaction bytes
pub fn tx_decoder(bytes: &[u8]) -> Result<cosmrs::Tx, TxError> {
    cosmrs::Tx::from_bytes(bytes).map_err(|err| TxError::Serialization(err.to_string()))
}

fn standard_modules() -> Vec<ModuleDescriptor> {
    vec![
        ModuleDescriptor {
            name: "bank",
            types: vec![TypeEntry {
                type_url: "/cosmos.bank.v1beta1.MsgSend",
                amino_name: "cosmos-sdk/MsgSend",
                render: render_msg_send,
                parse: parse_msg_send,
            }],
        },
        ModuleDescriptor {
            name: "feegrant",
            types: vec![
                TypeEntry {
                    type_url: "/cosmos.feegrant.v1beta1.MsgGrantAllowance",
                    amino_name: "cosmos-sdk/MsgGrantAllowance",
                    render: render_msg_grant_allowance,
                    parse: parse_msg_grant_allowance,
                },
                TypeEntry {
                    type_url: "/cosmos.feegrant.v1beta1.MsgRevokeAllowance",
                    amino_name: "cosmos-sdk/MsgRevokeAllowance",
                    render: render_msg_revoke_allowance,
                    parse: parse_msg_revoke_allowance,
                },
            ],
        },
    ]
}

fn ethermint_module() -> ModuleDescriptor {
    // the ethermint pubkey rides in signer infos, not in sign doc messages,
    // so the module contributes no amino renderers today
    ModuleDescriptor {
        name: ETHERMINT_CODEC,
        types: vec![],
    }
}

fn coins_json(coins: &[Coin]) -> Value {
    Value::Array(
        coins
            .iter()
            .map(|c| json!({ "amount": c.amount, "denom": c.denom }))
            .collect(),
    )
}

fn render_msg_send(any: &Any) -> Result<Value, TxError> {
    let msg = MsgSend::decode(any.value.as_slice())
        .map_err(|err| TxError::Serialization(err.to_string()))?;

    Ok(json!({
        "amount": coins_json(&msg.amount),
        "from_address": msg.from_address,
        "to_address": msg.to_address,
    }))
}

fn render_msg_grant_allowance(any: &Any) -> Result<Value, TxError> {
    let msg = MsgGrantAllowance::decode(any.value.as_slice())
        .map_err(|err| TxError::Serialization(err.to_string()))?;

    let allowance = match msg.allowance {
        Some(allowance) if allowance.type_url == BASIC_ALLOWANCE_TYPE_URL => {
            let basic = BasicAllowance::decode(allowance.value.as_slice())
                .map_err(|err| TxError::Serialization(err.to_string()))?;
            let mut value = json!({ "spend_limit": coins_json(&basic.spend_limit) });
            if let Some(expiration) = basic.expiration {
                value["expiration"] = json!(format!(
                    "{}.{:09}",
                    expiration.seconds, expiration.nanos
                ));
            }
            json!({ "type": "cosmos-sdk/BasicAllowance", "value": value })
        }
        Some(other) => {
            return Err(TxError::Serialization(format!(
                "no amino mapping registered for allowance '{}'",
                other.type_url
            )))
        }
        None => Value::Null,
    };

    Ok(json!({
        "allowance": allowance,
        "grantee": msg.grantee,
        "granter": msg.granter,
    }))
}

fn render_msg_revoke_allowance(any: &Any) -> Result<Value, TxError> {
    let msg = MsgRevokeAllowance::decode(any.value.as_slice())
        .map_err(|err| TxError::Serialization(err.to_string()))?;

    Ok(json!({
        "grantee": msg.grantee,
        "granter": msg.granter,
    }))
}

fn json_str(value: &Value, key: &str) -> Result<String, TxError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TxError::Serialization(format!("amino JSON missing string field '{key}'")))
}

fn coins_from_json(value: &Value) -> Result<Vec<Coin>, TxError> {
    let coins = match value {
        Value::Null => return Ok(vec![]),
        Value::Array(coins) => coins,
        _ => {
            return Err(TxError::Serialization(
                "amino JSON coin list is not an array".to_string(),
            ))
        }
    };

    coins
        .iter()
        .map(|coin| {
            Ok(Coin {
                denom: json_str(coin, "denom")?,
                amount: json_str(coin, "amount")?,
            })
        })
        .collect()
}

fn parse_msg_send(value: &Value) -> Result<Any, TxError> {
    let msg = MsgSend {
        from_address: json_str(value, "from_address")?,
        to_address: json_str(value, "to_address")?,
        amount: coins_from_json(value.get("amount").unwrap_or(&Value::Null))?,
    };

    Ok(Any {
        type_url: "/cosmos.bank.v1beta1.MsgSend".to_string(),
        value: msg.encode_to_vec(),
    })
}

fn parse_msg_grant_allowance(value: &Value) -> Result<Any, TxError> {
    let allowance = match value.get("allowance") {
        None | Some(Value::Null) => None,
        Some(allowance) => {
            if allowance.get("type").and_then(Value::as_str) != Some("cosmos-sdk/BasicAllowance") {
                return Err(TxError::Serialization(
                    "amino JSON allowance is not a basic allowance".to_string(),
                ));
            }
            let body = allowance.get("value").unwrap_or(&Value::Null);
            let basic = BasicAllowance {
                spend_limit: coins_from_json(body.get("spend_limit").unwrap_or(&Value::Null))?,
                // expiration timestamps are not round-tripped; grants issued
                // by this library are always open-ended
                expiration: None,
            };
            Some(Any {
                type_url: BASIC_ALLOWANCE_TYPE_URL.to_string(),
                value: basic.encode_to_vec(),
            })
        }
    };

    let msg = MsgGrantAllowance {
        granter: json_str(value, "granter")?,
        grantee: json_str(value, "grantee")?,
        allowance,
    };

    Ok(Any {
        type_url: "/cosmos.feegrant.v1beta1.MsgGrantAllowance".to_string(),
        value: msg.encode_to_vec(),
    })
}

fn parse_msg_revoke_allowance(value: &Value) -> Result<Any, TxError> {
    let msg = MsgRevokeAllowance {
        granter: json_str(value, "granter")?,
        grantee: json_str(value, "grantee")?,
    };

    Ok(Any {
        type_url: "/cosmos.feegrant.v1beta1.MsgRevokeAllowance".to_string(),
        value: msg.encode_to_vec(),
    })
}
