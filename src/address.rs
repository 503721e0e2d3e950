//! Bech32 address codec.
//!
//! Cosmos addresses are not self-describing: the same 20 byte payload has five
//! legal textual forms per chain (account, validator operator, consensus, and
//! their public key variants), distinguished only by the human-readable part.
//! Every function here takes the chain's account prefix as an explicit
//! parameter so the codec carries no process-wide state and the same process
//! can talk to chains with different prefixes concurrently.
use bech32::{FromBase32, ToBase32, Variant};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

use crate::error::AddressError;

/// Length in bytes of an account address payload
pub const ADDRESS_LENGTH: usize = 20;

/// Which of the five bech32 forms an address string is rendered in.
///
/// The full human-readable part is the chain's account prefix followed by the
/// form's suffix, e.g. `cosmos`, `cosmosvaloper`, `cosmosvalconspub`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddressKind {
    Account,
    AccountPub,
    Valoper,
    ValoperPub,
    Valcons,
    ValconsPub,
}

impl AddressKind {
    fn suffix(&self) -> &'static str {
        match self {
            AddressKind::Account => "",
            AddressKind::AccountPub => "pub",
            AddressKind::Valoper => "valoper",
            AddressKind::ValoperPub => "valoperpub",
            AddressKind::Valcons => "valcons",
            AddressKind::ValconsPub => "valconspub",
        }
    }

    /// The full human-readable part under the given account prefix
    pub fn hrp(&self, account_prefix: &str) -> String {
        format!("{}{}", account_prefix, self.suffix())
    }
}

/// How a public key is hashed into an address payload
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AddressAlgo {
    /// SHA-256 then RIPEMD-160 over the compressed public key (standard Cosmos)
    #[default]
    Cosmos,
    /// Keccak-256 over the uncompressed public key, last 20 bytes
    /// (Ethereum-flavored chains such as Evmos and Injective)
    EthSecp256k1,
}

/// Hashes a secp256k1 public key into a 20 byte address payload.
///
/// The payload is independent of the bech32 prefix; the same key yields the
/// same bytes on every chain sharing the algorithm.
pub fn derive_address(algo: AddressAlgo, public_key: &k256::PublicKey) -> [u8; ADDRESS_LENGTH] {
    let mut out = [0u8; ADDRESS_LENGTH];
    match algo {
        AddressAlgo::Cosmos => {
            let compressed = public_key.to_encoded_point(true);
            let sha = Sha256::digest(compressed.as_bytes());
            let ripe = Ripemd160::digest(sha);
            out.copy_from_slice(&ripe);
        }
        AddressAlgo::EthSecp256k1 => {
            let uncompressed = public_key.to_encoded_point(false);
            // skip the 0x04 SEC1 tag byte
            let hash = Keccak256::digest(&uncompressed.as_bytes()[1..]);
            out.copy_from_slice(&hash[hash.len() - ADDRESS_LENGTH..]);
        }
    }
    out
}

/// Encodes raw payload bytes under the given prefix and form
pub fn encode(prefix: &str, kind: AddressKind, data: &[u8]) -> Result<String, AddressError> {
    Ok(bech32::encode(
        &kind.hrp(prefix),
        data.to_base32(),
        Variant::Bech32,
    )?)
}

/// Decodes an address string, verifying that the human-readable part exactly
/// matches the given prefix and form. Address forms (as opposed to public
/// key forms) must carry a 20 byte payload.
pub fn decode(prefix: &str, kind: AddressKind, address: &str) -> Result<Vec<u8>, AddressError> {
    let (hrp, data, _variant) = bech32::decode(address)?;
    let expected = kind.hrp(prefix);
    if hrp != expected {
        return Err(AddressError::Prefix {
            expected,
            found: hrp,
        });
    }

    let payload = Vec::<u8>::from_base32(&data)?;
    if matches!(
        kind,
        AddressKind::Account | AddressKind::Valoper | AddressKind::Valcons
    ) && payload.len() != ADDRESS_LENGTH
    {
        return Err(AddressError::Length {
            expected: ADDRESS_LENGTH,
            found: payload.len(),
        });
    }

    Ok(payload)
}

pub fn encode_acc(prefix: &str, data: &[u8]) -> Result<String, AddressError> {
    encode(prefix, AddressKind::Account, data)
}

pub fn encode_acc_pub(prefix: &str, data: &[u8]) -> Result<String, AddressError> {
    encode(prefix, AddressKind::AccountPub, data)
}

pub fn encode_valoper(prefix: &str, data: &[u8]) -> Result<String, AddressError> {
    encode(prefix, AddressKind::Valoper, data)
}

pub fn encode_valoper_pub(prefix: &str, data: &[u8]) -> Result<String, AddressError> {
    encode(prefix, AddressKind::ValoperPub, data)
}

pub fn encode_valcons(prefix: &str, data: &[u8]) -> Result<String, AddressError> {
    encode(prefix, AddressKind::Valcons, data)
}

pub fn encode_valcons_pub(prefix: &str, data: &[u8]) -> Result<String, AddressError> {
    encode(prefix, AddressKind::ValconsPub, data)
}

pub fn decode_acc(prefix: &str, address: &str) -> Result<Vec<u8>, AddressError> {
    decode(prefix, AddressKind::Account, address)
}

pub fn decode_acc_pub(prefix: &str, address: &str) -> Result<Vec<u8>, AddressError> {
    decode(prefix, AddressKind::AccountPub, address)
}

pub fn decode_valoper(prefix: &str, address: &str) -> Result<Vec<u8>, AddressError> {
    decode(prefix, AddressKind::Valoper, address)
}

pub fn decode_valoper_pub(prefix: &str, address: &str) -> Result<Vec<u8>, AddressError> {
    decode(prefix, AddressKind::ValoperPub, address)
}

pub fn decode_valcons(prefix: &str, address: &str) -> Result<Vec<u8>, AddressError> {
    decode(prefix, AddressKind::Valcons, address)
}

pub fn decode_valcons_pub(prefix: &str, address: &str) -> Result<Vec<u8>, AddressError> {
    decode(prefix, AddressKind::ValconsPub, address)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [AddressKind; 6] = [
        AddressKind::Account,
        AddressKind::AccountPub,
        AddressKind::Valoper,
        AddressKind::ValoperPub,
        AddressKind::Valcons,
        AddressKind::ValconsPub,
    ];

    #[test]
    fn encode_decode_round_trip_all_kinds() {
        let payload: Vec<u8> = (0u8..20).collect();

        for kind in KINDS {
            let encoded = encode("cosmos", kind, &payload).unwrap();
            assert!(encoded.starts_with(&kind.hrp("cosmos")));

            let decoded = decode("cosmos", kind, &encoded).unwrap();
            assert_eq!(decoded, payload);
        }
    }

    #[test]
    fn decode_rejects_wrong_prefix() {
        let payload: Vec<u8> = (0u8..20).collect();

        for kind in KINDS {
            let encoded = encode("osmo", kind, &payload).unwrap();
            let err = decode("cosmos", kind, &encoded).unwrap_err();
            assert!(matches!(err, AddressError::Prefix { .. }), "{err}");
        }
    }

    #[test]
    fn decode_rejects_wrong_kind() {
        let payload: Vec<u8> = (0u8..20).collect();
        let encoded = encode_valoper("cosmos", &payload).unwrap();

        // an operator address is not an account address
        assert!(decode_acc("cosmos", &encoded).is_err());
    }

    #[test]
    fn decode_rejects_short_payload() {
        let payload: Vec<u8> = (0u8..19).collect();
        let encoded = encode_acc("cosmos", &payload).unwrap();

        let err = decode_acc("cosmos", &encoded).unwrap_err();
        assert!(matches!(
            err,
            AddressError::Length {
                expected: ADDRESS_LENGTH,
                found: 19
            }
        ));

        // public key forms carry longer payloads and are not length checked
        let pub_payload: Vec<u8> = (0u8..33).collect();
        let encoded = encode_acc_pub("cosmos", &pub_payload).unwrap();
        assert_eq!(decode_acc_pub("cosmos", &encoded).unwrap(), pub_payload);
    }

    #[test]
    fn known_account_address() {
        // cosmos1n6j7gnld9yxfyh6tflxhjjmt404zruuaf73t08 round trips
        let addr = "cosmos1n6j7gnld9yxfyh6tflxhjjmt404zruuaf73t08";
        let bytes = decode_acc("cosmos", addr).unwrap();
        assert_eq!(bytes.len(), ADDRESS_LENGTH);
        assert_eq!(encode_acc("cosmos", &bytes).unwrap(), addr);
    }
}
