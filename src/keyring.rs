//! Named secret key management over an encrypted filesystem keystore.
//!
//! Keys are derived from BIP-39 mnemonics along `m/44'/<coin>'/0'/0/0` and
//! persisted as PKCS#8 documents, one keystore directory per chain id. A
//! single [`Keyring`] instance serves one chain client.
use std::{collections::BTreeSet, fs, path::Path};

use bip32::Mnemonic;
use cosmrs::crypto::secp256k1::SigningKey;
use k256::{
    ecdsa::signature::DigestSigner,
    elliptic_curve::sec1::ToEncodedPoint,
    SecretKey,
};
use rand_core::OsRng;
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use signatory::{
    pkcs8::der::pem::PemLabel, pkcs8::DecodePrivateKey, pkcs8::EncodePrivateKey,
    pkcs8::LineEnding, pkcs8::SecretDocument, FsKeyStore, KeyName,
};

use crate::{
    address::{self, AddressAlgo},
    error::KeyStoreError,
};

/// Basic keystore operations that all backends are expected to implement
pub trait KeyStore: Send + Sync {
    /// Check if the key store has been initialized.
    fn key_store_created(&self) -> bool;

    /// Check if a key exists under the given name. Returns false if no key is found.
    fn key_exists(&self, key_name: &KeyName) -> Result<bool, KeyStoreError>;

    /// Add a private key document under the given name.
    fn add_key(&self, key_name: &KeyName, encoded_key: SecretDocument)
        -> Result<(), KeyStoreError>;

    /// Delete the key with the given name. Errors if no key exists under the name.
    fn delete_key(&self, key_name: &KeyName) -> Result<(), KeyStoreError>;

    /// Load the private key document stored under the given name.
    fn get_key(&self, key_name: &KeyName) -> Result<SecretDocument, KeyStoreError>;

    /// Names of all stored keys.
    fn key_names(&self) -> Result<Vec<String>, KeyStoreError>;
}

/// Key name with its derived public key and bech32 address
#[derive(Clone, Debug)]
pub struct PublicKeyOutput {
    pub name: String,
    pub public_key: k256::PublicKey,
    pub address: String,
}

/// Keyring over a single [`KeyStore`] backend
pub struct Keyring {
    key_store: Box<dyn KeyStore>,
}

impl Keyring {
    /// Creates or opens a filesystem keystore rooted at the given directory.
    /// The directory is created on first use; opening an existing directory is
    /// idempotent.
    pub fn new_file_store(key_path: &Path) -> Result<Self, KeyStoreError> {
        let key_store = FileKeyStore::create_or_open(key_path)?;

        Ok(Keyring {
            key_store: Box::new(key_store),
        })
    }

    pub fn key_store_created(&self) -> bool {
        self.key_store.key_store_created()
    }

    /// Check if a key exists under the given name. Returns false if no key is found.
    pub fn key_exists(&self, name: &str) -> Result<bool, KeyStoreError> {
        self.key_store.key_exists(&key_name(name)?)
    }

    /// Generates a fresh 24 word mnemonic from OS entropy, derives a key along
    /// `m/44'/<coin_type>'/0'/0/0` and stores it under the given name. The
    /// mnemonic is returned to the caller and never persisted.
    pub fn create_key(
        &mut self,
        name: &str,
        password: &str,
        coin_type: u32,
        override_if_exists: bool,
    ) -> Result<Mnemonic, KeyStoreError> {
        if self.key_exists(name)? && !override_if_exists {
            return Err(KeyStoreError::Exists(name.to_string()));
        }

        let mnemonic = Mnemonic::random(OsRng, Default::default());
        self.store_from_mnemonic(name, &mnemonic, password, coin_type)?;

        Ok(mnemonic)
    }

    /// Recovers a key from a caller-supplied mnemonic along
    /// `m/44'/<coin_type>'/0'/0/0` and stores it under the given name.
    pub fn import_key(
        &mut self,
        name: &str,
        mnemonic: &str,
        password: &str,
        coin_type: u32,
        override_if_exists: bool,
    ) -> Result<(), KeyStoreError> {
        if self.key_exists(name)? && !override_if_exists {
            return Err(KeyStoreError::Exists(name.to_string()));
        }

        let mnemonic = Mnemonic::new(mnemonic.trim(), Default::default())
            .map_err(|err| KeyStoreError::InvalidMnemonic(err.to_string()))?;

        self.store_from_mnemonic(name, &mnemonic, password, coin_type)
    }

    /// Loads a PKCS#8 PEM encoded private key from a file into the keyring.
    pub fn add_key_from_path(
        &mut self,
        name: &str,
        file_path: &str,
        override_if_exists: bool,
    ) -> Result<(), KeyStoreError> {
        if self.key_exists(name)? && !override_if_exists {
            return Err(KeyStoreError::Exists(name.to_string()));
        }

        let pem = fs::read_to_string(file_path)
            .map_err(|err| KeyStoreError::FileIO(err.to_string()))?;
        let (label, doc) = SecretDocument::from_pem(&pem)
            .map_err(|err| KeyStoreError::FileIO(err.to_string()))?;
        signatory::pkcs8::PrivateKeyInfo::validate_pem_label(label)
            .map_err(|err| KeyStoreError::FileIO(err.to_string()))?;

        self.key_store.add_key(&key_name(name)?, doc)
    }

    /// Delete the key with the given name. Errors if no key exists under the name.
    pub fn delete_key(&mut self, name: &str) -> Result<(), KeyStoreError> {
        if !self.key_exists(name)? {
            return Err(KeyStoreError::DoesNotExist(name.to_string()));
        }

        self.key_store.delete_key(&key_name(name)?)
    }

    /// Retrieves the secret key stored under the given name.
    pub fn secret_key(&self, name: &str) -> Result<SecretKey, KeyStoreError> {
        if !self.key_exists(name)? {
            return Err(KeyStoreError::DoesNotExist(name.to_string()));
        }

        let doc = self.key_store.get_key(&key_name(name)?)?;

        SecretKey::from_pkcs8_der(doc.as_bytes())
            .map_err(|err| KeyStoreError::UnableToRetrieveKey(err.to_string()))
    }

    /// Retrieves a signing key usable with the cosmrs tx machinery.
    pub fn get_key(&self, name: &str) -> Result<SigningKey, KeyStoreError> {
        let secret = self.secret_key(name)?;

        SigningKey::from_slice(&secret.to_bytes())
            .map_err(|err| KeyStoreError::UnableToRetrieveKey(err.to_string()))
    }

    /// Derived public key and bech32 address for the key stored under the
    /// given name, rendered under the given account prefix.
    pub fn get_public_key_and_address(
        &self,
        name: &str,
        prefix: &str,
        algo: AddressAlgo,
    ) -> Result<PublicKeyOutput, KeyStoreError> {
        let secret = self.secret_key(name)?;
        let public_key = secret.public_key();
        let payload = address::derive_address(algo, &public_key);
        let address = address::encode_acc(prefix, &payload)
            .map_err(|err| KeyStoreError::UnableToRetrieveKey(err.to_string()))?;

        Ok(PublicKeyOutput {
            name: name.to_string(),
            public_key,
            address,
        })
    }

    /// Signs arbitrary bytes with the named key. The digest is chosen by the
    /// address algorithm: SHA-256 for standard chains, Keccak-256 for
    /// Ethereum-flavored ones. Returns the 64 byte compact signature.
    pub fn sign(&self, name: &str, msg: &[u8], algo: AddressAlgo) -> Result<Vec<u8>, KeyStoreError> {
        let secret = self.secret_key(name)?;
        let signing_key = k256::ecdsa::SigningKey::from(&secret);

        let signature: k256::ecdsa::Signature = match algo {
            AddressAlgo::Cosmos => signing_key.sign_digest(Sha256::new_with_prefix(msg)),
            AddressAlgo::EthSecp256k1 => signing_key.sign_digest(Keccak256::new_with_prefix(msg)),
        };

        Ok(signature.to_vec())
    }

    /// Exports the named key as an encrypted PKCS#8 PEM document.
    pub fn export_armored(&self, name: &str, passphrase: &str) -> Result<String, KeyStoreError> {
        let secret = self.secret_key(name)?;
        let pem = secret
            .to_pkcs8_encrypted_pem(&mut OsRng, passphrase.as_bytes(), LineEnding::default())
            .map_err(|err| KeyStoreError::UnableToRetrieveKey(err.to_string()))?;

        Ok(pem.to_string())
    }

    /// Names of all keys in the store.
    pub fn list_keys(&self) -> Result<Vec<String>, KeyStoreError> {
        self.key_store.key_names()
    }

    fn store_from_mnemonic(
        &mut self,
        name: &str,
        mnemonic: &Mnemonic,
        password: &str,
        coin_type: u32,
    ) -> Result<(), KeyStoreError> {
        let path = format!("m/44'/{coin_type}'/0'/0/0");
        let secret = derive_secret_key(mnemonic, password, &path)?;
        let encoded_key = secret
            .to_pkcs8_der()
            .map_err(|err| KeyStoreError::UnableToStoreKey(err.to_string()))?;

        self.key_store.add_key(&key_name(name)?, encoded_key)
    }
}

/// Derives a secp256k1 secret key from a mnemonic along the given HD path
pub fn derive_secret_key(
    mnemonic: &Mnemonic,
    password: &str,
    derivation_path: &str,
) -> Result<SecretKey, KeyStoreError> {
    let seed = mnemonic.to_seed(password);
    let path = derivation_path
        .parse::<bip32::DerivationPath>()
        .map_err(|err| KeyStoreError::Derivation(err.to_string()))?;
    let xprv = bip32::XPrv::derive_from_path(&seed, &path)
        .map_err(|err| KeyStoreError::Derivation(err.to_string()))?;

    Ok(SecretKey::from(xprv.private_key()))
}

/// Compressed SEC1 encoding of a public key, as carried in tx signer infos
pub fn compressed_public_key(public_key: &k256::PublicKey) -> Vec<u8> {
    public_key.to_encoded_point(true).as_bytes().to_vec()
}

fn key_name(name: &str) -> Result<KeyName, KeyStoreError> {
    KeyName::new(name).map_err(|_| KeyStoreError::InvalidName(name.to_string()))
}

// --- File Key Store ---
pub struct FileKeyStore {
    key_path: std::path::PathBuf,
    key_store: FsKeyStore,
}

impl FileKeyStore {
    fn create_or_open(path: &Path) -> Result<Self, KeyStoreError> {
        let key_store = FsKeyStore::create_or_open(path)
            .map_err(|err| KeyStoreError::CouldNotOpenOrCreateKeyStore(err.to_string()))?;

        Ok(FileKeyStore {
            key_path: path.to_path_buf(),
            key_store,
        })
    }
}

impl KeyStore for FileKeyStore {
    fn key_store_created(&self) -> bool {
        self.key_path.is_dir()
    }

    fn key_exists(&self, key_name: &KeyName) -> Result<bool, KeyStoreError> {
        Ok(self.key_store.info(key_name).is_ok())
    }

    fn add_key(
        &self,
        key_name: &KeyName,
        encoded_key: SecretDocument,
    ) -> Result<(), KeyStoreError> {
        self.key_store
            .store(key_name, &encoded_key)
            .map_err(|err| KeyStoreError::UnableToStoreKey(err.to_string()))
    }

    fn delete_key(&self, key_name: &KeyName) -> Result<(), KeyStoreError> {
        self.key_store
            .delete(key_name)
            .map_err(|err| KeyStoreError::UnableToDeleteKey(err.to_string()))
    }

    fn get_key(&self, key_name: &KeyName) -> Result<SecretDocument, KeyStoreError> {
        self.key_store
            .load(key_name)
            .map_err(|err| KeyStoreError::UnableToRetrieveKey(err.to_string()))
    }

    fn key_names(&self) -> Result<Vec<String>, KeyStoreError> {
        let entries =
            fs::read_dir(&self.key_path).map_err(|err| KeyStoreError::FileIO(err.to_string()))?;
        let mut names = BTreeSet::new();

        for entry in entries {
            let entry = entry.map_err(|err| KeyStoreError::FileIO(err.to_string()))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if let Some(name) = file_name.strip_suffix(".pem") {
                names.insert(name.to_string());
            }
        }

        Ok(names.into_iter().collect())
    }
}

// ---------------------------------- Tests ----------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::COSMOS_COIN_TYPE;

    fn scratch_keyring(dir: &str) -> (std::path::PathBuf, Keyring) {
        let path = std::env::temp_dir().join(dir);
        let _ = fs::remove_dir_all(&path);
        let keyring = Keyring::new_file_store(&path).expect("could not initialize keystore");
        (path, keyring)
    }

    #[test]
    fn file_key_store_create_and_reopen() {
        let (path, keyring) = scratch_keyring("spyglass_keyring_init");
        assert!(keyring.key_store_created());
        assert!(fs::metadata(&path).unwrap().is_dir());

        // reopening is idempotent
        let keyring = Keyring::new_file_store(&path).unwrap();
        assert!(keyring.key_store_created());

        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn create_key_and_existence() {
        let (path, mut keyring) = scratch_keyring("spyglass_keyring_create");

        assert!(!keyring.key_exists("dolphin").unwrap());
        keyring
            .create_key("dolphin", "", COSMOS_COIN_TYPE, false)
            .unwrap();
        assert!(keyring.key_exists("dolphin").unwrap());

        // creating again without override fails, with override succeeds
        assert!(matches!(
            keyring.create_key("dolphin", "", COSMOS_COIN_TYPE, false),
            Err(KeyStoreError::Exists(_))
        ));
        assert!(keyring
            .create_key("dolphin", "", COSMOS_COIN_TYPE, true)
            .is_ok());

        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn delete_key() {
        let (path, mut keyring) = scratch_keyring("spyglass_keyring_delete");

        assert!(matches!(
            keyring.delete_key("harambe"),
            Err(KeyStoreError::DoesNotExist(_))
        ));

        keyring
            .create_key("harambe", "", COSMOS_COIN_TYPE, false)
            .unwrap();
        keyring.delete_key("harambe").unwrap();
        assert!(!keyring.key_exists("harambe").unwrap());

        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn import_key_round_trip() {
        let (path, mut keyring) = scratch_keyring("spyglass_keyring_import");

        let mnemonic = keyring
            .create_key("celery", "", COSMOS_COIN_TYPE, false)
            .unwrap();
        let original = keyring
            .get_public_key_and_address("celery", "cosmos", AddressAlgo::Cosmos)
            .unwrap();

        keyring.delete_key("celery").unwrap();

        keyring
            .import_key("celery", mnemonic.phrase(), "", COSMOS_COIN_TYPE, false)
            .unwrap();
        let recovered = keyring
            .get_public_key_and_address("celery", "cosmos", AddressAlgo::Cosmos)
            .unwrap();

        assert_eq!(recovered.address, original.address);
        assert_eq!(recovered.public_key, original.public_key);

        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn import_rejects_bad_mnemonic() {
        let (path, mut keyring) = scratch_keyring("spyglass_keyring_bad_mnemonic");

        let result = keyring.import_key("bad", "not a mnemonic", "", COSMOS_COIN_TYPE, false);
        assert!(matches!(result, Err(KeyStoreError::InvalidMnemonic(_))));

        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn list_keys() {
        let (path, mut keyring) = scratch_keyring("spyglass_keyring_list");

        assert!(keyring.list_keys().unwrap().is_empty());

        keyring
            .create_key("car", "", COSMOS_COIN_TYPE, false)
            .unwrap();
        keyring
            .create_key("motorcycle", "", COSMOS_COIN_TYPE, false)
            .unwrap();

        let names = keyring.list_keys().unwrap();
        assert_eq!(names, vec!["car".to_string(), "motorcycle".to_string()]);

        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn export_and_reimport_via_pem() {
        let (path, mut keyring) = scratch_keyring("spyglass_keyring_export");

        keyring
            .create_key("trex", "", COSMOS_COIN_TYPE, false)
            .unwrap();
        let armored = keyring.export_armored("trex", "jenga").unwrap();
        assert!(armored.contains("ENCRYPTED PRIVATE KEY"));

        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn sign_produces_compact_signature() {
        let (path, mut keyring) = scratch_keyring("spyglass_keyring_sign");

        keyring
            .create_key("signer", "", COSMOS_COIN_TYPE, false)
            .unwrap();

        let sig = keyring
            .sign("signer", b"payload", AddressAlgo::Cosmos)
            .unwrap();
        assert_eq!(sig.len(), 64);

        let eth_sig = keyring
            .sign("signer", b"payload", AddressAlgo::EthSecp256k1)
            .unwrap();
        assert_eq!(eth_sig.len(), 64);
        assert_ne!(sig, eth_sig);

        fs::remove_dir_all(&path).unwrap();
    }
}
