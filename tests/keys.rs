use std::fs;
use std::path::PathBuf;

use assay::assay;
use spyglass::address::AddressAlgo;
use spyglass::chain::{COSMOS_COIN_TYPE, ETH_COIN_TYPE};
use spyglass::keyring::Keyring;

const COSMOS_MNEMONIC: &str = "blind master acoustic speak victory lend kiss grab glad help demand hood roast zone lend sponsor level cheap truck kingdom apology token hover reunion";
const ETH_MNEMONIC: &str = "three elevator silk family street child flip also leaf inmate call frame shock little legal october vivid enable fetch siege sell burger dolphin green";

fn scratch_keyring(dir: &str) -> (PathBuf, Keyring) {
    let path = std::env::temp_dir().join(dir);
    let _ = fs::remove_dir_all(&path);
    let keyring = Keyring::new_file_store(&path).expect("could not initialize keystore");
    (path, keyring)
}

#[assay]
fn cosmos_coin_type_derivation() {
    let (path, mut keyring) = scratch_keyring("spyglass_vectors_cosmos");

    keyring.import_key("test_key", COSMOS_MNEMONIC, "", COSMOS_COIN_TYPE, false)?;
    let output = keyring.get_public_key_and_address("test_key", "cosmos", AddressAlgo::Cosmos)?;

    assert_eq!(
        output.address,
        "cosmos15cw268ckjj2hgq8q3jf68slwjjcjlvxy57je2u"
    );

    fs::remove_dir_all(path)?;
}

#[assay]
fn eth_coin_type_derivation() {
    let (path, mut keyring) = scratch_keyring("spyglass_vectors_eth");

    keyring.import_key("test_key", ETH_MNEMONIC, "", ETH_COIN_TYPE, false)?;
    let output =
        keyring.get_public_key_and_address("test_key", "evmos", AddressAlgo::EthSecp256k1)?;

    assert_eq!(
        output.address,
        "evmos1dea7vlekr9e34vugwkvesulglt8fx4e457vk9z"
    );

    fs::remove_dir_all(path)?;
}

#[assay]
fn eth_address_bytes_are_prefix_independent() {
    let (path, mut keyring) = scratch_keyring("spyglass_vectors_inj");

    keyring.import_key("test_key", ETH_MNEMONIC, "", ETH_COIN_TYPE, false)?;
    let output =
        keyring.get_public_key_and_address("test_key", "inj", AddressAlgo::EthSecp256k1)?;

    // same key as the evmos vector; only the bech32 prefix differs
    assert_eq!(output.address, "inj1dea7vlekr9e34vugwkvesulglt8fx4e4uk2udj");

    fs::remove_dir_all(path)?;
}

#[assay]
fn coin_type_changes_the_derived_key() {
    let (path, mut keyring) = scratch_keyring("spyglass_vectors_coin_type");

    keyring.import_key("cosmos_path", ETH_MNEMONIC, "", COSMOS_COIN_TYPE, false)?;
    keyring.import_key("eth_path", ETH_MNEMONIC, "", ETH_COIN_TYPE, false)?;

    let a = keyring.get_public_key_and_address("cosmos_path", "cosmos", AddressAlgo::Cosmos)?;
    let b = keyring.get_public_key_and_address("eth_path", "cosmos", AddressAlgo::Cosmos)?;
    assert_ne!(a.public_key, b.public_key);

    fs::remove_dir_all(path)?;
}
