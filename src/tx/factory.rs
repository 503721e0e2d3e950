//! Per-transaction construction state: chain id, account number, sequence,
//! gas pricing. One factory is built per send from the chain config and
//! discarded afterwards.
use std::str::FromStr;

use cosmrs::{Any, Coin, Denom};
use eyre::{eyre, Result, WrapErr};

use crate::{
    account,
    chain::{ChainClientConfig, SignMode},
    error::{ChainClientError, TxError},
    rpc::RpcHttpClient,
    tx::{FeeInfo, UnsignedTx},
};

#[derive(Clone, Debug)]
pub struct TxFactory {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub gas_adjustment: f64,
    pub gas_prices: String,
    pub min_gas_amount: u64,
    pub sign_mode: SignMode,
    pub memo: String,
}

impl TxFactory {
    /// Builds a factory from the chain config with account state unset.
    /// Assumes the config has been validated.
    pub fn from_config(config: &ChainClientConfig) -> Result<TxFactory, ChainClientError> {
        Ok(TxFactory {
            chain_id: config.chain_id.clone(),
            account_number: 0,
            sequence: 0,
            gas_adjustment: config.gas_adjustment,
            gas_prices: config.gas_prices.clone(),
            min_gas_amount: config.min_gas_amount,
            sign_mode: config.sign_mode()?,
            memo: String::new(),
        })
    }

    /// Fills in the signer's account number and sequence from chain state,
    /// unless the caller already set them
    pub async fn prepare(
        &mut self,
        rpc: &RpcHttpClient,
        signer_address: &str,
    ) -> Result<(), ChainClientError> {
        if self.account_number == 0 && self.sequence == 0 {
            let (account_number, sequence) =
                account::account_number_sequence(rpc, signer_address).await?;
            self.account_number = account_number;
            self.sequence = sequence;
        }

        Ok(())
    }

    /// Builds an unsigned tx from the given messages, attaching the
    /// factory's memo if one is set
    pub fn build_tx(&self, msgs: Vec<Any>) -> Result<UnsignedTx, TxError> {
        let mut tx = UnsignedTx::new();
        tx.add_msgs(msgs)?;
        if !self.memo.is_empty() {
            tx.memo(self.memo.clone())?;
        }

        Ok(tx)
    }

    /// Applies the configured gas adjustment to a simulated amount and
    /// enforces the configured floor
    pub fn adjust_gas(&self, simulated: u64) -> u64 {
        let adjusted = (simulated as f64 * self.gas_adjustment).ceil() as u64;

        adjusted.max(self.min_gas_amount)
    }

    /// Prices a gas amount against the configured gas prices string,
    /// e.g. "0.025uatom", rounding the fee up
    pub fn fee_from_gas(&self, gas_limit: u64) -> Result<FeeInfo, TxError> {
        let (price, denom) = parse_gas_prices(&self.gas_prices)?;
        let amount = (price * gas_limit as f64).ceil() as u128;
        let coin = Coin {
            denom,
            amount,
        };

        Ok(FeeInfo::new(coin, gas_limit))
    }
}

fn parse_gas_prices(gas_prices: &str) -> Result<(f64, Denom)> {
    let split = gas_prices
        .find(|c: char| c != '.' && !c.is_ascii_digit())
        .ok_or_else(|| eyre!("no denom in gas prices '{gas_prices}'"))?;
    let (price, denom) = gas_prices.split_at(split);

    let price = f64::from_str(price)
        .wrap_err_with(|| format!("bad price in gas prices '{gas_prices}'"))?;
    let denom = Denom::from_str(denom)
        .map_err(|err| eyre!("bad denom in gas prices '{gas_prices}': {err}"))?;

    Ok((price, denom))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_factory() -> TxFactory {
        TxFactory {
            chain_id: "cosmoshub-4".to_string(),
            account_number: 1,
            sequence: 0,
            gas_adjustment: 1.2,
            gas_prices: "0.025uatom".to_string(),
            min_gas_amount: 0,
            sign_mode: SignMode::Direct,
            memo: String::new(),
        }
    }

    #[test]
    fn fee_rounds_up() {
        let factory = test_factory();
        let fee = factory.fee_from_gas(200_000).unwrap();

        assert_eq!(fee.amount().amount, 5_000);
        assert_eq!(fee.gas_limit(), 200_000);
        assert_eq!(fee.amount().denom.as_ref(), "uatom");

        // 0.025 * 100001 = 2500.025, rounds to 2501
        let fee = factory.fee_from_gas(100_001).unwrap();
        assert_eq!(fee.amount().amount, 2_501);
    }

    #[test]
    fn integer_gas_prices() {
        let mut factory = test_factory();
        factory.gas_prices = "25000000000aevmos".to_string();

        let fee = factory.fee_from_gas(21_000).unwrap();
        assert_eq!(fee.amount().amount, 25_000_000_000u128 * 21_000);
        assert_eq!(fee.amount().denom.as_ref(), "aevmos");
    }

    #[test]
    fn malformed_gas_prices() {
        let mut factory = test_factory();

        factory.gas_prices = "uatom".to_string();
        assert!(factory.fee_from_gas(1).is_err());

        factory.gas_prices = "0.025".to_string();
        assert!(factory.fee_from_gas(1).is_err());

        factory.gas_prices = String::new();
        assert!(factory.fee_from_gas(1).is_err());
    }

    #[test]
    fn build_tx_attaches_factory_memo() {
        let msg = Any {
            type_url: "/cosmos.bank.v1beta1.MsgSend".to_string(),
            value: vec![1, 2, 3],
        };

        let mut factory = test_factory();
        let tx = factory.build_tx(vec![msg.clone()]).unwrap();
        assert!(tx.body().memo.is_empty());

        factory.memo = "rebalance".to_string();
        let tx = factory.build_tx(vec![msg]).unwrap();

        let body = tx.body();
        assert_eq!(body.memo, "rebalance");
        assert_eq!(body.messages.len(), 1);
    }

    #[test]
    fn gas_adjustment_and_floor() {
        let mut factory = test_factory();
        assert_eq!(factory.adjust_gas(100_000), 120_000);

        factory.min_gas_amount = 250_000;
        assert_eq!(factory.adjust_gas(100_000), 250_000);
    }
}
