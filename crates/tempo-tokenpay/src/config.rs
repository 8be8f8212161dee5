//! Payment engine configuration, injected at construction.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;

use crate::calldata::parse_address;
use crate::constants::{APPROVAL_CEILING_TOKENS, CUSTOM_TOKEN_BASE_DECIMALS};
use crate::units::{approval_ceiling, ConverterConfig, ExchangeRate};
use crate::{ChainConfig, Currency, PayError};

/// Everything a payment machine needs besides the intent and the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfig {
    pub chain: ChainConfig,
    pub converter: ConverterConfig,
    /// Allowance granted per approval, in custom-token base units. Used as-is
    /// for whichever token is being paid with.
    pub approval_ceiling: U256,
    /// Custom token contract. Required for `Currency::CustomToken` payments.
    pub custom_token: Option<Address>,
    /// Approval spender. Required: a machine cannot be built without one.
    pub spender: Option<Address>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            converter: ConverterConfig::default(),
            approval_ceiling: default_ceiling(),
            custom_token: None,
            spender: None,
        }
    }
}

fn default_ceiling() -> U256 {
    // 10^9 * 10^18 is far below 2^256
    U256::from(APPROVAL_CEILING_TOKENS)
        * U256::from(10u8).pow(U256::from(CUSTOM_TOKEN_BASE_DECIMALS))
}

impl PaymentConfig {
    /// Token contract for the given currency.
    pub fn token_for(&self, currency: Currency) -> Result<Address, PayError> {
        match currency {
            Currency::StableToken => Ok(self.chain.stable_token),
            Currency::CustomToken => self.custom_token.ok_or_else(|| {
                PayError::Config("TOKENPAY_CUSTOM_TOKEN is not configured".to_string())
            }),
        }
    }

    /// Load configuration from `TOKENPAY_*` environment variables.
    ///
    /// | Variable                     | Default                          |
    /// |------------------------------|----------------------------------|
    /// | `TOKENPAY_RPC_URL`           | Tempo Moderato RPC               |
    /// | `TOKENPAY_EXPLORER_BASE`     | Tempo Moderato explorer          |
    /// | `TOKENPAY_STABLE_TOKEN`      | pathUSD                          |
    /// | `TOKENPAY_CUSTOM_TOKEN`      | unset                            |
    /// | `TOKENPAY_SPENDER`           | unset (required to build a machine) |
    /// | `TOKENPAY_EXCHANGE_RATE`     | 0.00019962222061040273 USD/token |
    /// | `TOKENPAY_APPROVAL_CEILING`  | 1000000000 whole tokens          |
    /// | `TOKENPAY_QUOTE_PRECISION`   | unset                            |
    pub fn from_env() -> Result<Self, PayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PaymentConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = var("TOKENPAY_RPC_URL") {
            config.chain.rpc_url = url;
        }
        if let Some(base) = var("TOKENPAY_EXPLORER_BASE") {
            config.chain.explorer_base = base;
        }
        if let Some(addr) = var("TOKENPAY_STABLE_TOKEN") {
            config.chain.stable_token = parse_address(addr.trim())?;
        }
        config.custom_token = var("TOKENPAY_CUSTOM_TOKEN")
            .map(|s| parse_address(s.trim()))
            .transpose()?;
        config.spender = var("TOKENPAY_SPENDER")
            .map(|s| parse_address(s.trim()))
            .transpose()?;

        if let Some(rate) = var("TOKENPAY_EXCHANGE_RATE") {
            let rate: Decimal = rate.trim().parse().map_err(|e| {
                PayError::Config(format!("invalid TOKENPAY_EXCHANGE_RATE '{rate}': {e}"))
            })?;
            config.converter.rate = ExchangeRate::new(rate)?;
        }
        if let Some(tokens) = var("TOKENPAY_APPROVAL_CEILING") {
            let tokens: u64 = tokens.trim().parse().map_err(|e| {
                PayError::Config(format!("invalid TOKENPAY_APPROVAL_CEILING '{tokens}': {e}"))
            })?;
            config.approval_ceiling =
                approval_ceiling(tokens, config.converter.token_base_decimals)?;
        }
        if let Some(precision) = var("TOKENPAY_QUOTE_PRECISION") {
            let precision: u32 = precision.trim().parse().map_err(|e| {
                PayError::Config(format!(
                    "invalid TOKENPAY_QUOTE_PRECISION '{precision}': {e}"
                ))
            })?;
            config.converter.quote_precision = Some(precision);
        }

        Ok(config)
    }
}
