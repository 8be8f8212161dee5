use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which token a payment settles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Currency {
    /// USD-pegged stable token, priced 1:1.
    StableToken,
    /// Custom token, priced through the configured exchange rate.
    CustomToken,
}

/// One user-initiated payment. Built once and never mutated; the payment
/// machine only hands out shared references to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Exact decimal USD price; serialized as a string.
    pub amount_usd: Decimal,
    pub currency: Currency,
    pub recipient: Address,
    pub token: Address,
    pub payer: Address,
    pub order_reference: String,
}

impl PaymentIntent {
    pub fn new(
        amount_usd: Decimal,
        currency: Currency,
        recipient: Address,
        token: Address,
        payer: Address,
        order_reference: impl Into<String>,
    ) -> Self {
        Self {
            amount_usd,
            currency,
            recipient,
            token,
            payer,
            order_reference: order_reference.into(),
        }
    }
}
