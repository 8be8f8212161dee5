//! Fixed-point conversion from USD amounts to integer token units.
//!
//! Two rounding rules live here and must not be unified:
//! - stable token: `trunc(usd * 10^stable_decimals)`
//! - custom token: `round(usd / rate * 10^display_decimals)`, half away from zero
//!
//! Amounts and rates are [`Decimal`]s and every conversion is carried out on
//! their integer mantissas in 256-bit arithmetic, so no binary float rounding
//! ever reaches a payload.
//!
//! The transfer payload precision (`stable_decimals`, `display_decimals`) is a
//! different number from the custom token's base-unit precision
//! (`token_base_decimals`), which only the approval ceiling uses. The three
//! are separate fields of [`ConverterConfig`] and are never substituted for
//! one another.

use alloy::primitives::U256;
use rust_decimal::Decimal;

use crate::constants::{
    CUSTOM_TOKEN_BASE_DECIMALS, DEFAULT_EXCHANGE_RATE, DISPLAY_DECIMALS, STABLE_DECIMALS,
};
use crate::{Currency, PayError};

/// USD value of one custom token. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeRate(Decimal);

impl ExchangeRate {
    pub fn new(usd_per_token: Decimal) -> Result<Self, PayError> {
        if usd_per_token <= Decimal::ZERO {
            return Err(PayError::Config(format!(
                "exchange rate must be positive, got {usd_per_token}"
            )));
        }
        Ok(Self(usd_per_token))
    }

    pub fn usd_per_token(self) -> Decimal {
        self.0
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        Self(DEFAULT_EXCHANGE_RATE)
    }
}

/// Precision and pricing used to turn an intent's USD amount into units.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterConfig {
    /// Payload precision for stable-token transfers.
    pub stable_decimals: u32,
    /// Payload precision for custom-token transfers.
    pub display_decimals: u32,
    /// The custom token's on-chain base-unit precision (ceiling only).
    pub token_base_decimals: u32,
    pub rate: ExchangeRate,
    /// When set, the custom-token quantity is rounded to this many decimals
    /// (the quote shown to the payer) before scaling.
    pub quote_precision: Option<u32>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            stable_decimals: STABLE_DECIMALS,
            display_decimals: DISPLAY_DECIMALS,
            token_base_decimals: CUSTOM_TOKEN_BASE_DECIMALS,
            rate: ExchangeRate::default(),
            quote_precision: None,
        }
    }
}

impl ConverterConfig {
    /// Transfer amount for `amount_usd` in the given currency, at payload precision.
    pub fn to_token_units(
        &self,
        amount_usd: Decimal,
        currency: Currency,
    ) -> Result<i128, PayError> {
        match (currency, self.quote_precision) {
            (Currency::StableToken, _) => {
                to_token_units(amount_usd, currency, self.rate, self.stable_decimals)
            }
            (Currency::CustomToken, None) => {
                to_token_units(amount_usd, currency, self.rate, self.display_decimals)
            }
            (Currency::CustomToken, Some(precision)) => {
                let quoted = quoted_magnitude(amount_usd, self.rate, precision)?;
                let units = if self.display_decimals >= precision {
                    checked_mul(quoted, pow10(self.display_decimals - precision)?)?
                } else {
                    div_round_half_away(quoted, pow10(precision - self.display_decimals)?)
                };
                signed_units(units, amount_usd.is_sign_negative())
            }
        }
    }

    /// Token quantity the payer is quoted for `amount_usd`.
    pub fn quote(&self, amount_usd: Decimal, currency: Currency) -> Result<Decimal, PayError> {
        match currency {
            Currency::StableToken => Ok(amount_usd),
            Currency::CustomToken => match self.quote_precision {
                Some(precision) => {
                    let quoted = quoted_magnitude(amount_usd, self.rate, precision)?;
                    let mantissa = signed_units(quoted, amount_usd.is_sign_negative())?;
                    Decimal::try_from_i128_with_scale(mantissa, precision).map_err(|e| {
                        PayError::Encoding(format!("quote at {precision} decimals: {e}"))
                    })
                }
                None => amount_usd
                    .checked_div(self.rate.usd_per_token())
                    .ok_or_else(|| {
                        PayError::Encoding(format!("quote for {amount_usd} USD overflows"))
                    }),
            },
        }
    }
}

/// Convert a USD amount into integer token units at `decimals` precision.
///
/// Stable token truncates toward zero; custom token divides by `rate` first
/// and rounds half away from zero. Both are exact. Results outside the
/// `i128` range fail with [`PayError::Encoding`].
pub fn to_token_units(
    amount_usd: Decimal,
    currency: Currency,
    rate: ExchangeRate,
    decimals: u32,
) -> Result<i128, PayError> {
    let magnitude = match currency {
        Currency::StableToken => {
            let (numerator, denominator) = ratio(amount_usd, Decimal::ONE, decimals)?;
            numerator / denominator
        }
        Currency::CustomToken => {
            let (numerator, denominator) = ratio(amount_usd, rate.usd_per_token(), decimals)?;
            div_round_half_away(numerator, denominator)
        }
    };
    signed_units(magnitude, amount_usd.is_sign_negative())
}

/// Render token units as `0x`-prefixed lower-case hex without leading zeros.
pub fn to_hex(units: i128) -> Result<String, PayError> {
    units_to_u256(units).map(u256_to_hex)
}

/// Hex form of any 256-bit amount, `0x0` for zero.
pub fn u256_to_hex(value: U256) -> String {
    if value.is_zero() {
        return "0x0".to_string();
    }
    format!("0x{value:x}")
}

/// Inverse of [`u256_to_hex`]. The `0x` prefix is optional.
pub fn parse_hex_amount(hex: &str) -> Result<U256, PayError> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(PayError::Encoding(format!("invalid hex amount '{hex}'")));
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| PayError::Encoding(format!("hex amount '{hex}' exceeds 256 bits: {e}")))
}

/// Token units as a call-data amount. Negative units fail.
pub fn units_to_u256(units: i128) -> Result<U256, PayError> {
    u128::try_from(units)
        .map(U256::from)
        .map_err(|_| PayError::Encoding(format!("negative amount {units} cannot be encoded")))
}

/// `whole_tokens * 10^base_decimals`, checked against 256-bit overflow.
pub fn approval_ceiling(whole_tokens: u64, base_decimals: u32) -> Result<U256, PayError> {
    U256::from(10u8)
        .checked_pow(U256::from(base_decimals))
        .and_then(|scale| U256::from(whole_tokens).checked_mul(scale))
        .ok_or_else(|| {
            PayError::Encoding(format!(
                "approval ceiling {whole_tokens} x 10^{base_decimals} exceeds 256 bits"
            ))
        })
}

/// `|amount| / divisor * 10^decimals` as an exact fraction of integers.
///
/// With `amount = a * 10^-sa` and `divisor = d * 10^-sd` this is
/// `a * 10^(sd + decimals) / (d * 10^sa)`.
fn ratio(amount: Decimal, divisor: Decimal, decimals: u32) -> Result<(U256, U256), PayError> {
    let scale_up = pow10(divisor.scale().saturating_add(decimals))?;
    let numerator = checked_mul(magnitude(amount), scale_up)?;
    let denominator = checked_mul(magnitude(divisor), pow10(amount.scale())?)?;
    if denominator.is_zero() {
        return Err(PayError::Encoding(format!(
            "cannot divide {amount} by {divisor}"
        )));
    }
    Ok((numerator, denominator))
}

/// Custom-token quantity rounded to `precision` decimals, as an integer
/// mantissa at that precision.
fn quoted_magnitude(amount: Decimal, rate: ExchangeRate, precision: u32) -> Result<U256, PayError> {
    let (numerator, denominator) = ratio(amount, rate.usd_per_token(), precision)?;
    Ok(div_round_half_away(numerator, denominator))
}

fn magnitude(value: Decimal) -> U256 {
    U256::from(value.mantissa().unsigned_abs())
}

fn pow10(exponent: u32) -> Result<U256, PayError> {
    U256::from(10u8)
        .checked_pow(U256::from(exponent))
        .ok_or_else(|| PayError::Encoding(format!("10^{exponent} exceeds 256 bits")))
}

fn checked_mul(a: U256, b: U256) -> Result<U256, PayError> {
    a.checked_mul(b)
        .ok_or_else(|| PayError::Encoding(format!("{a} x {b} exceeds 256 bits")))
}

// Operates on magnitudes, so rounding half up here is half away from zero
// once the sign is reapplied.
fn div_round_half_away(numerator: U256, denominator: U256) -> U256 {
    let (quotient, remainder) = numerator.div_rem(denominator);
    if remainder >= denominator - remainder {
        quotient + U256::from(1u8)
    } else {
        quotient
    }
}

fn signed_units(magnitude: U256, negative: bool) -> Result<i128, PayError> {
    let units = i128::try_from(magnitude)
        .map_err(|_| PayError::Encoding(format!("{magnitude} token units is out of range")))?;
    Ok(if negative { -units } else { units })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(raw: &str) -> Decimal {
        raw.parse().unwrap()
    }

    fn rate() -> ExchangeRate {
        ExchangeRate::new(usd("0.00019962222061040273")).unwrap()
    }

    #[test]
    fn ten_dollars_stable() {
        let units = to_token_units(usd("10"), Currency::StableToken, rate(), 6).unwrap();
        assert_eq!(units, 10_000_000);
        assert_eq!(to_hex(units).unwrap(), "0x989680");
    }

    #[test]
    fn five_dollars_custom() {
        let units = to_token_units(usd("5.00"), Currency::CustomToken, rate(), 6).unwrap();
        // 5 / rate = 25047.3117907968...
        assert_eq!(units, 25_047_311_791);
    }

    #[test]
    fn default_rate_matches_configured_constant() {
        assert_eq!(ExchangeRate::default(), rate());
    }

    #[test]
    fn quoted_custom_amount_uses_displayed_quantity() {
        let config = ConverterConfig {
            quote_precision: Some(1),
            ..ConverterConfig::default()
        };
        assert_eq!(
            config.quote(usd("5"), Currency::CustomToken).unwrap(),
            usd("25047.3")
        );
        assert_eq!(
            config.to_token_units(usd("5"), Currency::CustomToken).unwrap(),
            25_047_300_000
        );
    }

    #[test]
    fn quote_precision_finer_than_payload_rounds_again() {
        let config = ConverterConfig {
            display_decimals: 2,
            quote_precision: Some(3),
            rate: ExchangeRate::new(usd("1")).unwrap(),
            ..ConverterConfig::default()
        };
        // 0.0045 -> 0.005 at the quote, then 0.01 at the payload
        assert_eq!(
            config.to_token_units(usd("0.0045"), Currency::CustomToken).unwrap(),
            1
        );
    }

    #[test]
    fn stable_is_exact_for_decimal_prices() {
        let units = to_token_units(usd("2.01"), Currency::StableToken, rate(), 6).unwrap();
        assert_eq!(units, 2_010_000);
        let units = to_token_units(usd("1.005"), Currency::StableToken, rate(), 6).unwrap();
        assert_eq!(units, 1_005_000);
        let units = to_token_units(usd("4.1"), Currency::StableToken, rate(), 6).unwrap();
        assert_eq!(units, 4_100_000);
    }

    #[test]
    fn stable_units_for_every_cent_price() {
        for cents in 1..=10_000i64 {
            let amount = Decimal::new(cents, 2);
            let units = to_token_units(amount, Currency::StableToken, rate(), 6).unwrap();
            assert_eq!(units, i128::from(cents) * 10_000, "{amount} USD");
        }
    }

    #[test]
    fn stable_truncates_sub_unit_digits() {
        let units = to_token_units(usd("0.0000019"), Currency::StableToken, rate(), 6).unwrap();
        assert_eq!(units, 1);
        let units = to_token_units(usd("1.2345679"), Currency::StableToken, rate(), 6).unwrap();
        assert_eq!(units, 1_234_567);
    }

    #[test]
    fn custom_rounds_half_away_from_zero() {
        let one = ExchangeRate::new(Decimal::ONE).unwrap();
        assert_eq!(
            to_token_units(usd("0.0000025"), Currency::CustomToken, one, 6).unwrap(),
            3
        );
        assert_eq!(
            to_token_units(usd("0.0000024"), Currency::CustomToken, one, 6).unwrap(),
            2
        );
        assert_eq!(
            to_token_units(usd("-0.0000025"), Currency::CustomToken, one, 6).unwrap(),
            -3
        );
        // the stable path would truncate the same input
        assert_eq!(
            to_token_units(usd("0.0000025"), Currency::StableToken, one, 6).unwrap(),
            2
        );
    }

    #[test]
    fn custom_rounding_is_exact_at_the_midpoint() {
        // 0.0000015 / 0.2 = 0.0000075, exactly half a unit above 7
        let fifth = ExchangeRate::new(usd("0.2")).unwrap();
        assert_eq!(
            to_token_units(usd("0.0000015"), Currency::CustomToken, fifth, 6).unwrap(),
            8
        );
    }

    #[test]
    fn decimals_are_independent_per_currency() {
        let config = ConverterConfig {
            stable_decimals: 2,
            display_decimals: 4,
            rate: ExchangeRate::new(usd("0.5")).unwrap(),
            ..ConverterConfig::default()
        };
        assert_eq!(config.to_token_units(usd("1"), Currency::StableToken).unwrap(), 100);
        assert_eq!(config.to_token_units(usd("1"), Currency::CustomToken).unwrap(), 20_000);
        assert_eq!(config.token_base_decimals, 18);
    }

    #[test]
    fn rejects_oversized_results() {
        assert!(matches!(
            to_token_units(Decimal::MAX, Currency::StableToken, rate(), 18),
            Err(PayError::Encoding(_))
        ));
        assert!(matches!(
            to_token_units(Decimal::MAX, Currency::CustomToken, rate(), 6),
            Err(PayError::Encoding(_))
        ));
        assert!(matches!(
            to_token_units(usd("1"), Currency::StableToken, rate(), 39),
            Err(PayError::Encoding(_))
        ));
        assert!(matches!(
            to_token_units(usd("1"), Currency::StableToken, rate(), 90),
            Err(PayError::Encoding(_))
        ));
    }

    #[test]
    fn rate_must_be_positive() {
        assert!(ExchangeRate::new(Decimal::ZERO).is_err());
        assert!(ExchangeRate::new(usd("-1")).is_err());
    }

    #[test]
    fn to_hex_format() {
        assert_eq!(to_hex(0).unwrap(), "0x0");
        assert_eq!(to_hex(1).unwrap(), "0x1");
        assert_eq!(to_hex(255).unwrap(), "0xff");
        assert_eq!(to_hex(4096).unwrap(), "0x1000");
    }

    #[test]
    fn to_hex_rejects_negative() {
        assert!(matches!(to_hex(-1), Err(PayError::Encoding(_))));
        let negative = to_token_units(usd("-2.5"), Currency::StableToken, rate(), 6).unwrap();
        assert_eq!(negative, -2_500_000);
        assert!(to_hex(negative).is_err());
    }

    #[test]
    fn hex_decodes_to_original_units() {
        for units in [0i128, 1, 10_000_000, 25_047_311_791, i128::MAX] {
            let hex = to_hex(units).unwrap();
            assert_eq!(parse_hex_amount(&hex).unwrap(), U256::from(units as u128));
        }
        let wide = [
            U256::MAX,
            U256::from(1u8) << 255usize,
            U256::from(u128::MAX) + U256::from(1u8),
        ];
        for value in wide {
            assert_eq!(parse_hex_amount(&u256_to_hex(value)).unwrap(), value);
        }
    }

    #[test]
    fn u256_hex_has_no_leading_zeros() {
        assert_eq!(u256_to_hex(U256::ZERO), "0x0");
        assert_eq!(u256_to_hex(U256::from(0x0abcu64)), "0xabc");
        assert_eq!(u256_to_hex(U256::MAX), format!("0x{}", "f".repeat(64)));
    }

    #[test]
    fn parse_hex_rejects_garbage_and_overflow() {
        assert!(parse_hex_amount("0x").is_err());
        assert!(parse_hex_amount("0xzz").is_err());
        assert!(parse_hex_amount(&format!("0x1{}", "0".repeat(64))).is_err());
        assert_eq!(parse_hex_amount("989680").unwrap(), U256::from(10_000_000u64));
    }

    #[test]
    fn ceiling_in_base_units() {
        let ceiling = approval_ceiling(1_000_000_000, 18).unwrap();
        assert_eq!(ceiling, U256::from(10u8).pow(U256::from(27u8)));
        assert!(approval_ceiling(u64::MAX, 77).is_err());
    }
}
