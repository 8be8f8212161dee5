//! Byte-exact call data for the three TIP-20 (ERC-20 compatible) calls the
//! payment flow makes.
//!
//! Every payload is a 4-byte selector followed by 32-byte words. Addresses are
//! left-padded with zeros to fill their word, as are amounts.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

use crate::{PayError, TIP20};

/// Selector of `allowance(address,address)`.
pub const ALLOWANCE_SELECTOR: [u8; 4] = TIP20::allowanceCall::SELECTOR;

/// Selector of `approve(address,uint256)`.
pub const APPROVE_SELECTOR: [u8; 4] = TIP20::approveCall::SELECTOR;

/// Selector of `transfer(address,uint256)`.
pub const TRANSFER_SELECTOR: [u8; 4] = TIP20::transferCall::SELECTOR;

/// Parse a 20-byte address from hex, with or without a `0x` prefix.
///
/// Mixed case is accepted; the EIP-55 checksum is not enforced.
pub fn parse_address(s: &str) -> Result<Address, PayError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.len() != 40 {
        return Err(PayError::InvalidAddress(format!(
            "'{s}' must be 40 hex characters, got {}",
            digits.len()
        )));
    }
    let bytes = alloy::hex::decode(digits)
        .map_err(|e| PayError::InvalidAddress(format!("'{s}' is not hex: {e}")))?;
    Ok(Address::from_slice(&bytes))
}

/// `allowance(owner, spender)`: 68 bytes.
pub fn encode_allowance_query(owner: Address, spender: Address) -> Bytes {
    TIP20::allowanceCall { owner, spender }.abi_encode().into()
}

/// `approve(spender, amount)`: 68 bytes.
pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    TIP20::approveCall { spender, amount }.abi_encode().into()
}

/// `transfer(to, amount)`: 68 bytes.
pub fn encode_transfer(to: Address, amount: U256) -> Bytes {
    TIP20::transferCall { to, amount }.abi_encode().into()
}

/// Decode a single `uint256` return word.
pub fn decode_uint256(data: &[u8]) -> Result<U256, PayError> {
    match data.get(..32) {
        Some(word) => Ok(U256::from_be_slice(word)),
        None => Err(PayError::Query(format!(
            "expected a 32-byte uint256 word, got {} bytes",
            data.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "0x1111111111111111111111111111111111111111";
    const SPENDER: &str = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";

    fn word(hex_digits: &str) -> String {
        format!("{hex_digits:0>64}")
    }

    #[test]
    fn selectors_are_standard() {
        assert_eq!(ALLOWANCE_SELECTOR, [0xdd, 0x62, 0xed, 0x3e]);
        assert_eq!(APPROVE_SELECTOR, [0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(TRANSFER_SELECTOR, [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn allowance_query_layout() {
        let owner = parse_address(OWNER).unwrap();
        let spender = parse_address(SPENDER).unwrap();
        let data = encode_allowance_query(owner, spender);

        let expected = format!(
            "dd62ed3e{}{}",
            word("1111111111111111111111111111111111111111"),
            word("abcdef0123456789abcdef0123456789abcdef01"),
        );
        assert_eq!(alloy::hex::encode(&data), expected);
    }

    #[test]
    fn approve_layout() {
        let spender = parse_address(SPENDER).unwrap();
        let data = encode_approve(spender, U256::from(10_000_000u64));

        let expected = format!(
            "095ea7b3{}{}",
            word("abcdef0123456789abcdef0123456789abcdef01"),
            word("989680"),
        );
        assert_eq!(alloy::hex::encode(&data), expected);
    }

    #[test]
    fn transfer_layout() {
        let to = parse_address(OWNER).unwrap();
        let data = encode_transfer(to, U256::from(0x05d4_e8b3_02afu64));

        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &TRANSFER_SELECTOR);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..36], to.as_slice());
        assert_eq!(alloy::hex::encode(&data[36..]), word("5d4e8b302af"));
    }

    #[test]
    fn transfer_is_68_bytes_across_amount_range() {
        let to = parse_address(SPENDER).unwrap();
        for amount in [U256::ZERO, U256::from(1u8), U256::from(u128::MAX), U256::MAX] {
            let data = encode_transfer(to, amount);
            assert_eq!(data.len(), 4 + 32 + 32);
            assert_eq!(decode_uint256(&data[36..]).unwrap(), amount);
        }
        assert_eq!(alloy::hex::encode(&encode_transfer(to, U256::MAX)[36..]), "f".repeat(64));
    }

    #[test]
    fn parse_address_accepts_bare_and_prefixed() {
        let a = parse_address(OWNER).unwrap();
        let b = parse_address(&OWNER[2..]).unwrap();
        let c = parse_address("0X1111111111111111111111111111111111111111").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn parse_address_rejects_wrong_length() {
        for bad in [
            "",
            "0x",
            "0x111111111111111111111111111111111111111",
            "0x111111111111111111111111111111111111111111",
            "0x1111111111111111111111111111111111111111111111111111111111111111",
        ] {
            assert!(
                matches!(parse_address(bad), Err(PayError::InvalidAddress(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn parse_address_rejects_non_hex() {
        let err = parse_address("0xg111111111111111111111111111111111111111").unwrap_err();
        assert!(matches!(err, PayError::InvalidAddress(_)));
    }

    #[test]
    fn decode_uint256_needs_a_full_word() {
        assert!(matches!(decode_uint256(&[0u8; 31]), Err(PayError::Query(_))));
        let mut data = [0u8; 32];
        data[31] = 7;
        assert_eq!(decode_uint256(&data).unwrap(), U256::from(7u8));
    }
}
