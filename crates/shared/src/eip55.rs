//! EIP-55 mixed-case checksum encoding for 20-byte addresses.

use tiny_keccak::{Hasher, Keccak};

use crate::{domain::Address, error::AddressError};

const PREFIX: &str = "0x";
const HEX_DIGITS: usize = Address::LEN * 2;

/// Returns whether `address` is a well-formed, correctly checksummed address.
///
/// With `allow_one_case`, an all-lowercase or all-uppercase body is accepted
/// without a checksum, since it carries none.
pub fn verify(address: &str, allow_one_case: bool) -> bool {
    check(address, allow_one_case).is_ok()
}

/// Parses an address, applying the same rules as [`verify`].
pub fn parse(address: &str, allow_one_case: bool) -> Result<Address, AddressError> {
    let body = check(address, allow_one_case)?;
    let mut bytes = [0u8; Address::LEN];
    hex::decode_to_slice(body, &mut bytes)
        .map_err(|_| AddressError::InvalidHex(address.to_string()))?;
    Ok(Address::from_bytes(bytes))
}

pub fn to_checksum(address: &Address) -> String {
    format!("{PREFIX}{}", checksum_body(&hex::encode(address.as_bytes())))
}

fn check(address: &str, allow_one_case: bool) -> Result<&str, AddressError> {
    let body = address
        .strip_prefix(PREFIX)
        .ok_or_else(|| AddressError::MissingPrefix(address.to_string()))?;
    if !body.is_ascii() || body.len() != HEX_DIGITS {
        return Err(AddressError::InvalidLength(body.chars().count()));
    }
    if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AddressError::InvalidHex(address.to_string()));
    }

    if allow_one_case && is_one_case(body) {
        return Ok(body);
    }

    if checksum_body(&body.to_ascii_lowercase()) != body {
        return Err(AddressError::ChecksumMismatch(address.to_string()));
    }
    Ok(body)
}

fn is_one_case(body: &str) -> bool {
    !body.bytes().any(|b| b.is_ascii_uppercase()) || !body.bytes().any(|b| b.is_ascii_lowercase())
}

fn checksum_body(lower_hex: &str) -> String {
    let mut hasher = Keccak::v256();
    hasher.update(lower_hex.as_bytes());
    let mut digest = [0u8; 32];
    hasher.finalize(&mut digest);

    lower_hex
        .char_indices()
        .map(|(i, c)| {
            let nibble = if i % 2 == 0 {
                digest[i / 2] >> 4
            } else {
                digest[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn reference_vectors_verify_in_strict_mode() {
        for address in CHECKSUMMED {
            assert!(verify(address, false), "{address}");
        }
    }

    #[test]
    fn checksum_encoding_matches_reference_vectors() {
        for address in CHECKSUMMED {
            let parsed = parse(address, false).expect("parse");
            assert_eq!(to_checksum(&parsed), address);
        }
    }

    #[test]
    fn one_case_body_needs_relaxed_mode() {
        let lower = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
        let upper = "0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED";
        assert!(verify(lower, true));
        assert!(verify(upper, true));
        assert!(!verify(lower, false));
        assert!(!verify(upper, false));
    }

    #[test]
    fn wrong_mixed_case_fails_even_when_relaxed() {
        assert!(!verify("0x5aaeb6053F3E94C9b9A09f33669435E7Ef1BeAed", true));
        assert_eq!(
            parse("0x5aaeb6053F3E94C9b9A09f33669435E7Ef1BeAed", true),
            Err(AddressError::ChecksumMismatch(
                "0x5aaeb6053F3E94C9b9A09f33669435E7Ef1BeAed".into()
            ))
        );
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(
            parse("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed", true),
            Err(AddressError::MissingPrefix(_))
        ));
        assert!(matches!(
            parse("0x5aAeb6053F3E94C9", true),
            Err(AddressError::InvalidLength(18))
        ));
        assert!(matches!(
            parse("0xzzzeb6053f3e94c9b9a09f33669435e7ef1beaed", true),
            Err(AddressError::InvalidHex(_))
        ));
        assert!(!verify("", true));
    }
}
