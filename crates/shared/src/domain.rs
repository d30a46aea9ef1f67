use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{
    eip55,
    error::{AddressError, PlanetError},
};

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_newtype!(PlanetId);
string_newtype!(TxId);

/// Sentinel stored in place of an amount the user typed but that does not parse.
pub const INVALID_AMOUNT: Decimal = Decimal::NEGATIVE_ONE;

/// Coerces raw amount input into a decimal. Empty or malformed input maps to
/// [`INVALID_AMOUNT`] so the positivity check rejects it.
pub fn parse_amount_input(input: &str) -> Decimal {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return INVALID_AMOUNT;
    }

    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .unwrap_or(INVALID_AMOUNT)
}

/// A 20-byte account address. Displays in EIP-55 checksummed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; Address::LEN]);

impl Address {
    pub const LEN: usize = 20;

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    pub fn to_checksum(&self) -> String {
        eip55::to_checksum(self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        eip55::parse(s.trim(), true)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_checksum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planet {
    pub id: PlanetId,
    pub name: String,
}

impl Planet {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, PlanetError> {
        let id = id.into();
        let name = name.into();
        if id.trim().is_empty() {
            return Err(PlanetError::EmptyId);
        }
        if name.trim().is_empty() {
            return Err(PlanetError::EmptyName(id));
        }
        Ok(Self {
            id: PlanetId(id),
            name,
        })
    }
}

/// Registered route from a target planet to the contract that accepts bridged funds for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgePair {
    pub planet_id: PlanetId,
    pub bridge_address: Address,
    pub name: String,
}

/// Signing credential of the active session. Wiped from memory on drop.
#[derive(Clone)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_or_garbage_amount_coerces_to_sentinel() {
        assert_eq!(parse_amount_input(""), INVALID_AMOUNT);
        assert_eq!(parse_amount_input("   "), INVALID_AMOUNT);
        assert_eq!(parse_amount_input("five"), INVALID_AMOUNT);
        assert_eq!(parse_amount_input("1.2.3"), INVALID_AMOUNT);
    }

    #[test]
    fn decimal_amount_keeps_precision() {
        assert_eq!(parse_amount_input("5.0"), Decimal::new(50, 1));
        assert_eq!(parse_amount_input(" 0.01 "), Decimal::new(1, 2));
        assert_eq!(parse_amount_input("1e2"), Decimal::new(100, 0));
    }

    #[test]
    fn address_displays_checksummed_form() {
        let address: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
            .parse()
            .expect("lowercase address");
        assert_eq!(
            address.to_string(),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn address_serde_uses_checksum_string() {
        let address: Address = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"
            .parse()
            .expect("address");
        let json = serde_json::to_string(&address).expect("serialize");
        assert_eq!(json, "\"0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359\"");

        let err = serde_json::from_str::<Address>("\"0xnothex\"").expect_err("must fail");
        assert!(err.to_string().contains("40 hex digits"), "{err}");
    }

    #[test]
    fn planet_requires_id_and_name() {
        assert_eq!(Planet::new(" ", "odin"), Err(PlanetError::EmptyId));
        assert_eq!(
            Planet::new("0x000000000000", ""),
            Err(PlanetError::EmptyName("0x000000000000".into()))
        );
        let planet = Planet::new("0x000000000000", "Odin").expect("planet");
        assert_eq!(planet.id, PlanetId::from("0x000000000000"));
    }

    #[test]
    fn private_key_debug_is_redacted() {
        let key = PrivateKey::new("deadbeef");
        assert_eq!(format!("{key:?}"), "PrivateKey(<redacted>)");
        assert_eq!(key.expose(), "deadbeef");
    }
}
