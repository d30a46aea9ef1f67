use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("address must have 40 hex digits, got {0}")]
    InvalidLength(usize),
    #[error("address contains non-hex characters: {0}")]
    InvalidHex(String),
    #[error("address checksum mismatch: {0}")]
    ChecksumMismatch(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanetError {
    #[error("planet id must not be empty")]
    EmptyId,
    #[error("planet name must not be empty for planet {0}")]
    EmptyName(String),
}
