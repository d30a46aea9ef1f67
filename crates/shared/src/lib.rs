pub mod domain;
pub mod eip55;
pub mod error;
pub mod protocol;
