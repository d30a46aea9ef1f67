use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Address, PlanetId, TxId};

/// Coarse-grained state of one transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferPhase {
    #[default]
    Ready,
    SendTx,
    Sending,
    Finished,
}

impl TransferPhase {
    pub fn is_loading(self) -> bool {
        matches!(self, Self::SendTx | Self::Sending)
    }
}

/// What gets handed to the transfer collaborator for signing and broadcast,
/// after any bridge substitution has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub recipient: Address,
    pub amount: Decimal,
    pub memo: String,
    pub target_planet: PlanetId,
    pub interplanetary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Success,
    Failure,
    Timeout,
}

impl ConfirmationStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub tx_id: TxId,
    pub status: ConfirmationStatus,
    pub block_index: i64,
    pub block_hash: String,
}
