//! Read-only projection of the controller state that a front-end renders from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    domain::{PlanetId, TxId},
    protocol::TransferPhase,
};

use crate::controller::TransferState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldWarnings {
    pub recipient: bool,
    pub amount: bool,
    pub memo: bool,
}

impl FieldWarnings {
    pub fn any(&self) -> bool {
        self.recipient || self.amount || self.memo
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanetOption {
    pub id: PlanetId,
    pub name: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferView {
    pub phase: TransferPhase,
    pub attempt: u64,
    pub recipient: String,
    pub amount: Decimal,
    pub memo: String,
    pub memo_visible: bool,
    pub memo_counter: String,
    pub target_planet: PlanetId,
    pub interplanetary: bool,
    pub warnings: FieldWarnings,
    pub loading: bool,
    pub debounce: bool,
    pub submit_disabled: bool,
    pub show_spinner: bool,
    pub sending_dialog_open: bool,
    pub success_dialog_open: bool,
    pub failure_dialog_open: bool,
    pub tx_id: Option<TxId>,
    pub pending_alert: Option<String>,
    pub last_error: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl TransferView {
    pub(crate) fn from_state(state: &TransferState, memo_max_len: usize) -> Self {
        let loading = state.phase.is_loading();
        let finished = state.phase == TransferPhase::Finished;

        Self {
            phase: state.phase,
            attempt: state.attempt,
            recipient: state.recipient.clone(),
            amount: state.amount,
            memo: state.memo.clone(),
            memo_visible: !state.interplanetary,
            memo_counter: format!("({}/{memo_max_len})", state.memo_len()),
            target_planet: state.target_planet.clone(),
            interplanetary: state.interplanetary,
            warnings: state.warnings,
            loading,
            debounce: state.debounce,
            submit_disabled: state.submit_disabled(memo_max_len),
            show_spinner: loading || state.debounce,
            sending_dialog_open: state.phase == TransferPhase::Sending,
            success_dialog_open: finished && state.success,
            failure_dialog_open: finished && !state.success,
            tx_id: state.tx_id.clone(),
            pending_alert: state.pending_alert.clone(),
            last_error: state.last_error.clone(),
            submitted_at: state.submitted_at,
        }
    }
}
