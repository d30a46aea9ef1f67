//! Asset-transfer workflow: form state, submission and the
//! `READY -> SENDTX -> SENDING -> FINISHED -> READY` phase machine.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    domain::{parse_amount_input, Address, PlanetId, TxId},
    eip55,
    protocol::{Confirmation, ConfirmationStatus, TransferPhase, TransferRequest},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    timer::{TimerHandle, TimerService},
    view::{FieldWarnings, PlanetOption, TransferView},
    AnalyticsSink, ConfirmationListener, DetailViewHandler, PlanetaryNetwork, SessionProvider,
    TransferService,
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(15);
pub const DEFAULT_MEMO_MAX_LEN: usize = 80;
const DEFAULT_ANALYTICS_EVENT: &str = "Launcher/Send NCG";
const DEFAULT_CURRENCY: &str = "NCG";
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// How long the submit control stays locked after each submission starts.
    pub debounce: Duration,
    pub memo_max_len: usize,
    /// Passed through to the transfer service when watching a transaction.
    pub confirmation_timeout: Option<Duration>,
    pub analytics_event: String,
    pub currency: String,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            memo_max_len: DEFAULT_MEMO_MAX_LEN,
            confirmation_timeout: None,
            analytics_event: DEFAULT_ANALYTICS_EVENT.into(),
            currency: DEFAULT_CURRENCY.into(),
        }
    }
}

pub struct TransferCollaborators {
    pub session: Arc<dyn SessionProvider>,
    pub transfer: Arc<dyn TransferService>,
    pub planetary: Arc<dyn PlanetaryNetwork>,
    pub detail_view: Arc<dyn DetailViewHandler>,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub timer: Arc<dyn TimerService>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    PhaseChanged { attempt: u64, phase: TransferPhase },
    DebounceChanged(bool),
    Alert(String),
    Confirmed(Confirmation),
    SubmissionFailed { attempt: u64, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SubmitDisabled,
    InvalidRecipient,
    NonPositiveAmount,
    MissingCredential,
}

/// Informational result of a submit press. The phase stored in the
/// controller remains the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ignored(IgnoreReason),
    Rejected { alert: String },
    Submitted(TxId),
    Failed(String),
}

#[derive(Debug, Clone)]
pub(crate) struct TransferState {
    /// What the recipient field shows. Holds the bridge address after a
    /// bridged submission.
    pub(crate) recipient: String,
    /// Last recipient typed by the user; bridged memos are built from it.
    pub(crate) entered_recipient: String,
    pub(crate) amount: Decimal,
    pub(crate) memo: String,
    pub(crate) target_planet: PlanetId,
    pub(crate) interplanetary: bool,
    pub(crate) warnings: FieldWarnings,
    pub(crate) phase: TransferPhase,
    pub(crate) success: bool,
    pub(crate) debounce: bool,
    pub(crate) tx_id: Option<TxId>,
    pub(crate) attempt: u64,
    pub(crate) pending_alert: Option<String>,
    pub(crate) last_error: Option<String>,
    pub(crate) submitted_at: Option<DateTime<Utc>>,
}

impl TransferState {
    fn new(target_planet: PlanetId) -> Self {
        Self {
            recipient: String::new(),
            entered_recipient: String::new(),
            amount: Decimal::ZERO,
            memo: String::new(),
            target_planet,
            interplanetary: false,
            warnings: FieldWarnings::default(),
            phase: TransferPhase::Ready,
            success: false,
            debounce: false,
            tx_id: None,
            attempt: 0,
            pending_alert: None,
            last_error: None,
            submitted_at: None,
        }
    }

    pub(crate) fn memo_len(&self) -> usize {
        self.memo.chars().count()
    }

    pub(crate) fn submit_disabled(&self, memo_max_len: usize) -> bool {
        self.warnings.any()
            || self.memo_len() > memo_max_len
            || self.phase.is_loading()
            || self.debounce
    }
}

struct Shared {
    state: Mutex<TransferState>,
    events: broadcast::Sender<TransferEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TransferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: TransferEvent) {
        // No subscribers is fine; the snapshot still carries the state.
        let _ = self.events.send(event);
    }

    fn release_debounce(&self) {
        self.lock().debounce = false;
        debug!("debounce lock released");
        self.publish(TransferEvent::DebounceChanged(false));
    }

    fn finish(&self, attempt: u64, confirmation: Confirmation) {
        {
            let mut state = self.lock();
            if state.attempt != attempt || state.phase != TransferPhase::Sending {
                debug!(
                    attempt,
                    current_attempt = state.attempt,
                    phase = ?state.phase,
                    status = ?confirmation.status,
                    "ignoring confirmation for settled or stale attempt"
                );
                return;
            }
            state.phase = TransferPhase::Finished;
            state.success = confirmation.status.is_success();
        }

        info!(
            attempt,
            tx_id = %confirmation.tx_id,
            status = ?confirmation.status,
            "transfer finished"
        );
        self.publish(TransferEvent::PhaseChanged {
            attempt,
            phase: TransferPhase::Finished,
        });
        self.publish(TransferEvent::Confirmed(confirmation));
    }

    fn fail_attempt(&self, attempt: u64, err: &anyhow::Error) -> String {
        let message = format!("{err:#}");
        {
            let mut state = self.lock();
            if state.attempt != attempt || !state.phase.is_loading() {
                debug!(attempt, error = %message, "late failure for settled attempt");
                return message;
            }
            state.phase = TransferPhase::Finished;
            state.success = false;
            state.last_error = Some(message.clone());
        }

        warn!(attempt, error = %message, "transfer attempt failed");
        self.publish(TransferEvent::PhaseChanged {
            attempt,
            phase: TransferPhase::Finished,
        });
        self.publish(TransferEvent::SubmissionFailed {
            attempt,
            message: message.clone(),
        });
        message
    }
}

/// Listener registered for exactly one submission attempt.
struct AttemptListener {
    shared: Weak<Shared>,
    attempt: u64,
    tx_id: TxId,
}

impl AttemptListener {
    fn resolve(&self, status: ConfirmationStatus, block_index: i64, block_hash: &str) {
        let Some(shared) = self.shared.upgrade() else {
            debug!(tx_id = %self.tx_id, "controller dropped before confirmation");
            return;
        };
        shared.finish(
            self.attempt,
            Confirmation {
                tx_id: self.tx_id.clone(),
                status,
                block_index,
                block_hash: block_hash.to_string(),
            },
        );
    }
}

impl ConfirmationListener for AttemptListener {
    fn on_success(&self, block_index: i64, block_hash: &str) {
        info!(tx_id = %self.tx_id, "Block #{block_index} ({block_hash})");
        self.resolve(ConfirmationStatus::Success, block_index, block_hash);
    }

    fn on_failure(&self, block_index: i64, block_hash: &str) {
        warn!(tx_id = %self.tx_id, block_index, block_hash, "transaction failed");
        self.resolve(ConfirmationStatus::Failure, block_index, block_hash);
    }

    fn on_timeout(&self, block_index: i64, block_hash: &str) {
        warn!(tx_id = %self.tx_id, block_index, block_hash, "transaction confirmation timed out");
        self.resolve(ConfirmationStatus::Timeout, block_index, block_hash);
    }
}

pub struct TransferController {
    session: Arc<dyn SessionProvider>,
    transfer: Arc<dyn TransferService>,
    planetary: Arc<dyn PlanetaryNetwork>,
    detail_view: Arc<dyn DetailViewHandler>,
    analytics: Arc<dyn AnalyticsSink>,
    timer: Arc<dyn TimerService>,
    settings: TransferSettings,
    shared: Arc<Shared>,
    debounce_timer: Mutex<Option<TimerHandle>>,
}

impl TransferController {
    pub fn new(collaborators: TransferCollaborators, settings: TransferSettings) -> Self {
        let TransferCollaborators {
            session,
            transfer,
            planetary,
            detail_view,
            analytics,
            timer,
        } = collaborators;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let current = planetary.current_planet().id;

        Self {
            session,
            transfer,
            planetary,
            detail_view,
            analytics,
            timer,
            settings,
            shared: Arc::new(Shared {
                state: Mutex::new(TransferState::new(current)),
                events,
            }),
            debounce_timer: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TransferEvent> {
        self.shared.events.subscribe()
    }

    pub fn snapshot(&self) -> TransferView {
        TransferView::from_state(&self.shared.lock(), self.settings.memo_max_len)
    }

    pub fn phase(&self) -> TransferPhase {
        self.shared.lock().phase
    }

    pub async fn balance(&self) -> Result<Decimal> {
        self.transfer.balance().await
    }

    pub fn set_recipient(&self, input: &str) {
        let mut state = self.shared.lock();
        state.recipient = input.to_string();
        state.entered_recipient = input.to_string();
    }

    pub fn focus_recipient(&self) {
        self.shared.lock().warnings.recipient = false;
    }

    pub fn blur_recipient(&self) {
        let mut state = self.shared.lock();
        state.warnings.recipient = !eip55::verify(state.recipient.trim(), true);
    }

    pub fn set_amount(&self, input: &str) {
        self.shared.lock().amount = parse_amount_input(input);
    }

    pub fn focus_amount(&self) {
        self.shared.lock().warnings.amount = false;
    }

    pub fn blur_amount(&self) {
        let mut state = self.shared.lock();
        state.warnings.amount = state.amount <= Decimal::ZERO;
    }

    pub fn set_memo(&self, input: &str) {
        self.shared.lock().memo = input.to_string();
    }

    pub fn focus_memo(&self) {
        self.shared.lock().warnings.memo = false;
    }

    pub fn blur_memo(&self) {
        let mut state = self.shared.lock();
        state.warnings.memo = state.memo_len() > self.settings.memo_max_len;
    }

    /// Changes the destination planet. The interplanetary flag is always
    /// derived against the current network, never the previous selection.
    pub fn select_target_planet(&self, planet_id: PlanetId) {
        let current = self.planetary.current_planet().id;
        let mut state = self.shared.lock();
        state.interplanetary = planet_id != current;
        state.target_planet = planet_id;
    }

    pub fn planet_selector_visible(&self) -> bool {
        !self.planetary.bridge_pairs().is_empty()
    }

    pub fn planet_options(&self) -> Vec<PlanetOption> {
        let current = self.planetary.current_planet();
        let mut options = vec![PlanetOption {
            id: current.id,
            name: current.name,
            is_current: true,
        }];
        options.extend(
            self.planetary
                .bridge_pairs()
                .into_iter()
                .map(|pair| PlanetOption {
                    id: pair.planet_id,
                    name: pair.name,
                    is_current: false,
                }),
        );
        options
    }

    pub async fn submit(&self) -> SubmitOutcome {
        let (recipient_input, amount, memo_input, target_planet, interplanetary) = {
            let state = self.shared.lock();
            if state.submit_disabled(self.settings.memo_max_len) {
                debug!(
                    phase = ?state.phase,
                    debounce = state.debounce,
                    warnings = ?state.warnings,
                    "submit ignored while disabled"
                );
                return SubmitOutcome::Ignored(IgnoreReason::SubmitDisabled);
            }
            (
                state.entered_recipient.clone(),
                state.amount,
                state.memo.clone(),
                state.target_planet.clone(),
                state.interplanetary,
            )
        };

        if let Err(err) = self.analytics.track(&self.settings.analytics_event) {
            warn!(error = %err, "analytics event dropped");
        }

        let Ok(mut recipient) = eip55::parse(recipient_input.trim(), true) else {
            debug!("submit ignored: recipient failed address verification");
            return SubmitOutcome::Ignored(IgnoreReason::InvalidRecipient);
        };
        if amount <= Decimal::ZERO {
            debug!(%amount, "submit ignored: amount is not positive");
            return SubmitOutcome::Ignored(IgnoreReason::NonPositiveAmount);
        }

        let mut memo = memo_input;
        let mut bridged = false;
        if interplanetary {
            if let Some(pair) = self
                .planetary
                .bridge_pairs()
                .into_iter()
                .find(|pair| pair.planet_id == target_planet)
            {
                info!(
                    target_planet = %target_planet,
                    bridge = %pair.bridge_address,
                    "routing transfer through bridge"
                );
                memo = recipient_input.trim().to_string();
                recipient = pair.bridge_address;
                bridged = true;
            } else {
                warn!(
                    target_planet = %target_planet,
                    "no bridge pair for target planet; sending without substitution"
                );
            }
        }

        if self.session.address() == Some(recipient) {
            let alert = format!(
                "You can't transfer {} to yourself.",
                self.settings.currency
            );
            warn!(%recipient, "self transfer rejected");
            self.shared.lock().pending_alert = Some(alert.clone());
            self.shared.publish(TransferEvent::Alert(alert.clone()));
            return SubmitOutcome::Rejected { alert };
        }

        let Some(key) = self.session.private_key() else {
            debug!("submit ignored: no signing credential in session");
            return SubmitOutcome::Ignored(IgnoreReason::MissingCredential);
        };

        let request = TransferRequest {
            recipient,
            amount,
            memo,
            target_planet,
            interplanetary,
        };

        // An overlapping press may have claimed the attempt since the first check.
        let attempt = {
            let mut state = self.shared.lock();
            if state.submit_disabled(self.settings.memo_max_len) {
                debug!(phase = ?state.phase, "submit ignored: another press claimed the attempt");
                return SubmitOutcome::Ignored(IgnoreReason::SubmitDisabled);
            }
            if bridged {
                state.recipient = request.recipient.to_checksum();
                state.memo = request.memo.clone();
            }
            state.attempt += 1;
            state.phase = TransferPhase::SendTx;
            state.success = false;
            state.debounce = true;
            state.last_error = None;
            state.submitted_at = Some(Utc::now());
            state.attempt
        };
        info!(
            attempt,
            recipient = %request.recipient,
            amount = %request.amount,
            interplanetary = request.interplanetary,
            "submitting transfer"
        );
        self.shared.publish(TransferEvent::PhaseChanged {
            attempt,
            phase: TransferPhase::SendTx,
        });
        self.shared.publish(TransferEvent::DebounceChanged(true));
        self.arm_debounce();

        let tx_id = match self.transfer.transfer_asset(&request, &key).await {
            Ok(tx_id) => tx_id,
            Err(err) => return SubmitOutcome::Failed(self.shared.fail_attempt(attempt, &err)),
        };

        {
            let mut state = self.shared.lock();
            state.tx_id = Some(tx_id.clone());
            state.phase = TransferPhase::Sending;
        }
        info!(attempt, tx_id = %tx_id, "transaction broadcast; awaiting confirmation");
        self.shared.publish(TransferEvent::PhaseChanged {
            attempt,
            phase: TransferPhase::Sending,
        });

        let listener = Arc::new(AttemptListener {
            shared: Arc::downgrade(&self.shared),
            attempt,
            tx_id: tx_id.clone(),
        });
        if let Err(err) = self
            .transfer
            .confirm_transaction(&tx_id, self.settings.confirmation_timeout, listener)
            .await
        {
            return SubmitOutcome::Failed(self.shared.fail_attempt(attempt, &err));
        }

        SubmitOutcome::Submitted(tx_id)
    }

    /// Closes the success or failure dialog. Returns whether anything changed.
    pub fn dismiss_result(&self) -> bool {
        let attempt = {
            let mut state = self.shared.lock();
            if state.phase != TransferPhase::Finished {
                return false;
            }
            state.phase = TransferPhase::Ready;
            state.success = false;
            state.attempt
        };
        self.shared.publish(TransferEvent::PhaseChanged {
            attempt,
            phase: TransferPhase::Ready,
        });
        true
    }

    pub fn acknowledge_alert(&self) -> Option<String> {
        self.shared.lock().pending_alert.take()
    }

    /// Hands the latest transaction id to the detail-view handler.
    pub fn open_detail_view(&self) -> Option<TxId> {
        let tx_id = self.shared.lock().tx_id.clone()?;
        self.detail_view.open_transaction(&tx_id);
        Some(tx_id)
    }

    pub fn sender_address(&self) -> Option<Address> {
        self.session.address()
    }

    fn arm_debounce(&self) {
        let shared = Arc::downgrade(&self.shared);
        let handle = self.timer.schedule(
            self.settings.debounce,
            Box::new(move || {
                if let Some(shared) = shared.upgrade() {
                    shared.release_debounce();
                }
            }),
        );
        *self
            .debounce_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
}

impl Drop for TransferController {
    fn drop(&mut self) {
        if let Some(handle) = self
            .debounce_timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.cancel();
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
