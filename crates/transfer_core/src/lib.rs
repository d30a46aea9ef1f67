use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    domain::{Address, BridgePair, Planet, PrivateKey, TxId},
    protocol::TransferRequest,
};
use tracing::info;

mod controller;
pub mod detail_view;
pub mod timer;
mod view;

pub use controller::{
    IgnoreReason, SubmitOutcome, TransferCollaborators, TransferController, TransferEvent,
    TransferSettings, DEFAULT_DEBOUNCE, DEFAULT_MEMO_MAX_LEN,
};
pub use detail_view::{DetailViewError, ExplorerDetailView, UrlOpener};
pub use timer::{ManualTimer, TimerHandle, TimerService, TimerTask, TokioTimer};
pub use view::{FieldWarnings, PlanetOption, TransferView};

/// The active login session.
pub trait SessionProvider: Send + Sync {
    fn private_key(&self) -> Option<PrivateKey>;
    fn address(&self) -> Option<Address>;
}

pub struct MissingSession;

impl SessionProvider for MissingSession {
    fn private_key(&self) -> Option<PrivateKey> {
        None
    }

    fn address(&self) -> Option<Address> {
        None
    }
}

/// Receives the outcome of one broadcast transaction. Implementations must
/// tolerate being called more than once; only the first call counts.
pub trait ConfirmationListener: Send + Sync {
    fn on_success(&self, block_index: i64, block_hash: &str);
    fn on_failure(&self, block_index: i64, block_hash: &str);
    fn on_timeout(&self, block_index: i64, block_hash: &str);
}

/// Signing, broadcast and confirmation tracking for asset transfers.
#[async_trait]
pub trait TransferService: Send + Sync {
    async fn balance(&self) -> Result<Decimal>;
    async fn transfer_asset(&self, request: &TransferRequest, key: &PrivateKey) -> Result<TxId>;
    /// Registers `listener` for `tx_id` and returns without waiting for the
    /// outcome. Exactly one listener callback follows, on the service's own schedule.
    async fn confirm_transaction(
        &self,
        tx_id: &TxId,
        timeout: Option<Duration>,
        listener: Arc<dyn ConfirmationListener>,
    ) -> Result<()>;
}

pub struct MissingTransferService;

#[async_trait]
impl TransferService for MissingTransferService {
    async fn balance(&self) -> Result<Decimal> {
        Err(anyhow!("transfer service is unavailable"))
    }

    async fn transfer_asset(&self, _request: &TransferRequest, _key: &PrivateKey) -> Result<TxId> {
        Err(anyhow!("transfer service is unavailable"))
    }

    async fn confirm_transaction(
        &self,
        tx_id: &TxId,
        _timeout: Option<Duration>,
        _listener: Arc<dyn ConfirmationListener>,
    ) -> Result<()> {
        Err(anyhow!(
            "transfer service is unavailable; cannot watch transaction {tx_id}"
        ))
    }
}

/// The network this wallet is connected to and the bridges leaving it.
pub trait PlanetaryNetwork: Send + Sync {
    fn current_planet(&self) -> Planet;
    fn bridge_pairs(&self) -> Vec<BridgePair>;
}

pub trait DetailViewHandler: Send + Sync {
    fn open_transaction(&self, tx_id: &TxId);
}

pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: &str) -> Result<()>;
}

pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn track(&self, _event: &str) -> Result<()> {
        Ok(())
    }
}

pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn track(&self, event: &str) -> Result<()> {
        info!(target: "analytics", event, "track event");
        Ok(())
    }
}
