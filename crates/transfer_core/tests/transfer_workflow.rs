use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    domain::{Address, BridgePair, Planet, PrivateKey, TxId},
    protocol::{TransferPhase, TransferRequest},
};
use transfer_core::{
    ConfirmationListener, DetailViewHandler, ManualTimer, NoopAnalytics, PlanetaryNetwork,
    SessionProvider, SubmitOutcome, TransferCollaborators, TransferController, TransferEvent,
    TransferService, TransferSettings,
};

const SENDER: &str = "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb";
const RECIPIENT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

struct Session;

impl SessionProvider for Session {
    fn private_key(&self) -> Option<PrivateKey> {
        Some(PrivateKey::new("scenario-key"))
    }

    fn address(&self) -> Option<Address> {
        SENDER.parse().ok()
    }
}

#[derive(Default)]
struct Ledger {
    broadcast: Mutex<Vec<TxId>>,
    watching: Mutex<Option<Arc<dyn ConfirmationListener>>>,
}

#[async_trait]
impl TransferService for Ledger {
    async fn balance(&self) -> Result<Decimal> {
        Ok(Decimal::new(100, 0))
    }

    async fn transfer_asset(&self, request: &TransferRequest, _key: &PrivateKey) -> Result<TxId> {
        let tx_id = TxId(format!("{}-{}", request.recipient, request.amount));
        self.broadcast.lock().expect("broadcast").push(tx_id.clone());
        Ok(tx_id)
    }

    async fn confirm_transaction(
        &self,
        _tx_id: &TxId,
        _timeout: Option<Duration>,
        listener: Arc<dyn ConfirmationListener>,
    ) -> Result<()> {
        *self.watching.lock().expect("watching") = Some(listener);
        Ok(())
    }
}

struct SinglePlanet;

impl PlanetaryNetwork for SinglePlanet {
    fn current_planet(&self) -> Planet {
        Planet::new("0x000000000000", "Odin").expect("planet")
    }

    fn bridge_pairs(&self) -> Vec<BridgePair> {
        Vec::new()
    }
}

#[derive(Default)]
struct DetailViews {
    opened: Mutex<Vec<TxId>>,
}

impl DetailViewHandler for DetailViews {
    fn open_transaction(&self, tx_id: &TxId) {
        self.opened.lock().expect("opened").push(tx_id.clone());
    }
}

#[tokio::test]
async fn same_planet_transfer_reaches_success_and_links_detail_view() {
    let ledger = Arc::new(Ledger::default());
    let detail_views = Arc::new(DetailViews::default());
    let timer = Arc::new(ManualTimer::new());
    let controller = TransferController::new(
        TransferCollaborators {
            session: Arc::new(Session),
            transfer: ledger.clone(),
            planetary: Arc::new(SinglePlanet),
            detail_view: detail_views.clone(),
            analytics: Arc::new(NoopAnalytics),
            timer: timer.clone(),
        },
        TransferSettings::default(),
    );
    let mut events = controller.subscribe_events();

    assert_eq!(controller.phase(), TransferPhase::Ready);
    controller.set_recipient(RECIPIENT);
    controller.set_amount("5.0");
    controller.set_memo("gift");

    let SubmitOutcome::Submitted(tx_id) = controller.submit().await else {
        panic!("submission should reach the ledger");
    };

    let listener = ledger
        .watching
        .lock()
        .expect("watching")
        .clone()
        .expect("listener registered");
    listener.on_success(100, "0xabc");

    let mut phases = vec![TransferPhase::Ready];
    while let Ok(event) = events.try_recv() {
        if let TransferEvent::PhaseChanged { phase, .. } = event {
            phases.push(phase);
        }
    }
    assert_eq!(
        phases,
        vec![
            TransferPhase::Ready,
            TransferPhase::SendTx,
            TransferPhase::Sending,
            TransferPhase::Finished,
        ]
    );
    assert!(controller.snapshot().success_dialog_open);

    assert_eq!(controller.open_detail_view(), Some(tx_id.clone()));
    assert_eq!(*detail_views.opened.lock().expect("opened"), vec![tx_id.clone()]);
    assert_eq!(*ledger.broadcast.lock().expect("broadcast"), vec![tx_id]);

    assert!(controller.dismiss_result());
    assert_eq!(controller.phase(), TransferPhase::Ready);
    assert!(controller.snapshot().submit_disabled);
    timer.advance(Duration::from_secs(15));
    assert!(!controller.snapshot().submit_disabled);
}
