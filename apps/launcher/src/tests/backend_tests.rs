use super::*;

use std::str::FromStr;
use tokio::sync::mpsc;

const RECIPIENT: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

struct ChannelListener {
    tx: mpsc::UnboundedSender<(&'static str, i64)>,
}

impl ConfirmationListener for ChannelListener {
    fn on_success(&self, block_index: i64, _block_hash: &str) {
        let _ = self.tx.send(("success", block_index));
    }

    fn on_failure(&self, block_index: i64, _block_hash: &str) {
        let _ = self.tx.send(("failure", block_index));
    }

    fn on_timeout(&self, block_index: i64, _block_hash: &str) {
        let _ = self.tx.send(("timeout", block_index));
    }
}

fn listener() -> (
    Arc<dyn ConfirmationListener>,
    mpsc::UnboundedReceiver<(&'static str, i64)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelListener { tx }), rx)
}

fn request(amount: &str) -> TransferRequest {
    TransferRequest {
        recipient: RECIPIENT.parse().expect("address"),
        amount: Decimal::from_str(amount).expect("amount"),
        memo: "gift".into(),
        target_planet: "0x000000000000".into(),
        interplanetary: false,
    }
}

fn key() -> PrivateKey {
    PrivateKey::new("simulated-key")
}

#[tokio::test(start_paused = true)]
async fn successful_transfer_debits_balance() {
    let ledger = SimulatedLedger::new(
        Decimal::new(10, 0),
        Duration::from_secs(2),
        SimulatedOutcome::Success,
    );
    let tx_id = ledger
        .transfer_asset(&request("4"), &key())
        .await
        .expect("broadcast");
    assert_eq!(tx_id.as_str().len(), 64);
    assert_eq!(ledger.balance().await.expect("balance"), Decimal::new(6, 0));

    let (listener, mut rx) = listener();
    ledger
        .confirm_transaction(&tx_id, None, listener)
        .await
        .expect("watch");

    assert_eq!(rx.recv().await, Some(("success", 1)));
    assert_eq!(ledger.balance().await.expect("balance"), Decimal::new(6, 0));
}

#[tokio::test(start_paused = true)]
async fn failed_transfer_is_refunded() {
    let ledger = SimulatedLedger::new(
        Decimal::new(10, 0),
        Duration::from_secs(2),
        SimulatedOutcome::Failure,
    );
    let tx_id = ledger
        .transfer_asset(&request("4"), &key())
        .await
        .expect("broadcast");
    let (listener, mut rx) = listener();
    ledger
        .confirm_transaction(&tx_id, None, listener)
        .await
        .expect("watch");

    assert_eq!(rx.recv().await, Some(("failure", 1)));
    assert_eq!(ledger.balance().await.expect("balance"), Decimal::new(10, 0));
}

#[tokio::test(start_paused = true)]
async fn slow_confirmation_times_out() {
    let ledger = SimulatedLedger::new(
        Decimal::new(10, 0),
        Duration::from_secs(30),
        SimulatedOutcome::Success,
    );
    let tx_id = ledger
        .transfer_asset(&request("1"), &key())
        .await
        .expect("broadcast");
    let (listener, mut rx) = listener();
    ledger
        .confirm_transaction(&tx_id, Some(Duration::from_secs(5)), listener)
        .await
        .expect("watch");

    assert_eq!(rx.recv().await, Some(("timeout", 1)));
    assert_eq!(ledger.balance().await.expect("balance"), Decimal::new(10, 0));
}

#[tokio::test]
async fn overdraft_is_rejected() {
    let ledger = SimulatedLedger::new(
        Decimal::new(1, 0),
        Duration::from_secs(1),
        SimulatedOutcome::Success,
    );
    let err = ledger
        .transfer_asset(&request("2"), &key())
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("insufficient balance"), "{err}");
}

#[tokio::test]
async fn unknown_transaction_cannot_be_watched() {
    let ledger = SimulatedLedger::new(
        Decimal::new(1, 0),
        Duration::from_secs(1),
        SimulatedOutcome::Success,
    );
    let (listener, _rx) = listener();
    let err = ledger
        .confirm_transaction(&TxId::from("missing"), None, listener)
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("unknown transaction"), "{err}");
}

#[tokio::test]
async fn repeated_transfers_get_distinct_ids() {
    let ledger = SimulatedLedger::new(
        Decimal::new(10, 0),
        Duration::from_secs(1),
        SimulatedOutcome::Success,
    );
    let first = ledger
        .transfer_asset(&request("1"), &key())
        .await
        .expect("first");
    let second = ledger
        .transfer_asset(&request("1"), &key())
        .await
        .expect("second");
    assert_ne!(first, second);
}
