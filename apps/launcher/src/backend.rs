//! In-process stand-ins for the session, planetary and transfer stores.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    domain::{Address, BridgePair, Planet, PrivateKey, TxId},
    protocol::TransferRequest,
};
use tiny_keccak::{Hasher, Keccak};
use tokio::sync::Mutex;
use tracing::{debug, info};
use transfer_core::{ConfirmationListener, PlanetaryNetwork, SessionProvider, TransferService};

use crate::config::SimulatedOutcome;

pub struct StaticSession {
    address: Address,
    private_key: Option<PrivateKey>,
}

impl StaticSession {
    pub fn new(address: Address, private_key: Option<PrivateKey>) -> Self {
        Self {
            address,
            private_key,
        }
    }
}

impl SessionProvider for StaticSession {
    fn private_key(&self) -> Option<PrivateKey> {
        self.private_key.clone()
    }

    fn address(&self) -> Option<Address> {
        Some(self.address)
    }
}

pub struct StaticPlanetary {
    current: Planet,
    bridges: Vec<BridgePair>,
}

impl StaticPlanetary {
    pub fn new(current: Planet, bridges: Vec<BridgePair>) -> Self {
        Self { current, bridges }
    }
}

impl PlanetaryNetwork for StaticPlanetary {
    fn current_planet(&self) -> Planet {
        self.current.clone()
    }

    fn bridge_pairs(&self) -> Vec<BridgePair> {
        self.bridges.clone()
    }
}

#[derive(Default)]
struct LedgerBook {
    balance: Decimal,
    in_flight: HashMap<TxId, Decimal>,
}

/// Ledger that debits on broadcast and settles after a fixed delay with a
/// configured outcome. Failed or timed-out transfers are refunded.
pub struct SimulatedLedger {
    book: Arc<Mutex<LedgerBook>>,
    confirm_delay: Duration,
    outcome: SimulatedOutcome,
    nonce: AtomicU64,
    next_block: AtomicI64,
}

impl SimulatedLedger {
    pub fn new(balance: Decimal, confirm_delay: Duration, outcome: SimulatedOutcome) -> Self {
        Self {
            book: Arc::new(Mutex::new(LedgerBook {
                balance,
                in_flight: HashMap::new(),
            })),
            confirm_delay,
            outcome,
            nonce: AtomicU64::new(0),
            next_block: AtomicI64::new(1),
        }
    }
}

fn keccak_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut digest = [0u8; 32];
    hasher.finalize(&mut digest);
    hex::encode(digest)
}

async fn settle(book: &Mutex<LedgerBook>, tx_id: &TxId, refund: bool) {
    let mut book = book.lock().await;
    if let Some(amount) = book.in_flight.remove(tx_id) {
        if refund {
            book.balance += amount;
            debug!(tx_id = %tx_id, %amount, "refunded unconfirmed transfer");
        }
    }
}

#[async_trait]
impl TransferService for SimulatedLedger {
    async fn balance(&self) -> Result<Decimal> {
        Ok(self.book.lock().await.balance)
    }

    async fn transfer_asset(&self, request: &TransferRequest, key: &PrivateKey) -> Result<TxId> {
        if key.expose().trim().is_empty() {
            bail!("cannot sign with an empty private key");
        }

        let mut book = self.book.lock().await;
        if request.amount > book.balance {
            return Err(anyhow!(
                "insufficient balance: need {}, have {}",
                request.amount,
                book.balance
            ));
        }

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let tx_id = TxId(keccak_hex(&[
            request.recipient.as_bytes().as_slice(),
            request.amount.to_string().as_bytes(),
            request.memo.as_bytes(),
            nonce.to_be_bytes().as_slice(),
        ]));
        book.balance -= request.amount;
        book.in_flight.insert(tx_id.clone(), request.amount);

        info!(
            tx_id = %tx_id,
            recipient = %request.recipient,
            amount = %request.amount,
            nonce,
            "simulated broadcast"
        );
        Ok(tx_id)
    }

    async fn confirm_transaction(
        &self,
        tx_id: &TxId,
        timeout: Option<Duration>,
        listener: Arc<dyn ConfirmationListener>,
    ) -> Result<()> {
        if !self.book.lock().await.in_flight.contains_key(tx_id) {
            bail!("unknown transaction {tx_id}");
        }

        let book = Arc::clone(&self.book);
        let tx_id = tx_id.clone();
        let delay = self.confirm_delay;
        let outcome = self.outcome;
        let block_index = self.next_block.fetch_add(1, Ordering::SeqCst);
        let block_hash = format!("0x{}", keccak_hex(&[tx_id.as_str().as_bytes()]));

        tokio::spawn(async move {
            if let Some(limit) = timeout.filter(|limit| delay > *limit) {
                tokio::time::sleep(limit).await;
                settle(&book, &tx_id, true).await;
                listener.on_timeout(block_index, &block_hash);
                return;
            }

            tokio::time::sleep(delay).await;
            match outcome {
                SimulatedOutcome::Success => {
                    settle(&book, &tx_id, false).await;
                    listener.on_success(block_index, &block_hash);
                }
                SimulatedOutcome::Failure => {
                    settle(&book, &tx_id, true).await;
                    listener.on_failure(block_index, &block_hash);
                }
                SimulatedOutcome::Timeout => {
                    settle(&book, &tx_id, true).await;
                    listener.on_timeout(block_index, &block_hash);
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
