use shared::domain::TxId;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::DetailViewHandler;

pub type UrlOpener = Box<dyn Fn(&Url) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Error)]
pub enum DetailViewError {
    #[error("invalid explorer url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("explorer url cannot be used as a base: {0}")]
    NotABase(String),
}

/// Opens transactions in a block explorer at `<base>/tx/<id>`.
pub struct ExplorerDetailView {
    base: Url,
    opener: UrlOpener,
}

impl ExplorerDetailView {
    pub fn new(base_url: &str, opener: UrlOpener) -> Result<Self, DetailViewError> {
        let mut base = Url::parse(base_url.trim())?;
        if base.cannot_be_a_base() {
            return Err(DetailViewError::NotABase(base_url.to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, opener })
    }

    pub fn transaction_url(&self, tx_id: &TxId) -> Result<Url, DetailViewError> {
        Ok(self.base.join(&format!("tx/{tx_id}"))?)
    }
}

impl DetailViewHandler for ExplorerDetailView {
    fn open_transaction(&self, tx_id: &TxId) {
        let url = match self.transaction_url(tx_id) {
            Ok(url) => url,
            Err(err) => {
                warn!(tx_id = %tx_id, error = %err, "cannot build detail view url");
                return;
            }
        };
        info!(tx_id = %tx_id, %url, "opening transaction detail view");
        if let Err(err) = (self.opener)(&url) {
            warn!(tx_id = %tx_id, error = %err, "detail view opener failed");
        }
    }
}
