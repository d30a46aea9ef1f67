use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    domain::{Address, BridgePair, Planet, PlanetId, PrivateKey},
    error::{AddressError, PlanetError},
};
use thiserror::Error;
use transfer_core::TransferSettings;

pub const DEFAULT_CONFIG_FILE: &str = "launcher.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid address in '{field}': {source}")]
    InvalidAddress {
        field: String,
        source: AddressError,
    },
    #[error(transparent)]
    InvalidPlanet(#[from] PlanetError),
    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulatedOutcome {
    Success,
    Failure,
    Timeout,
}

impl FromStr for SimulatedOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "timeout" => Ok(Self::Timeout),
            other => Err(format!("unknown simulated outcome '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeSettings {
    pub planet_id: String,
    pub bridge_address: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub planet_id: String,
    pub planet_name: String,
    pub bridges: Vec<BridgeSettings>,
    pub sender_address: String,
    pub private_key: Option<String>,
    pub balance: Decimal,
    pub debounce_secs: u64,
    pub memo_max_len: usize,
    pub confirmation_timeout_secs: Option<u64>,
    pub explorer_url: String,
    pub analytics_event: String,
    pub currency: String,
    pub confirm_delay_ms: u64,
    pub simulated_outcome: SimulatedOutcome,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        let transfer = TransferSettings::default();
        Self {
            planet_id: "0x000000000000".into(),
            planet_name: "odin".into(),
            bridges: Vec::new(),
            sender_address: "0x0000000000000000000000000000000000000001".into(),
            private_key: None,
            balance: Decimal::new(1000, 0),
            debounce_secs: transfer.debounce.as_secs(),
            memo_max_len: transfer.memo_max_len,
            confirmation_timeout_secs: None,
            explorer_url: "https://explorer.local/".into(),
            analytics_event: transfer.analytics_event,
            currency: transfer.currency,
            confirm_delay_ms: 1500,
            simulated_outcome: SimulatedOutcome::Success,
            log_filter: "info".into(),
        }
    }
}

/// Settings turned into the typed values the launcher wires together.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub planet: Planet,
    pub bridges: Vec<BridgePair>,
    pub sender: Address,
    pub private_key: Option<PrivateKey>,
    pub balance: Decimal,
    pub transfer: TransferSettings,
    pub explorer_url: String,
    pub confirm_delay: Duration,
    pub simulated_outcome: SimulatedOutcome,
}

impl Settings {
    pub fn resolve(&self) -> Result<ResolvedSettings, ConfigError> {
        let planet = Planet::new(self.planet_id.clone(), self.planet_name.clone())?;
        let sender = parse_address("sender_address", &self.sender_address)?;

        let bridges = self
            .bridges
            .iter()
            .enumerate()
            .map(|(index, bridge)| {
                if bridge.planet_id.trim().is_empty() {
                    return Err(ConfigError::InvalidPlanet(PlanetError::EmptyId));
                }
                Ok(BridgePair {
                    planet_id: PlanetId(bridge.planet_id.clone()),
                    bridge_address: parse_address(
                        &format!("bridges[{index}].bridge_address"),
                        &bridge.bridge_address,
                    )?,
                    name: bridge.name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedSettings {
            planet,
            bridges,
            sender,
            private_key: self
                .private_key
                .as_deref()
                .filter(|key| !key.trim().is_empty())
                .map(PrivateKey::new),
            balance: self.balance,
            transfer: TransferSettings {
                debounce: Duration::from_secs(self.debounce_secs),
                memo_max_len: self.memo_max_len,
                confirmation_timeout: self.confirmation_timeout_secs.map(Duration::from_secs),
                analytics_event: self.analytics_event.clone(),
                currency: self.currency.clone(),
            },
            explorer_url: self.explorer_url.clone(),
            confirm_delay: Duration::from_millis(self.confirm_delay_ms),
            simulated_outcome: self.simulated_outcome,
        })
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, ConfigError> {
    raw.parse().map_err(|source| ConfigError::InvalidAddress {
        field: field.to_string(),
        source,
    })
}

/// Reads `path` (or `launcher.toml` when present) over the defaults, then
/// applies `APP__*` environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                read_settings_file(default_path)?
            } else {
                Settings::default()
            }
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

pub fn read_settings_file(path: &Path) -> Result<Settings, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(v) = lookup("APP__PLANET_ID") {
        settings.planet_id = v;
    }
    if let Some(v) = lookup("APP__PLANET_NAME") {
        settings.planet_name = v;
    }
    if let Some(v) = lookup("APP__SENDER_ADDRESS") {
        settings.sender_address = v;
    }
    if let Some(v) = lookup("APP__PRIVATE_KEY") {
        settings.private_key = Some(v);
    }
    if let Some(v) = lookup("APP__EXPLORER_URL") {
        settings.explorer_url = v;
    }
    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    if let Some(v) = lookup("APP__DEBOUNCE_SECS") {
        settings.debounce_secs = parse_env("APP__DEBOUNCE_SECS", v)?;
    }
    if let Some(v) = lookup("APP__CONFIRM_DELAY_MS") {
        settings.confirm_delay_ms = parse_env("APP__CONFIRM_DELAY_MS", v)?;
    }
    if let Some(v) = lookup("APP__BALANCE") {
        settings.balance = parse_env("APP__BALANCE", v)?;
    }
    if let Some(v) = lookup("APP__SIMULATED_OUTCOME") {
        settings.simulated_outcome = parse_env("APP__SIMULATED_OUTCOME", v)?;
    }
    Ok(())
}

fn parse_env<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
