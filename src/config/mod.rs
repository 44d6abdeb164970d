//! Configuration loading and management

mod io;
mod settings;

pub use io::DB_PATH_ENV;
pub use settings::{StoreSettings, ThrottleSettings, WalletSettings};

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::progress::day_offset;
use crate::rewards::MintSettings;
use crate::session::ThrottlePolicy;
use crate::wallet::RetryPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub throttle: ThrottleSettings,

    #[serde(default)]
    pub wallet: WalletSettings,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Database path: `CHAINQUEST_DB`, then `store.path`, then the default location
    pub fn db_path(&self) -> PathBuf {
        if let Some(path) = std::env::var_os(DB_PATH_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        self.store
            .path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("progress.db"))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store.busy_timeout_ms)
    }

    pub fn day_offset(&self) -> FixedOffset {
        day_offset(self.throttle.utc_offset_minutes)
    }

    pub fn throttle_policy(&self) -> ThrottlePolicy {
        ThrottlePolicy {
            min_gap: chrono::Duration::hours(i64::from(self.throttle.min_gap_hours)),
            reset_after: chrono::Duration::hours(i64::from(self.throttle.reset_after_hours)),
            day_offset: self.day_offset(),
        }
    }

    pub fn mint_settings(&self) -> MintSettings {
        let wallet = &self.wallet;
        MintSettings {
            fee: wallet.mint_fee,
            request_timeout: Duration::from_millis(wallet.request_timeout_ms),
            in_flight_ttl: Duration::from_secs(wallet.in_flight_ttl_secs),
            balance_retry: RetryPolicy::new(wallet.balance_retries, wallet.retry_base_delay_ms),
        }
    }
}
