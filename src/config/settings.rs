//! Settings sections of the config file

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::progress::TokenAmount;

/// Progress database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Database file (defaults to ~/.chainquest/progress.db)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// How long a writer waits for the SQLite lock
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Daily popup throttle windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleSettings {
    /// Suppress a popup shown less than this many hours ago
    #[serde(default = "default_min_gap_hours")]
    pub min_gap_hours: u32,

    /// Always show again after this many hours
    #[serde(default = "default_reset_after_hours")]
    pub reset_after_hours: u32,

    /// Offset from UTC that defines the calendar day (also used for streaks)
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Wallet and paid claim settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSettings {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attempts for balance reads (payments are never retried)
    #[serde(default = "default_balance_retries")]
    pub balance_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// After this long an unfinished paid claim can be retried
    #[serde(default = "default_in_flight_ttl_secs")]
    pub in_flight_ttl_secs: u64,

    /// Fee for minting a completion NFT
    #[serde(default = "default_mint_fee")]
    pub mint_fee: TokenAmount,

    /// Starting balance of the simulated wallet used by the CLI
    #[serde(default = "default_simulated_balance")]
    pub simulated_balance: TokenAmount,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_min_gap_hours() -> u32 {
    6
}

fn default_reset_after_hours() -> u32 {
    24
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_balance_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_in_flight_ttl_secs() -> u64 {
    300
}

fn default_mint_fee() -> TokenAmount {
    TokenAmount::from_milli(10)
}

fn default_simulated_balance() -> TokenAmount {
    TokenAmount::from_milli(250)
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            min_gap_hours: default_min_gap_hours(),
            reset_after_hours: default_reset_after_hours(),
            utc_offset_minutes: 0,
        }
    }
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            balance_retries: default_balance_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            in_flight_ttl_secs: default_in_flight_ttl_secs(),
            mint_fee: default_mint_fee(),
            simulated_balance: default_simulated_balance(),
        }
    }
}
