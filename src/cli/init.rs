//! Init command implementation

use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use chainquest::config::Config;

/// Default configuration content for chainquest init
pub const DEFAULT_CONFIG: &str = r#"# ChainQuest Configuration
# ========================
#
# Every key is optional; missing keys fall back to the defaults shown here.

# ============================================================================
# STORE - Where progress is kept
# ============================================================================
#
#   path            - Database file (default: ~/.chainquest/progress.db).
#                     The CHAINQUEST_DB environment variable takes precedence.
#   busy_timeout_ms - How long a write waits for another writer (default: 5000)

[store]
busy_timeout_ms = 5000

# ============================================================================
# THROTTLE - Once-per-day popups (daily streak, daily challenges)
# ============================================================================
#
#   min_gap_hours      - Suppress a popup shown less than this long ago (default: 6)
#   reset_after_hours  - Always show again after this long (default: 24)
#   utc_offset_minutes - Offset defining the calendar day for popups and streaks

[throttle]
min_gap_hours = 6
reset_after_hours = 24
utc_offset_minutes = 0

# ============================================================================
# WALLET - Balance reads and paid mints
# ============================================================================
#
#   request_timeout_ms  - Give up waiting on the wallet after this long
#   balance_retries     - Attempts for balance reads (payments are never retried)
#   retry_base_delay_ms - First backoff delay, doubled per attempt
#   in_flight_ttl_secs  - A mint that timed out may be retried after this long
#   mint_fee            - Fee for minting a completion NFT
#   simulated_balance   - Starting balance of the CLI's simulated wallet

[wallet]
request_timeout_ms = 15000
balance_retries = 3
retry_base_delay_ms = 200
in_flight_ttl_secs = 300
mint_fee = 0.010
simulated_balance = 0.250
"#;

/// Write a commented default config file
pub fn init_command(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Config::global_config_path);

    if config_path.exists() && !force {
        bail!(
            "Configuration already exists: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Created: {}", config_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses_to_defaults() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.store.busy_timeout_ms, defaults.store.busy_timeout_ms);
        assert_eq!(parsed.throttle.min_gap_hours, defaults.throttle.min_gap_hours);
        assert_eq!(parsed.wallet.mint_fee, defaults.wallet.mint_fee);
        assert_eq!(parsed.wallet.simulated_balance, defaults.wallet.simulated_balance);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        init_command(Some(path.clone()), false).unwrap();
        assert!(init_command(Some(path.clone()), false).is_err());
        init_command(Some(path), true).unwrap();
    }
}
