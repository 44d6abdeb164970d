//! Configuration file I/O operations

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::Config;

/// Environment variable overriding the progress database path
pub const DB_PATH_ENV: &str = "CHAINQUEST_DB";

impl Config {
    /// Get the global config directory path (~/.chainquest/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chainquest")
    }

    /// Get the global config file path (~/.chainquest/config.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    /// Save configuration to a file with atomic write and file locking.
    ///
    /// The exclusive lock keeps concurrent CLI invocations from interleaving;
    /// the temp file + rename keeps a crash from leaving a torn file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).with_context(|| "Failed to serialize config")?;
        write_locked(path, &content, false).map(|_| ())
    }

    /// Load global configuration from ~/.chainquest/config.toml
    /// If no config exists, auto-creates one with defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::global_config_path())
    }

    /// Load configuration from `path`, creating it with defaults when missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::auto_init(path)?;
        }
        Self::from_file(path)
    }

    /// Auto-initialize a configuration file when none exists
    ///
    /// Another process may create the file while we wait for the lock; it is
    /// left alone in that case.
    fn auto_init(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&Self::default())
            .with_context(|| "Failed to serialize default config")?;

        if write_locked(path, &content, true)? {
            eprintln!("Created {}", path.display());
        }
        Ok(())
    }
}

/// Atomically replace `path` with `content` under an exclusive lock file.
///
/// With `only_if_missing`, an existing file is kept and `false` is returned.
pub(crate) fn write_locked(path: &Path, content: &str, only_if_missing: bool) -> Result<bool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    // Separate from the config so the rename cannot drop the lock
    let lock_path = path.with_extension("toml.lock");
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&lock_path)
        .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;

    lock_file
        .lock_exclusive()
        .with_context(|| "Failed to acquire config lock")?;

    if only_if_missing && path.exists() {
        return Ok(false);
    }

    let temp_path = path.with_extension("toml.tmp");
    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

    temp_file
        .write_all(content.as_bytes())
        .with_context(|| "Failed to write config content")?;

    temp_file
        .sync_all()
        .with_context(|| "Failed to sync config file")?;

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename config file: {}", path.display()))?;

    // Lock is released when lock_file is dropped
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_creates_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.wallet.balance_retries, 3);
    }

    #[test]
    fn test_save_roundtrip_keeps_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.throttle.utc_offset_minutes = 120;
        config.store.path = Some(dir.path().join("custom.db"));
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.throttle.utc_offset_minutes, 120);
        assert_eq!(loaded.store.path, Some(dir.path().join("custom.db")));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_existing_file_not_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[wallet]\nbalance_retries = 9\n").unwrap();

        assert!(!write_locked(&path, "", true).unwrap());
        assert_eq!(Config::load_from(&path).unwrap().wallet.balance_retries, 9);
    }
}
