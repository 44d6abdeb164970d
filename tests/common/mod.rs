//! Shared test utilities for progression integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use chainquest::ChainQuest;
use chainquest::config::Config;
use chainquest::progress::WalletAddress;

/// A ChainQuest instance on a fresh database in a temp dir
pub struct TestApp {
    pub app: ChainQuest,
    pub dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let app = ChainQuest::with_path(&dir.path().join("progress.db"), config)
            .expect("Failed to open progress db");
        Self { app, dir }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("progress.db")
    }
}

/// Deterministic wallet address for test number `n`
pub fn wallet(n: u8) -> WalletAddress {
    WalletAddress::parse(&format!("0x{}", format!("{n:02x}").repeat(20)))
        .expect("valid test address")
}
