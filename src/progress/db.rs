//! SQLite database connection and schema management for progress data
//!
//! Manages the `~/.chainquest/progress.db` database with automatic schema migration.
//! Several handles may open the same file (one per tab or device); they
//! coordinate through SQLite locking and a bounded busy timeout.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::config::Config;
use crate::error::{QuestError, Result};

/// How long a write waits on another writer before failing closed
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA_VERSION: i32 = 2;

/// Database wrapper shared by the progress store, claim guard and throttle
#[derive(Clone)]
pub struct ProgressDb {
    conn: Arc<Mutex<Connection>>,
}

impl ProgressDb {
    /// Open or create the database at the default location (~/.chainquest/progress.db)
    pub fn open_default() -> Result<Self> {
        Self::open_configured(&Config::default())
    }

    /// Open the database named by the configuration (or `CHAINQUEST_DB`)
    pub fn open_configured(config: &Config) -> Result<Self> {
        Self::open_with_timeout(&config.db_path(), config.busy_timeout())
    }

    /// Open or create the database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open or create the database with an explicit busy timeout
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                QuestError::StoreUnavailable(format!(
                    "failed to create progress dir {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            QuestError::StoreUnavailable(format!(
                "failed to open progress db {}: {e}",
                path.display()
            ))
        })?;

        // WAL lets readers in other handles proceed while one writer commits
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(busy_timeout)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        debug!(path = %path.display(), "progress db ready");
        Ok(db)
    }

    /// Lock the connection
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| QuestError::StoreUnavailable("progress db lock poisoned".to_string()))
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front, so two handles racing on the same
    /// rows serialize instead of failing at commit. The transaction commits
    /// only when `f` returns `Ok`.
    pub fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        drop(conn);
        self.run_migrations()
    }

    /// Run any pending migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |r| r.get(0),
            )
            .unwrap_or(0);

        // Migration 2: lease column for paid claims
        if version < 2 {
            let has_reserved_at: bool = conn
                .prepare(
                    "SELECT COUNT(*) FROM pragma_table_info('rewardables') WHERE name = 'reserved_at'",
                )
                .and_then(|mut s| s.query_row([], |r| r.get::<_, i32>(0)))
                .map(|c| c > 0)
                .unwrap_or(false);

            if !has_reserved_at {
                conn.execute_batch("ALTER TABLE rewardables ADD COLUMN reserved_at INTEGER;")?;
            }
            conn.execute(
                "INSERT OR REPLACE INTO schema_version VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }
}

/// SQL schema for the progress database
const SCHEMA_SQL: &str = r#"
-- Per-wallet progress (one row per wallet)
CREATE TABLE IF NOT EXISTS user_progress (
    wallet TEXT PRIMARY KEY,
    total_xp INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    token_milli INTEGER NOT NULL DEFAULT 0,
    streak INTEGER NOT NULL DEFAULT 0,
    best_streak INTEGER NOT NULL DEFAULT 0,
    last_login_at INTEGER,
    last_login_day TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Idempotent boolean flags (row present = flag set)
CREATE TABLE IF NOT EXISTS progress_flags (
    wallet TEXT NOT NULL,
    flag TEXT NOT NULL,
    set_at INTEGER NOT NULL,
    PRIMARY KEY (wallet, flag)
);

-- Reward-bearing entities: modules, challenges, mystery boxes, NFT mints
CREATE TABLE IF NOT EXISTS rewardables (
    wallet TEXT NOT NULL,
    kind TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    claim_state TEXT NOT NULL DEFAULT 'unclaimed',
    tier TEXT,
    xp_reward INTEGER NOT NULL DEFAULT 0,
    token_reward_milli INTEGER NOT NULL DEFAULT 0,
    item_reward TEXT,
    claimed_at INTEGER,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (wallet, kind, entity_id)
);
CREATE INDEX IF NOT EXISTS idx_rewardables_wallet_kind ON rewardables(wallet, kind);

-- One row per payout; the UNIQUE key makes a second payout impossible
CREATE TABLE IF NOT EXISTS reward_ledger (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wallet TEXT NOT NULL,
    kind TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    xp INTEGER NOT NULL,
    token_milli INTEGER NOT NULL,
    special_item TEXT,
    tx_signature TEXT,
    paid_at INTEGER NOT NULL,
    UNIQUE (wallet, kind, entity_id)
);
CREATE INDEX IF NOT EXISTS idx_ledger_wallet ON reward_ledger(wallet);

-- Special items found in reward bundles
CREATE TABLE IF NOT EXISTS inventory (
    wallet TEXT NOT NULL,
    item TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (wallet, item)
);

-- Last time a once-per-day popup was shown
CREATE TABLE IF NOT EXISTS popup_state (
    wallet TEXT NOT NULL,
    popup TEXT NOT NULL,
    last_shown_at INTEGER NOT NULL,
    PRIMARY KEY (wallet, popup)
);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (1);
"#;
