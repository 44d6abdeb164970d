//! Per-wallet progression state
//!
//! Progress records, the streak, inventory and derived level live in a SQLite
//! database (`~/.chainquest/progress.db`). All writes go through immediate
//! transactions so concurrent tabs and devices serialize on the write lock.
//!
//! # Usage
//!
//! ```ignore
//! let db = ProgressDb::open_default()?;
//! let store = ProgressStore::new(db.clone(), day_offset(0));
//!
//! store.record_login(&wallet, Utc::now())?;
//! store.apply_delta(&wallet, &ProgressDelta::xp(120))?;
//!
//! let sync = LevelSynchronizer::new(db).synchronize(&wallet)?;
//! ```

pub(crate) mod db;
pub(crate) mod levels;
mod models;
pub(crate) mod store;
pub(crate) mod time_bucket;

pub use db::{DEFAULT_BUSY_TIMEOUT, ProgressDb};
pub use levels::{LEVELS, Level, LevelProgress, LevelSync, LevelSynchronizer};
pub use models::{
    DeltaOutcome, LoginOutcome, ProgressDelta, ProgressFlag, TokenAmount, UserProgress,
    WalletAddress,
};
pub use store::{InventoryItem, ProgressStore};
pub use time_bucket::{day_bucket, day_offset, from_ms, local_day, now_ms, parse_day_bucket};
