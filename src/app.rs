//! Entry point tying the components to one database and configuration

use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::progress::{LevelSynchronizer, ProgressDb, ProgressStore};
use crate::rewards::{ClaimGuard, NftMinter, RewardManager};
use crate::session::PopupThrottle;

/// Central handle for progression and rewards
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct ChainQuest {
    db: ProgressDb,
    config: Config,
}

impl ChainQuest {
    /// Open the database named by the configuration
    pub fn new(config: Config) -> Result<Self> {
        let db = ProgressDb::open_configured(&config)?;
        Ok(Self { db, config })
    }

    /// Open a database at a custom path
    pub fn with_path(path: &Path, config: Config) -> Result<Self> {
        let db = ProgressDb::open_with_timeout(path, config.busy_timeout())?;
        Ok(Self { db, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> ProgressStore {
        ProgressStore::new(self.db.clone(), self.config.day_offset())
    }

    pub fn claims(&self) -> ClaimGuard {
        ClaimGuard::new(self.db.clone())
    }

    pub fn levels(&self) -> LevelSynchronizer {
        LevelSynchronizer::new(self.db.clone())
    }

    pub fn rewards(&self) -> RewardManager {
        RewardManager::new(self.db.clone(), self.config.day_offset())
    }

    pub fn throttle(&self) -> PopupThrottle {
        PopupThrottle::new(self.db.clone(), self.config.throttle_policy())
    }

    pub fn minter(&self) -> NftMinter {
        NftMinter::new(self.db.clone(), self.config.mint_settings())
    }
}
