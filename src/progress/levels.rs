//! XP and Level system
//!
//! Defines level thresholds and titles, and the synchronizer that corrects a
//! stored level which drifted from what the wallet's XP implies.

use rusqlite::OptionalExtension;
use serde::Serialize;
use tracing::info;

use super::db::ProgressDb;
use super::models::WalletAddress;
use super::time_bucket::now_ms;
use crate::error::{QuestError, Result};

/// Level definition
#[derive(Debug, Clone)]
pub struct Level {
    pub level: u32,
    pub xp_required: u64,
    pub title: &'static str,
}

/// All level definitions (must be sorted by level)
pub static LEVELS: &[Level] = &[
    Level { level: 1, xp_required: 0, title: "Newcomer" },
    Level { level: 2, xp_required: 200, title: "Explorer" },
    Level { level: 3, xp_required: 500, title: "Explorer" },
    Level { level: 4, xp_required: 1000, title: "Builder" },
    Level { level: 5, xp_required: 1750, title: "Builder" },
    Level { level: 6, xp_required: 2750, title: "Validator" },
    Level { level: 7, xp_required: 4000, title: "Validator" },
    Level { level: 8, xp_required: 6000, title: "Architect" },
    Level { level: 9, xp_required: 8500, title: "Architect" },
    Level { level: 10, xp_required: 12000, title: "Oracle" },
];

impl Level {
    /// Calculate level and title for given XP
    pub fn for_xp(xp: u64) -> &'static Level {
        LEVELS
            .iter()
            .rev()
            .find(|l| xp >= l.xp_required)
            .unwrap_or(&LEVELS[0])
    }

    /// Look up a level by number, clamped to the table
    pub fn get(level: u32) -> &'static Level {
        LEVELS
            .iter()
            .find(|l| l.level == level)
            .unwrap_or_else(|| if level == 0 { &LEVELS[0] } else { &LEVELS[LEVELS.len() - 1] })
    }

    /// Get XP needed for next level (None if max level)
    pub fn xp_for_next(current_level: u32) -> Option<u64> {
        LEVELS
            .iter()
            .find(|l| l.level == current_level + 1)
            .map(|l| l.xp_required)
    }

    /// Get max level
    pub fn max_level() -> u32 {
        LEVELS.last().map(|l| l.level).unwrap_or(1)
    }
}

/// Derived level information for display
#[derive(Debug, Clone, Default, Serialize)]
pub struct LevelProgress {
    pub total_xp: u64,
    pub level: u32,
    pub title: String,
    /// XP needed for current level
    pub current_level_xp: u64,
    /// XP needed for next level (None if max)
    pub next_level_xp: Option<u64>,
}

impl LevelProgress {
    pub fn new(total_xp: u64) -> Self {
        let level_info = Level::for_xp(total_xp);

        Self {
            total_xp,
            level: level_info.level,
            title: level_info.title.to_string(),
            current_level_xp: level_info.xp_required,
            next_level_xp: Level::xp_for_next(level_info.level),
        }
    }

    /// Calculate progress percentage to next level (0.0 - 1.0)
    pub fn progress_to_next(&self) -> f32 {
        match self.next_level_xp {
            Some(next) => {
                let xp_in_level = self.total_xp - self.current_level_xp;
                let xp_for_level = next - self.current_level_xp;
                if xp_for_level == 0 {
                    1.0
                } else {
                    (xp_in_level as f32) / (xp_for_level as f32)
                }
            }
            None => 1.0, // Max level
        }
    }

    pub fn is_max_level(&self) -> bool {
        self.next_level_xp.is_none()
    }
}

/// Outcome of a level synchronization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSync {
    /// The stored level was wrong and has been rewritten
    pub corrected: bool,
    pub old_level: u32,
    pub new_level: u32,
    pub title: &'static str,
}

impl LevelSync {
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.old_level
    }

    /// Title changed, which is what the celebration screen keys off
    pub fn tier_changed(&self) -> bool {
        self.corrected && Level::get(self.old_level).title != self.title
    }
}

/// Recomputes the derived level from cumulative XP
#[derive(Clone)]
pub struct LevelSynchronizer {
    db: ProgressDb,
}

impl LevelSynchronizer {
    pub fn new(db: ProgressDb) -> Self {
        Self { db }
    }

    pub fn synchronize(&self, wallet: &WalletAddress) -> Result<LevelSync> {
        self.synchronize_at(wallet, now_ms())
    }

    /// Synchronize with an explicit write timestamp.
    ///
    /// No write happens when the stored level already matches.
    pub fn synchronize_at(&self, wallet: &WalletAddress, now: i64) -> Result<LevelSync> {
        let sync = self.db.write(|tx| {
            let row: Option<(u64, u32)> = tx
                .query_row(
                    "SELECT total_xp, level FROM user_progress WHERE wallet = ?1",
                    [wallet.as_str()],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            let Some((xp, stored_level)) = row else {
                return Err(QuestError::not_found("progress record", wallet.as_str()));
            };

            let target = Level::for_xp(xp);
            if target.level == stored_level {
                return Ok(LevelSync {
                    corrected: false,
                    old_level: stored_level,
                    new_level: stored_level,
                    title: target.title,
                });
            }

            // Conditional on the level we observed
            let changed = tx.execute(
                "UPDATE user_progress SET level = ?2, updated_at = ?3 WHERE wallet = ?1 AND level = ?4",
                rusqlite::params![wallet.as_str(), target.level, now, stored_level],
            )?;

            Ok(LevelSync {
                corrected: changed == 1,
                old_level: stored_level,
                new_level: target.level,
                title: target.title,
            })
        })?;

        if sync.corrected {
            info!(
                wallet = %wallet.short(),
                old_level = sync.old_level,
                new_level = sync.new_level,
                title = sync.title,
                "level corrected"
            );
        }
        Ok(sync)
    }
}
