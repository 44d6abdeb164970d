//! Progress store adapter - reads and mutates per-wallet progress
//!
//! Every mutation is an in-SQL increment, an `INSERT OR IGNORE` flag row or a
//! conditional update inside one immediate transaction. Application code never
//! reads a value, changes it and writes it back.

use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use super::db::ProgressDb;
use super::models::{DeltaOutcome, LoginOutcome, ProgressDelta, TokenAmount, UserProgress, WalletAddress};
use super::time_bucket::{day_bucket, is_previous_day, now_ms};
use crate::error::{QuestError, Result};

/// A special item held by a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryItem {
    pub item: String,
    pub quantity: u32,
}

/// Reads and writes per-wallet progress records
#[derive(Clone)]
pub struct ProgressStore {
    db: ProgressDb,
    day_offset: FixedOffset,
}

impl ProgressStore {
    pub fn new(db: ProgressDb, day_offset: FixedOffset) -> Self {
        Self { db, day_offset }
    }

    /// Load a progress record if the wallet has connected before
    pub fn find(&self, wallet: &WalletAddress) -> Result<Option<UserProgress>> {
        let conn = self.db.conn()?;
        load_progress(&conn, wallet)
    }

    /// Load a progress record, failing with `NotFound` when absent
    pub fn get(&self, wallet: &WalletAddress) -> Result<UserProgress> {
        self.find(wallet)?
            .ok_or_else(|| QuestError::not_found("progress record", wallet.as_str()))
    }

    /// Create the record with all-zero defaults on first connection
    pub fn ensure(&self, wallet: &WalletAddress) -> Result<DeltaOutcome> {
        self.apply_delta(wallet, &ProgressDelta::default())
    }

    /// Apply an additive delta, creating the record if needed
    pub fn apply_delta(&self, wallet: &WalletAddress, delta: &ProgressDelta) -> Result<DeltaOutcome> {
        let now = now_ms();
        let outcome = self.db.write(|tx| apply_delta_on(tx, wallet, delta, now))?;
        debug!(
            wallet = %wallet.short(),
            xp = delta.xp,
            tokens = %delta.tokens,
            created = outcome.is_created(),
            "progress delta applied"
        );
        Ok(outcome)
    }

    /// Record a login and maintain the daily streak
    ///
    /// Same calendar day leaves the streak alone, the next day extends it,
    /// and any longer gap restarts it at 1.
    pub fn record_login(&self, wallet: &WalletAddress, at: DateTime<Utc>) -> Result<LoginOutcome> {
        let now = at.timestamp_millis();
        let today = day_bucket(now, self.day_offset);

        let outcome = self.db.write(|tx| {
            let created = apply_delta_on(tx, wallet, &ProgressDelta::default(), now)?.is_created();

            let (streak, best, last_day): (u32, u32, Option<String>) = tx.query_row(
                "SELECT streak, best_streak, last_login_day FROM user_progress WHERE wallet = ?1",
                [wallet.as_str()],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )?;

            let (new_streak, first_today, streak_extended) = match last_day.as_deref() {
                // Same day, or a device whose clock runs behind
                Some(day) if day >= today.as_str() => (streak.max(1), false, false),
                Some(day) if is_previous_day(day, &today) => (streak + 1, true, true),
                _ => (1, true, false),
            };
            let new_best = best.max(new_streak);

            tx.execute(
                r#"UPDATE user_progress
                   SET streak = ?2, best_streak = ?3, last_login_at = ?4,
                       last_login_day = MAX(COALESCE(last_login_day, ''), ?5), updated_at = ?4
                   WHERE wallet = ?1"#,
                rusqlite::params![wallet.as_str(), new_streak, new_best, now, today],
            )?;

            Ok(LoginOutcome {
                created,
                first_today,
                streak_extended,
                streak: new_streak,
                best_streak: new_best,
            })
        })?;

        if outcome.streak_extended {
            info!(wallet = %wallet.short(), streak = outcome.streak, "daily streak extended");
        }
        Ok(outcome)
    }

    /// Special items found so far
    pub fn inventory(&self, wallet: &WalletAddress) -> Result<Vec<InventoryItem>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT item, quantity FROM inventory WHERE wallet = ?1 AND quantity > 0 ORDER BY item",
        )?;
        let items = stmt
            .query_map([wallet.as_str()], |r| {
                Ok(InventoryItem {
                    item: r.get(0)?,
                    quantity: r.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }
}

pub(crate) fn load_progress(conn: &Connection, wallet: &WalletAddress) -> Result<Option<UserProgress>> {
    let progress = conn
        .query_row(
            r#"SELECT total_xp, level, token_milli, streak, best_streak,
                      last_login_at, created_at, updated_at,
                      EXISTS(SELECT 1 FROM progress_flags f
                             WHERE f.wallet = p.wallet AND f.flag = 'onboarding_seen')
               FROM user_progress p WHERE wallet = ?1"#,
            [wallet.as_str()],
            |r| {
                Ok(UserProgress {
                    wallet: wallet.clone(),
                    total_xp: r.get(0)?,
                    level: r.get(1)?,
                    tokens: TokenAmount::from_milli(r.get(2)?),
                    streak: r.get(3)?,
                    best_streak: r.get(4)?,
                    last_login_at: r.get(5)?,
                    created_at: r.get(6)?,
                    updated_at: r.get(7)?,
                    onboarding_seen: r.get(8)?,
                })
            },
        )
        .optional()?;
    Ok(progress)
}

/// Apply a delta on an open transaction so callers can combine it with other writes
pub(crate) fn apply_delta_on(
    conn: &Connection,
    wallet: &WalletAddress,
    delta: &ProgressDelta,
    now: i64,
) -> Result<DeltaOutcome> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_progress (wallet, created_at, updated_at) VALUES (?1, ?2, ?2)",
        rusqlite::params![wallet.as_str(), now],
    )?;

    if delta.xp > 0 || !delta.tokens.is_zero() {
        conn.execute(
            r#"UPDATE user_progress
               SET total_xp = total_xp + ?2, token_milli = token_milli + ?3, updated_at = ?4
               WHERE wallet = ?1"#,
            rusqlite::params![wallet.as_str(), delta.xp, delta.tokens.milli(), now],
        )?;
    }

    for flag in &delta.flags {
        conn.execute(
            "INSERT OR IGNORE INTO progress_flags (wallet, flag, set_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![wallet.as_str(), flag.as_str(), now],
        )?;
    }

    Ok(if inserted == 1 {
        DeltaOutcome::Created
    } else {
        DeltaOutcome::Updated
    })
}

pub(crate) fn add_inventory_on(conn: &Connection, wallet: &WalletAddress, item: &str) -> Result<()> {
    conn.execute(
        r#"INSERT INTO inventory (wallet, item, quantity) VALUES (?1, ?2, 1)
           ON CONFLICT(wallet, item) DO UPDATE SET quantity = quantity + 1"#,
        rusqlite::params![wallet.as_str(), item],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::models::ProgressFlag;
    use crate::progress::time_bucket::day_offset;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn wallet() -> WalletAddress {
        WalletAddress::parse("0x1111111111111111111111111111111111111111").unwrap()
    }

    fn store(dir: &tempfile::TempDir) -> ProgressStore {
        let db = ProgressDb::open(&dir.path().join("progress.db")).unwrap();
        ProgressStore::new(db, day_offset(0))
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let dir = tempdir().unwrap();
        let store = store(&dir);
        assert!(store.find(&wallet()).unwrap().is_none());
        assert!(matches!(
            store.get(&wallet()),
            Err(QuestError::NotFound { .. })
        ));
    }

    #[test]
    fn test_first_connection_creates_defaults() {
        let dir = tempdir().unwrap();
        let store = store(&dir);

        assert_eq!(store.ensure(&wallet()).unwrap(), DeltaOutcome::Created);
        assert_eq!(store.ensure(&wallet()).unwrap(), DeltaOutcome::Updated);

        let progress = store.get(&wallet()).unwrap();
        assert_eq!(progress.total_xp, 0);
        assert_eq!(progress.level, 1);
        assert_eq!(progress.tokens, TokenAmount::ZERO);
        assert_eq!(progress.streak, 0);
        assert!(!progress.onboarding_seen);
    }

    #[test]
    fn test_deltas_accumulate() {
        let dir = tempdir().unwrap();
        let store = store(&dir);

        store
            .apply_delta(&wallet(), &ProgressDelta::xp(120).with_tokens(TokenAmount::from_milli(12)))
            .unwrap();
        store
            .apply_delta(&wallet(), &ProgressDelta::xp(80).with_tokens(TokenAmount::from_milli(3)))
            .unwrap();
        store
            .apply_delta(&wallet(), &ProgressDelta::default().with_flag(ProgressFlag::OnboardingSeen))
            .unwrap();
        store
            .apply_delta(&wallet(), &ProgressDelta::default().with_flag(ProgressFlag::OnboardingSeen))
            .unwrap();

        let progress = store.get(&wallet()).unwrap();
        assert_eq!(progress.total_xp, 200);
        assert_eq!(progress.tokens.milli(), 15);
        assert!(progress.onboarding_seen);
        // Level is only corrected by the synchronizer
        assert_eq!(progress.level, 1);
    }

    #[test]
    fn test_login_streak_progression() {
        let dir = tempdir().unwrap();
        let store = store(&dir);
        let day1 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

        let first = store.record_login(&wallet(), day1).unwrap();
        assert!(first.created);
        assert!(first.first_today);
        assert_eq!(first.streak, 1);

        let again = store
            .record_login(&wallet(), day1 + chrono::Duration::hours(5))
            .unwrap();
        assert!(!again.first_today);
        assert_eq!(again.streak, 1);

        let next_day = store
            .record_login(&wallet(), day1 + chrono::Duration::days(1))
            .unwrap();
        assert!(next_day.streak_extended);
        assert_eq!(next_day.streak, 2);

        let after_gap = store
            .record_login(&wallet(), day1 + chrono::Duration::days(4))
            .unwrap();
        assert!(!after_gap.streak_extended);
        assert_eq!(after_gap.streak, 1);
        assert_eq!(after_gap.best_streak, 2);

        let progress = store.get(&wallet()).unwrap();
        assert_eq!(progress.streak, 1);
        assert_eq!(progress.best_streak, 2);
        assert!(progress.last_login_at.is_some());
    }

    #[test]
    fn test_inventory_counts_items() {
        let dir = tempdir().unwrap();
        let db = ProgressDb::open(&dir.path().join("progress.db")).unwrap();
        let store = ProgressStore::new(db.clone(), day_offset(0));

        db.write(|tx| {
            add_inventory_on(tx, &wallet(), "Silver Key")?;
            add_inventory_on(tx, &wallet(), "Silver Key")?;
            add_inventory_on(tx, &wallet(), "Bronze Badge")
        })
        .unwrap();

        let items = store.inventory(&wallet()).unwrap();
        assert_eq!(
            items,
            vec![
                InventoryItem { item: "Bronze Badge".into(), quantity: 1 },
                InventoryItem { item: "Silver Key".into(), quantity: 2 },
            ]
        );
    }
}
