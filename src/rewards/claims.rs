//! Claim guard - pays out each rewardable entity at most once
//!
//! Every claim is a single immediate transaction: the conditional state
//! transition (`... WHERE claim_state = 'unclaimed'`) and the payout (progress
//! increment, inventory, ledger row) commit together or not at all. Two tabs or
//! devices racing on the same entity serialize on the SQLite write lock; the
//! loser sees a claimed row and gets `AlreadyClaimed`.

use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use super::entities::{
    ClaimOutcome, ClaimReceipt, ClaimState, EntityKind, EntityRef, NewRewardable, Reservation,
    RewardSpec, RewardableEntity,
};
use super::generator::{RewardBundle, RewardGenerator};
use super::tiers::RewardTier;
use crate::error::{QuestError, Result};
use crate::progress::db::ProgressDb;
use crate::progress::store::{add_inventory_on, apply_delta_on};
use crate::progress::{ProgressDelta, TokenAmount, WalletAddress, now_ms};

const ENTITY_COLUMNS: &str = "entity_id, completed, claim_state, tier, xp_reward, \
     token_reward_milli, item_reward, created_at, reserved_at, claimed_at";

/// Guards reward payouts
#[derive(Clone)]
pub struct ClaimGuard {
    db: ProgressDb,
    generator: RewardGenerator,
}

impl ClaimGuard {
    pub fn new(db: ProgressDb) -> Self {
        Self {
            db,
            generator: RewardGenerator::new(),
        }
    }

    /// Register an entity. Returns false if it already existed (left untouched).
    pub fn register(&self, new: &NewRewardable) -> Result<bool> {
        let (tier, bundle) = match &new.reward {
            RewardSpec::Fixed(bundle) => (None, bundle.clone()),
            RewardSpec::Rolled(tier) => (
                Some(tier.as_str()),
                RewardBundle::fixed(0, TokenAmount::ZERO, None),
            ),
        };
        let entity = &new.entity;

        let inserted = self.db.write(|tx| {
            Ok(tx.execute(
                r#"INSERT OR IGNORE INTO rewardables
                   (wallet, kind, entity_id, completed, claim_state, tier,
                    xp_reward, token_reward_milli, item_reward, created_at)
                   VALUES (?1, ?2, ?3, ?4, 'unclaimed', ?5, ?6, ?7, ?8, ?9)"#,
                rusqlite::params![
                    entity.wallet.as_str(),
                    entity.kind.as_str(),
                    entity.id,
                    new.completed,
                    tier,
                    bundle.xp,
                    bundle.tokens.milli(),
                    bundle.special_item,
                    now_ms(),
                ],
            )?)
        })?;

        if inserted == 1 {
            debug!(entity = %entity, "rewardable registered");
        }
        Ok(inserted == 1)
    }

    /// Set the completion flag. Returns true if this call set it.
    pub fn mark_completed(&self, entity: &EntityRef) -> Result<bool> {
        self.db.write(|tx| {
            let changed = tx.execute(
                r#"UPDATE rewardables SET completed = 1
                   WHERE wallet = ?1 AND kind = ?2 AND entity_id = ?3 AND completed = 0"#,
                rusqlite::params![entity.wallet.as_str(), entity.kind.as_str(), entity.id],
            )?;
            if changed == 0 && load_entity(tx, entity)?.is_none() {
                return Err(QuestError::not_found(entity.kind.label(), &entity.id));
            }
            Ok(changed == 1)
        })
    }

    pub fn find(&self, entity: &EntityRef) -> Result<Option<RewardableEntity>> {
        let conn = self.db.conn()?;
        load_entity(&conn, entity)
    }

    pub fn get(&self, entity: &EntityRef) -> Result<RewardableEntity> {
        self.find(entity)?
            .ok_or_else(|| QuestError::not_found(entity.kind.label(), &entity.id))
    }

    /// All entities of one kind owned by a wallet, oldest first
    pub fn list(&self, wallet: &WalletAddress, kind: EntityKind) -> Result<Vec<RewardableEntity>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTITY_COLUMNS} FROM rewardables WHERE wallet = ?1 AND kind = ?2 \
             ORDER BY created_at, entity_id"
        ))?;
        let entities = stmt
            .query_map(rusqlite::params![wallet.as_str(), kind.as_str()], |r| {
                let id: String = r.get(0)?;
                map_entity(EntityRef::new(wallet.clone(), kind, id), r)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entities)
    }

    /// Claim a completed entity and pay out its reward exactly once
    pub fn try_claim(&self, entity: &EntityRef) -> Result<ClaimOutcome> {
        let now = now_ms();
        let outcome = self.db.write(|tx| {
            let current = load_entity(tx, entity)?
                .ok_or_else(|| QuestError::not_found(entity.kind.label(), &entity.id))?;

            match current.state {
                ClaimState::Claimed => return Ok(ClaimOutcome::AlreadyClaimed),
                ClaimState::InFlight => return Ok(ClaimOutcome::InFlight),
                ClaimState::Unclaimed => {}
            }
            if !current.completed {
                return Err(QuestError::NotCompleted(entity.to_string()));
            }

            let changed = tx.execute(
                r#"UPDATE rewardables SET claim_state = 'claimed', claimed_at = ?4
                   WHERE wallet = ?1 AND kind = ?2 AND entity_id = ?3
                     AND claim_state = 'unclaimed' AND completed = 1"#,
                rusqlite::params![entity.wallet.as_str(), entity.kind.as_str(), entity.id, now],
            )?;
            if changed == 0 {
                return Ok(ClaimOutcome::AlreadyClaimed);
            }

            Ok(ClaimOutcome::Claimed(self.pay_out(tx, &current, now, None)?))
        })?;

        log_outcome(entity, &outcome);
        Ok(outcome)
    }

    /// Take the in-flight lease for a paid claim.
    ///
    /// A lease older than `lease_ms` is considered abandoned and may be taken over.
    pub fn reserve(&self, entity: &EntityRef, now: i64, lease_ms: i64) -> Result<Reservation> {
        let stale_before = now.saturating_sub(lease_ms);
        let reservation = self.db.write(|tx| {
            let current = load_entity(tx, entity)?
                .ok_or_else(|| QuestError::not_found(entity.kind.label(), &entity.id))?;

            match current.state {
                ClaimState::Claimed => return Ok(Reservation::AlreadyClaimed),
                ClaimState::InFlight if current.reserved_at.unwrap_or(0) > stale_before => {
                    return Ok(Reservation::InFlight);
                }
                _ => {}
            }
            if !current.completed {
                return Err(QuestError::NotCompleted(entity.to_string()));
            }

            let changed = tx.execute(
                r#"UPDATE rewardables SET claim_state = 'in_flight', reserved_at = ?4
                   WHERE wallet = ?1 AND kind = ?2 AND entity_id = ?3 AND completed = 1
                     AND (claim_state = 'unclaimed'
                          OR (claim_state = 'in_flight' AND COALESCE(reserved_at, 0) <= ?5))"#,
                rusqlite::params![
                    entity.wallet.as_str(),
                    entity.kind.as_str(),
                    entity.id,
                    now,
                    stale_before
                ],
            )?;
            Ok(if changed == 1 {
                Reservation::Reserved
            } else {
                Reservation::InFlight
            })
        })?;

        if reservation == Reservation::Reserved {
            debug!(entity = %entity, "claim reserved");
        }
        Ok(reservation)
    }

    /// Complete a reserved paid claim after the external action succeeded.
    ///
    /// Only an `in_flight` entity is paid out. A lease that expired and was taken
    /// over is still in flight, so a late success completes here.
    pub fn finalize(&self, entity: &EntityRef, tx_signature: Option<&str>) -> Result<ClaimOutcome> {
        let now = now_ms();
        let outcome = self.db.write(|tx| {
            let current = load_entity(tx, entity)?
                .ok_or_else(|| QuestError::not_found(entity.kind.label(), &entity.id))?;
            match current.state {
                ClaimState::Claimed => return Ok(ClaimOutcome::AlreadyClaimed),
                ClaimState::Unclaimed => return Err(QuestError::NotReserved(entity.to_string())),
                ClaimState::InFlight => {}
            }

            let changed = tx.execute(
                r#"UPDATE rewardables SET claim_state = 'claimed', claimed_at = ?4
                   WHERE wallet = ?1 AND kind = ?2 AND entity_id = ?3
                     AND claim_state = 'in_flight' AND completed = 1"#,
                rusqlite::params![entity.wallet.as_str(), entity.kind.as_str(), entity.id, now],
            )?;
            if changed == 0 {
                return Err(QuestError::NotCompleted(entity.to_string()));
            }

            Ok(ClaimOutcome::Claimed(self.pay_out(
                tx,
                &current,
                now,
                tx_signature,
            )?))
        })?;

        log_outcome(entity, &outcome);
        Ok(outcome)
    }

    /// Drop the in-flight lease after a definite failure so the user can retry
    pub fn release(&self, entity: &EntityRef) -> Result<bool> {
        let released = self.db.write(|tx| {
            Ok(tx.execute(
                r#"UPDATE rewardables SET claim_state = 'unclaimed', reserved_at = NULL
                   WHERE wallet = ?1 AND kind = ?2 AND entity_id = ?3 AND claim_state = 'in_flight'"#,
                rusqlite::params![entity.wallet.as_str(), entity.kind.as_str(), entity.id],
            )? == 1)
        })?;
        if released {
            warn!(entity = %entity, "claim lease released");
        }
        Ok(released)
    }

    /// Number of ledger rows for an entity (0 or 1)
    pub fn payout_count(&self, entity: &EntityRef) -> Result<u32> {
        let conn = self.db.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM reward_ledger WHERE wallet = ?1 AND kind = ?2 AND entity_id = ?3",
            rusqlite::params![entity.wallet.as_str(), entity.kind.as_str(), entity.id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Resolve the bundle and apply it; runs inside the claim transaction
    fn pay_out(
        &self,
        conn: &Connection,
        current: &RewardableEntity,
        now: i64,
        tx_signature: Option<&str>,
    ) -> Result<ClaimReceipt> {
        let entity = &current.entity;
        let bundle = match &current.reward {
            RewardSpec::Fixed(bundle) => bundle.clone(),
            RewardSpec::Rolled(tier) => self.generator.generate(*tier),
        };

        apply_delta_on(
            conn,
            &entity.wallet,
            &ProgressDelta::xp(bundle.xp).with_tokens(bundle.tokens),
            now,
        )?;
        if let Some(item) = &bundle.special_item {
            add_inventory_on(conn, &entity.wallet, item)?;
        }
        conn.execute(
            r#"INSERT INTO reward_ledger
               (wallet, kind, entity_id, xp, token_milli, special_item, tx_signature, paid_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            rusqlite::params![
                entity.wallet.as_str(),
                entity.kind.as_str(),
                entity.id,
                bundle.xp,
                bundle.tokens.milli(),
                bundle.special_item,
                tx_signature,
                now,
            ],
        )?;

        Ok(ClaimReceipt {
            entity: entity.clone(),
            bundle,
            claimed_at: now,
            tx_signature: tx_signature.map(str::to_string),
        })
    }
}

fn log_outcome(entity: &EntityRef, outcome: &ClaimOutcome) {
    match outcome {
        ClaimOutcome::Claimed(receipt) => info!(
            entity = %entity,
            xp = receipt.bundle.xp,
            tokens = %receipt.bundle.tokens,
            item = receipt.bundle.special_item.as_deref().unwrap_or("-"),
            "reward claimed"
        ),
        ClaimOutcome::AlreadyClaimed => debug!(entity = %entity, "already claimed"),
        ClaimOutcome::InFlight => debug!(entity = %entity, "claim in flight"),
    }
}

fn load_entity(conn: &Connection, entity: &EntityRef) -> Result<Option<RewardableEntity>> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {ENTITY_COLUMNS} FROM rewardables \
                 WHERE wallet = ?1 AND kind = ?2 AND entity_id = ?3"
            ),
            rusqlite::params![entity.wallet.as_str(), entity.kind.as_str(), entity.id],
            |r| map_entity(entity.clone(), r),
        )
        .optional()?;
    Ok(found)
}

fn map_entity(entity: EntityRef, r: &Row<'_>) -> rusqlite::Result<RewardableEntity> {
    let state: String = r.get(2)?;
    let tier: Option<String> = r.get(3)?;
    let reward = match tier {
        Some(tier) => RewardSpec::Rolled(RewardTier::parse_or_lowest(&tier)),
        None => RewardSpec::Fixed(RewardBundle::fixed(
            r.get(4)?,
            TokenAmount::from_milli(r.get(5)?),
            r.get(6)?,
        )),
    };

    Ok(RewardableEntity {
        entity,
        completed: r.get(1)?,
        // Unknown states never pay out
        state: ClaimState::from_str(&state).unwrap_or(ClaimState::Claimed),
        reward,
        created_at: r.get(7)?,
        reserved_at: r.get(8)?,
        claimed_at: r.get(9)?,
    })
}
