//! Reward Manager - orchestrates claims, progress and level sync
//!
//! Each user action goes through the claim guard first; only a committed
//! claim is followed by a level synchronization. Once the claim has committed
//! the call no longer fails: follow-up work that errors is logged and left
//! for the next call to repair.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::catalog::{DailyChallenge, LearningModule, NFT_MINT_XP};
use super::claims::ClaimGuard;
use super::entities::{ClaimOutcome, EntityKind, EntityRef, NewRewardable, RewardableEntity};
use super::tiers::RewardTier;
use crate::error::{QuestError, Result};
use crate::progress::db::ProgressDb;
use crate::progress::levels::{LevelSync, LevelSynchronizer};
use crate::progress::{
    LoginOutcome, ProgressDelta, ProgressFlag, ProgressStore, TokenAmount, WalletAddress,
    day_bucket, local_day,
};

/// Things worth telling the user about after an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RewardEvent {
    XpAwarded { amount: u64, reason: String },
    TokensCredited { amount: TokenAmount },
    ItemFound { item: String },
    LevelChanged(LevelSync),
    BoxGranted { box_id: String, tier: RewardTier },
}

/// A mystery box that was just granted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantedBox {
    pub entity: EntityRef,
    pub tier: RewardTier,
}

/// Claim outcome plus the follow-up level sync
#[derive(Debug, Clone, Serialize)]
pub struct ClaimResult {
    pub outcome: ClaimOutcome,
    pub level: Option<LevelSync>,
    pub bonus_box: Option<GrantedBox>,
}

impl ClaimResult {
    pub fn events(&self) -> Vec<RewardEvent> {
        let mut events = Vec::new();

        if let Some(receipt) = self.outcome.receipt() {
            let bundle = &receipt.bundle;
            if bundle.xp > 0 {
                events.push(RewardEvent::XpAwarded {
                    amount: bundle.xp,
                    reason: format!("{} {}", receipt.entity.kind.label(), receipt.entity.id),
                });
            }
            if !bundle.tokens.is_zero() {
                events.push(RewardEvent::TokensCredited {
                    amount: bundle.tokens,
                });
            }
            if let Some(item) = &bundle.special_item {
                events.push(RewardEvent::ItemFound { item: item.clone() });
            }
        }

        if let Some(level) = self.level.as_ref().filter(|l| l.corrected) {
            events.push(RewardEvent::LevelChanged(level.clone()));
        }

        if let Some(granted) = &self.bonus_box {
            events.push(RewardEvent::BoxGranted {
                box_id: granted.entity.id.clone(),
                tier: granted.tier,
            });
        }

        events
    }
}

/// Today's challenge as shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct DailyChallengeView {
    pub id: String,
    pub slug: &'static str,
    pub title: &'static str,
    pub xp: u64,
    pub tokens: TokenAmount,
    pub completed: bool,
    pub claimed: bool,
}

/// Main manager for reward flows
#[derive(Clone)]
pub struct RewardManager {
    store: ProgressStore,
    claims: ClaimGuard,
    levels: LevelSynchronizer,
    day_offset: FixedOffset,
}

impl RewardManager {
    pub fn new(db: ProgressDb, day_offset: FixedOffset) -> Self {
        Self {
            store: ProgressStore::new(db.clone(), day_offset),
            claims: ClaimGuard::new(db.clone()),
            levels: LevelSynchronizer::new(db),
            day_offset,
        }
    }

    /// Record a wallet connection (creates the record on first connect)
    pub fn login(&self, wallet: &WalletAddress, at: DateTime<Utc>) -> Result<LoginOutcome> {
        let outcome = self.store.record_login(wallet, at)?;
        if outcome.created {
            info!(wallet = %wallet.short(), "new wallet connected");
        }
        Ok(outcome)
    }

    pub fn mark_onboarding_seen(&self, wallet: &WalletAddress) -> Result<()> {
        self.store.apply_delta(
            wallet,
            &ProgressDelta::default().with_flag(ProgressFlag::OnboardingSeen),
        )?;
        Ok(())
    }

    // ========================================
    // LEARNING MODULES
    // ========================================

    /// Complete a module: pays its reward once and unlocks its completion NFT
    pub fn complete_module(&self, wallet: &WalletAddress, module_id: &str) -> Result<ClaimResult> {
        let module = LearningModule::get(module_id)
            .ok_or_else(|| QuestError::not_found("learning module", module_id))?;

        let entity = EntityRef::new(wallet.clone(), EntityKind::Module, module.id);
        self.claims
            .register(&NewRewardable::fixed(entity.clone(), module.xp, module.tokens).completed())?;
        self.claims.mark_completed(&entity)?;

        let mint = EntityRef::new(wallet.clone(), EntityKind::NftMint, module.id);
        self.claims
            .register(&NewRewardable::fixed(mint, NFT_MINT_XP, TokenAmount::ZERO).completed())?;

        let outcome = self.claims.try_claim(&entity)?;
        Ok(self.finish_claim(wallet, outcome))
    }

    // ========================================
    // MYSTERY BOXES
    // ========================================

    pub fn grant_mystery_box(
        &self,
        wallet: &WalletAddress,
        tier: RewardTier,
        source: &str,
    ) -> Result<GrantedBox> {
        let id = Uuid::new_v4().simple().to_string();
        let entity = EntityRef::new(wallet.clone(), EntityKind::MysteryBox, id);
        self.claims
            .register(&NewRewardable::rolled(entity.clone(), tier).completed())?;
        info!(wallet = %wallet.short(), %tier, box_id = %entity.id, source, "mystery box granted");
        Ok(GrantedBox { entity, tier })
    }

    /// Grant a box under a fixed id. `None` when that box already exists.
    fn grant_box_with_id(
        &self,
        wallet: &WalletAddress,
        tier: RewardTier,
        id: &str,
    ) -> Result<Option<GrantedBox>> {
        let entity = EntityRef::new(wallet.clone(), EntityKind::MysteryBox, id);
        let inserted = self
            .claims
            .register(&NewRewardable::rolled(entity.clone(), tier).completed())?;
        Ok(inserted.then_some(GrantedBox { entity, tier }))
    }

    pub fn mystery_boxes(&self, wallet: &WalletAddress) -> Result<Vec<RewardableEntity>> {
        self.claims.list(wallet, EntityKind::MysteryBox)
    }

    /// Open a box; the bundle is rolled inside the claim transaction
    pub fn open_mystery_box(&self, wallet: &WalletAddress, box_id: &str) -> Result<ClaimResult> {
        let entity = EntityRef::new(wallet.clone(), EntityKind::MysteryBox, box_id);
        let outcome = self.claims.try_claim(&entity)?;
        Ok(self.finish_claim(wallet, outcome))
    }

    // ========================================
    // DAILY CHALLENGES
    // ========================================

    /// Today's challenges, assigning them on first look
    pub fn daily_challenges(
        &self,
        wallet: &WalletAddress,
        at: DateTime<Utc>,
    ) -> Result<Vec<DailyChallengeView>> {
        let mut views = Vec::new();

        for (challenge, entity) in self.assign_today(wallet, at)? {
            let stored = self.claims.get(&entity)?;
            views.push(DailyChallengeView {
                id: entity.id,
                slug: challenge.slug,
                title: challenge.title,
                xp: challenge.xp,
                tokens: challenge.tokens,
                completed: stored.completed,
                claimed: stored.is_claimed(),
            });
        }

        Ok(views)
    }

    /// Mark one of today's challenges as done
    pub fn complete_challenge(
        &self,
        wallet: &WalletAddress,
        slug: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let entity = self.todays_challenge(wallet, slug, at)?;
        self.claims.mark_completed(&entity)
    }

    /// Claim one of today's challenges.
    ///
    /// Claiming the last of today's set grants a bonus box whose tier follows
    /// the login streak. The box id is per day, so it is granted at most once;
    /// a repeated claim grants it if an earlier attempt could not.
    pub fn claim_challenge(
        &self,
        wallet: &WalletAddress,
        slug: &str,
        at: DateTime<Utc>,
    ) -> Result<ClaimResult> {
        let entity = self.todays_challenge(wallet, slug, at)?;
        let outcome = self.claims.try_claim(&entity)?;
        let settled = !matches!(outcome, ClaimOutcome::InFlight);
        let mut result = self.finish_claim(wallet, outcome);

        if settled {
            match self.grant_daily_bonus(wallet, at) {
                Ok(granted) => result.bonus_box = granted,
                Err(e) => warn!(wallet = %wallet.short(), error = %e, "daily bonus check failed"),
            }
        }

        Ok(result)
    }

    /// Register today's set (idempotent) and pair each challenge with its entity
    fn assign_today(
        &self,
        wallet: &WalletAddress,
        at: DateTime<Utc>,
    ) -> Result<Vec<(&'static DailyChallenge, EntityRef)>> {
        let today = day_bucket(at.timestamp_millis(), self.day_offset);
        let mut assigned = Vec::new();

        for challenge in DailyChallenge::for_day(local_day(at, self.day_offset)) {
            let entity = EntityRef::new(
                wallet.clone(),
                EntityKind::Challenge,
                challenge.entity_id(&today),
            );
            self.claims.register(&NewRewardable::fixed(
                entity.clone(),
                challenge.xp,
                challenge.tokens,
            ))?;
            assigned.push((challenge, entity));
        }

        Ok(assigned)
    }

    /// Today's entity for `slug`; slugs outside today's set are not found
    fn todays_challenge(&self, wallet: &WalletAddress, slug: &str, at: DateTime<Utc>) -> Result<EntityRef> {
        self.assign_today(wallet, at)?
            .into_iter()
            .find(|(challenge, _)| challenge.slug == slug)
            .map(|(_, entity)| entity)
            .ok_or_else(|| QuestError::not_found("daily challenge", slug))
    }

    fn grant_daily_bonus(&self, wallet: &WalletAddress, at: DateTime<Utc>) -> Result<Option<GrantedBox>> {
        if !self.daily_challenges(wallet, at)?.iter().all(|c| c.claimed) {
            return Ok(None);
        }

        let streak = self.store.get(wallet)?.streak;
        let tier = RewardTier::for_streak(streak);
        let day = day_bucket(at.timestamp_millis(), self.day_offset);
        let granted = self.grant_box_with_id(wallet, tier, &format!("daily-bonus-{day}"))?;
        if granted.is_some() {
            info!(wallet = %wallet.short(), %tier, streak, "daily set finished, bonus box granted");
        }
        Ok(granted)
    }

    /// Level sync after a claim. A committed claim is never turned into an error.
    fn finish_claim(&self, wallet: &WalletAddress, outcome: ClaimOutcome) -> ClaimResult {
        let level = match &outcome {
            ClaimOutcome::Claimed(_) => self.sync_level(wallet),
            // Repairs a level left stale by an earlier failed sync
            ClaimOutcome::AlreadyClaimed => self.sync_level(wallet).filter(|l| l.corrected),
            ClaimOutcome::InFlight => None,
        };
        ClaimResult {
            outcome,
            level,
            bonus_box: None,
        }
    }

    fn sync_level(&self, wallet: &WalletAddress) -> Option<LevelSync> {
        self.levels
            .synchronize(wallet)
            .inspect_err(|e| warn!(wallet = %wallet.short(), error = %e, "level sync after claim failed"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::day_offset;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn wallet() -> WalletAddress {
        WalletAddress::parse("0x6666666666666666666666666666666666666666").unwrap()
    }

    fn manager(dir: &tempfile::TempDir) -> RewardManager {
        let db = ProgressDb::open(&dir.path().join("progress.db")).unwrap();
        RewardManager::new(db, day_offset(0))
    }

    /// Run raw SQL against the same file from a separate connection
    fn exec(dir: &tempfile::TempDir, sql: &str) {
        rusqlite::Connection::open(dir.path().join("progress.db"))
            .unwrap()
            .execute_batch(sql)
            .unwrap();
    }

    fn finish_all_but_last(manager: &RewardManager, at: DateTime<Utc>) -> &'static str {
        let slugs: Vec<_> = manager
            .daily_challenges(&wallet(), at)
            .unwrap()
            .iter()
            .map(|c| c.slug)
            .collect();
        for slug in &slugs {
            manager.complete_challenge(&wallet(), slug, at).unwrap();
        }
        for slug in &slugs[..slugs.len() - 1] {
            manager.claim_challenge(&wallet(), slug, at).unwrap();
        }
        slugs[slugs.len() - 1]
    }

    #[test]
    fn test_module_completion_levels_up() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);

        let result = manager.complete_module(&wallet(), "blockchain-basics").unwrap();
        assert!(result.outcome.is_claimed());
        let level = result.level.clone().unwrap();
        assert!(level.corrected);
        assert_eq!((level.old_level, level.new_level), (1, 2));

        let events = result.events();
        assert!(events.contains(&RewardEvent::XpAwarded {
            amount: 200,
            reason: "module blockchain-basics".into()
        }));
        assert!(events.iter().any(|e| matches!(e, RewardEvent::LevelChanged(_))));

        // Completing again pays nothing and syncs nothing
        let again = manager.complete_module(&wallet(), "blockchain-basics").unwrap();
        assert_eq!(again.outcome, ClaimOutcome::AlreadyClaimed);
        assert!(again.level.is_none());
        assert!(again.events().is_empty());
    }

    #[test]
    fn test_unknown_module() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            manager(&dir).complete_module(&wallet(), "astrology"),
            Err(QuestError::NotFound { .. })
        ));
    }

    #[test]
    fn test_open_unknown_box() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            manager(&dir).open_mystery_box(&wallet(), "missing"),
            Err(QuestError::NotFound { .. })
        ));
    }

    #[test]
    fn test_daily_set_grants_bonus_box_once() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        manager.login(&wallet(), at).unwrap();

        let today = manager.daily_challenges(&wallet(), at).unwrap();
        assert_eq!(today.len(), 3);
        assert!(today.iter().all(|c| !c.completed && !c.claimed));

        let slugs: Vec<_> = today.iter().map(|c| c.slug).collect();
        for slug in &slugs {
            assert!(manager.complete_challenge(&wallet(), slug, at).unwrap());
        }

        let first = manager.claim_challenge(&wallet(), slugs[0], at).unwrap();
        assert!(first.bonus_box.is_none());
        manager.claim_challenge(&wallet(), slugs[1], at).unwrap();
        let last = manager.claim_challenge(&wallet(), slugs[2], at).unwrap();
        let bonus = last.bonus_box.clone().unwrap();
        assert_eq!(bonus.tier, RewardTier::Common);
        assert_eq!(bonus.entity.id, "daily-bonus-2024-03-01");

        let repeat = manager.claim_challenge(&wallet(), slugs[2], at).unwrap();
        assert_eq!(repeat.outcome, ClaimOutcome::AlreadyClaimed);
        assert!(repeat.bonus_box.is_none());
        assert_eq!(manager.mystery_boxes(&wallet()).unwrap().len(), 1);

        let expected_xp: u64 = today.iter().map(|c| c.xp).sum();
        assert_eq!(manager.store.get(&wallet()).unwrap().total_xp, expected_xp);
    }

    #[test]
    fn test_challenge_from_another_day_is_not_found() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let slug = manager.daily_challenges(&wallet(), at).unwrap()[0].slug;

        let next_week = at + chrono::Duration::days(7);
        assert!(matches!(
            manager.claim_challenge(&wallet(), slug, next_week),
            Err(QuestError::NotFound { .. })
        ));
    }

    #[test]
    fn test_onboarding_flag() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        manager.mark_onboarding_seen(&wallet()).unwrap();
        manager.mark_onboarding_seen(&wallet()).unwrap();
        assert!(manager.store.get(&wallet()).unwrap().onboarding_seen);
    }

    #[test]
    fn test_failed_level_sync_does_not_fail_the_claim() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        exec(
            &dir,
            "CREATE TRIGGER block_level BEFORE UPDATE OF level ON user_progress
             BEGIN SELECT RAISE(ABORT, 'level write failed'); END;",
        );

        let result = manager.complete_module(&wallet(), "blockchain-basics").unwrap();
        assert!(result.outcome.is_claimed());
        assert!(result.level.is_none());
        let stored = manager.store.get(&wallet()).unwrap();
        assert_eq!((stored.total_xp, stored.level), (200, 1));

        // The next attempt pays nothing but repairs the level
        exec(&dir, "DROP TRIGGER block_level;");
        let again = manager.complete_module(&wallet(), "blockchain-basics").unwrap();
        assert_eq!(again.outcome, ClaimOutcome::AlreadyClaimed);
        let level = again.level.unwrap();
        assert_eq!((level.old_level, level.new_level), (1, 2));
        assert_eq!(manager.store.get(&wallet()).unwrap().total_xp, 200);
    }

    #[test]
    fn test_bonus_box_is_granted_on_a_repeated_claim() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        manager.login(&wallet(), at).unwrap();
        let last = finish_all_but_last(&manager, at);

        exec(
            &dir,
            "CREATE TRIGGER block_boxes BEFORE INSERT ON rewardables WHEN NEW.kind = 'mystery_box'
             BEGIN SELECT RAISE(ABORT, 'box write failed'); END;",
        );
        let result = manager.claim_challenge(&wallet(), last, at).unwrap();
        assert!(result.outcome.is_claimed());
        assert!(result.bonus_box.is_none());
        assert!(manager.mystery_boxes(&wallet()).unwrap().is_empty());

        exec(&dir, "DROP TRIGGER block_boxes;");
        let retry = manager.claim_challenge(&wallet(), last, at).unwrap();
        assert_eq!(retry.outcome, ClaimOutcome::AlreadyClaimed);
        assert_eq!(retry.bonus_box.unwrap().entity.id, "daily-bonus-2024-03-02");
        assert_eq!(manager.mystery_boxes(&wallet()).unwrap().len(), 1);
    }

    #[test]
    fn test_existing_bonus_box_is_not_reported_again() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        let at = Utc.with_ymd_and_hms(2024, 3, 3, 10, 0, 0).unwrap();
        manager.login(&wallet(), at).unwrap();
        let last = finish_all_but_last(&manager, at);

        // Another device finished the set first and got the box
        let earlier = manager
            .grant_box_with_id(&wallet(), RewardTier::Common, "daily-bonus-2024-03-03")
            .unwrap();
        assert!(earlier.is_some());

        let result = manager.claim_challenge(&wallet(), last, at).unwrap();
        assert!(result.outcome.is_claimed());
        assert!(result.bonus_box.is_none());
        assert_eq!(manager.mystery_boxes(&wallet()).unwrap().len(), 1);
    }

    #[test]
    fn test_challenge_can_be_completed_without_listing() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let slug = DailyChallenge::for_day(local_day(at, day_offset(0)))[0].slug;

        assert!(manager.complete_challenge(&wallet(), slug, at).unwrap());
        assert!(manager.claim_challenge(&wallet(), slug, at).unwrap().outcome.is_claimed());
        assert!(matches!(
            manager.complete_challenge(&wallet(), "not-a-challenge", at),
            Err(QuestError::NotFound { .. })
        ));
    }
}
