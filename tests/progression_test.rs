//! End-to-end progression flows through the public API

mod common;

use chrono::{Duration, TimeZone, Utc};

use chainquest::QuestError;
use chainquest::progress::ProgressDelta;
use chainquest::rewards::{ClaimOutcome, RewardEvent, RewardTier};
use chainquest::session::{PopupDecision, PopupKind, Session, ShowReason, SuppressReason};

use common::{TestApp, wallet};

#[test]
fn test_first_module_levels_up() {
    let test = TestApp::new();
    let owner = wallet(3);
    let rewards = test.app.rewards();
    rewards.login(&owner, Utc::now()).unwrap();
    assert_eq!(test.app.store().get(&owner).unwrap().total_xp, 0);

    let result = rewards.complete_module(&owner, "blockchain-basics").unwrap();
    let level = result.level.clone().unwrap();
    assert_eq!((level.old_level, level.new_level), (1, 2));
    assert!(level.tier_changed());
    assert!(result.events().contains(&RewardEvent::LevelChanged(level)));

    let progress = test.app.store().get(&owner).unwrap();
    assert_eq!(progress.total_xp, 200);
    assert_eq!(progress.level, 2);
}

#[test]
fn test_common_box_opens_once() {
    let test = TestApp::new();
    let owner = wallet(4);
    let rewards = test.app.rewards();
    let granted = rewards.grant_mystery_box(&owner, RewardTier::Common, "test").unwrap();

    let first = rewards.open_mystery_box(&owner, &granted.entity.id).unwrap();
    let bundle = first.outcome.receipt().unwrap().bundle.clone();
    assert!((0.010..0.014).contains(&bundle.tokens.as_f64()));
    assert!((70..150).contains(&bundle.xp));

    let before = test.app.store().get(&owner).unwrap();
    let second = rewards.open_mystery_box(&owner, &granted.entity.id).unwrap();
    assert_eq!(second.outcome, ClaimOutcome::AlreadyClaimed);
    assert!(second.events().is_empty());

    let after = test.app.store().get(&owner).unwrap();
    assert_eq!(after.total_xp, before.total_xp);
    assert_eq!(after.tokens, before.tokens);
    if let Some(item) = bundle.special_item {
        let inventory = test.app.store().inventory(&owner).unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].item, item);
    }
}

#[test]
fn test_streak_bonus_box_tier() {
    let test = TestApp::new();
    let owner = wallet(5);
    let rewards = test.app.rewards();
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

    for day in 0..7 {
        rewards.login(&owner, start + Duration::days(day)).unwrap();
    }
    let day7 = start + Duration::days(6);
    assert_eq!(test.app.store().get(&owner).unwrap().streak, 7);

    let slugs: Vec<_> = rewards
        .daily_challenges(&owner, day7)
        .unwrap()
        .iter()
        .map(|c| c.slug)
        .collect();
    let mut last = None;
    for slug in &slugs {
        rewards.complete_challenge(&owner, slug, day7).unwrap();
        last = Some(rewards.claim_challenge(&owner, slug, day7).unwrap());
    }

    let bonus = last.unwrap().bonus_box.unwrap();
    assert_eq!(bonus.tier, RewardTier::Epic);
    let opened = rewards.open_mystery_box(&owner, &bonus.entity.id).unwrap();
    assert!(opened.outcome.is_claimed());
}

#[test]
fn test_claim_errors_leave_no_trace() {
    let test = TestApp::new();
    let owner = wallet(6);
    let rewards = test.app.rewards();
    let now = Utc::now();
    let slug = rewards.daily_challenges(&owner, now).unwrap()[0].slug;

    assert!(matches!(
        rewards.claim_challenge(&owner, slug, now),
        Err(QuestError::NotCompleted(_))
    ));
    assert!(matches!(
        rewards.open_mystery_box(&owner, "no-such-box"),
        Err(QuestError::NotFound { .. })
    ));
    assert!(test.app.store().find(&owner).unwrap().is_none());
}

#[test]
fn test_sync_repairs_drifted_level() {
    let test = TestApp::new();
    let owner = wallet(7);
    // XP credited without a sync, e.g. by an older client
    test.app
        .store()
        .apply_delta(&owner, &ProgressDelta::xp(1_200))
        .unwrap();
    assert_eq!(test.app.store().get(&owner).unwrap().level, 1);

    let levels = test.app.levels();
    let first = levels.synchronize(&owner).unwrap();
    assert!(first.corrected);
    assert_eq!(first.new_level, 4);
    assert_eq!(first.title, "Builder");

    let updated_at = test.app.store().get(&owner).unwrap().updated_at;
    let second = levels.synchronize(&owner).unwrap();
    assert!(!second.corrected);
    assert_eq!(second.new_level, 4);
    assert_eq!(test.app.store().get(&owner).unwrap().updated_at, updated_at);
}

#[test]
fn test_daily_popup_across_sessions() {
    let test = TestApp::new();
    let owner = wallet(8);
    let throttle = test.app.throttle();
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();

    let mut session = Session::begin(owner.clone(), t, true);
    assert_eq!(
        throttle.maybe_show(&mut session, PopupKind::DailyStreak, t).unwrap(),
        PopupDecision::Show(ShowReason::FreshLogin)
    );
    session.end();

    // Same evening in a new tab
    let evening = Session::begin(owner.clone(), t + Duration::hours(5), false);
    assert_eq!(
        throttle.check(&evening, PopupKind::DailyStreak, t + Duration::hours(5)).unwrap(),
        PopupDecision::Suppress(SuppressReason::ShownToday)
    );

    // Past midnight and outside the gap
    let mut night = Session::begin(owner.clone(), t + Duration::hours(7), false);
    assert_eq!(
        throttle.maybe_show(&mut night, PopupKind::DailyStreak, t + Duration::hours(7)).unwrap(),
        PopupDecision::Show(ShowReason::Due)
    );
    assert_eq!(
        throttle.check(&night, PopupKind::DailyStreak, t + Duration::hours(8)).unwrap(),
        PopupDecision::Suppress(SuppressReason::ShownToday)
    );

    // A full day later it shows even in the session that already showed it
    assert_eq!(
        throttle.check(&night, PopupKind::DailyStreak, t + Duration::hours(31)).unwrap(),
        PopupDecision::Show(ShowReason::ResetElapsed)
    );
}
