//! Reward and progression commands

use anyhow::{Result, bail};
use chrono::Utc;

use chainquest::ChainQuest;
use chainquest::progress::LevelProgress;
use chainquest::rewards::{EntityKind, EntityRef, MODULES, RewardEvent, RewardTier};
use chainquest::session::{PopupKind, Session};

use super::{parse_wallet, print_claim, print_events};

/// Connect a wallet: records the login and runs the daily popups
pub fn login_command(app: &ChainQuest, wallet: &str) -> Result<()> {
    let wallet = parse_wallet(wallet)?;
    let now = Utc::now();
    let login = app.rewards().login(&wallet, now)?;

    if login.created {
        println!("Welcome to ChainQuest, {}!", wallet.short());
    }
    println!(
        "Streak: {} day(s) (best {}){}",
        login.streak,
        login.best_streak,
        if login.streak_extended { " - extended!" } else { "" }
    );

    let throttle = app.throttle();
    let mut session = Session::begin(wallet.clone(), now, login.first_today);

    for kind in [PopupKind::DailyStreak, PopupKind::DailyChallenges] {
        if throttle.maybe_show(&mut session, kind, now)?.is_show() {
            match kind {
                PopupKind::DailyStreak => println!("Day {} streak! Come back tomorrow.", login.streak),
                PopupKind::DailyChallenges => {
                    println!("Today's challenges:");
                    for challenge in app.rewards().daily_challenges(&wallet, now)? {
                        println!("  [{}] {} (+{} XP)", challenge.slug, challenge.title, challenge.xp);
                    }
                }
            }
        }
    }

    let progress = app.store().get(&wallet)?;
    if !progress.onboarding_seen {
        println!("Tip: finish a module with `chainquest module <wallet> blockchain-basics`.");
        app.rewards().mark_onboarding_seen(&wallet)?;
    }

    session.end();
    Ok(())
}

/// List learning modules, with completion marks when a wallet is given
pub fn modules_command(app: &ChainQuest, wallet: Option<&str>) -> Result<()> {
    let wallet = wallet.map(parse_wallet).transpose()?;
    let claims = app.claims();

    println!("Learning modules:\n");
    for module in MODULES {
        let done = match &wallet {
            Some(wallet) => claims
                .find(&EntityRef::new(wallet.clone(), EntityKind::Module, module.id))?
                .is_some_and(|e| e.is_claimed()),
            None => false,
        };
        println!(
            "  {} {:<20} {:<26} +{} XP, +{} tokens",
            if done { "✓" } else { " " },
            module.id,
            module.title,
            module.xp,
            module.tokens
        );
    }
    Ok(())
}

pub fn module_command(app: &ChainQuest, wallet: &str, module_id: &str) -> Result<()> {
    let wallet = parse_wallet(wallet)?;
    let result = app.rewards().complete_module(&wallet, module_id)?;
    print_claim(&result);
    if result.outcome.is_claimed() {
        println!("Completion NFT unlocked: `chainquest mint <wallet> {module_id}`");
    }
    Ok(())
}

pub fn challenges_command(app: &ChainQuest, wallet: &str) -> Result<()> {
    let wallet = parse_wallet(wallet)?;
    let challenges = app.rewards().daily_challenges(&wallet, Utc::now())?;

    println!("Today's challenges:\n");
    for challenge in challenges {
        let mark = match (challenge.completed, challenge.claimed) {
            (_, true) => "claimed",
            (true, false) => "done",
            (false, false) => "open",
        };
        println!(
            "  [{:<7}] {:<14} {} (+{} XP, +{} tokens)",
            mark, challenge.slug, challenge.title, challenge.xp, challenge.tokens
        );
    }
    Ok(())
}

/// Mark a daily challenge done, and optionally claim it
pub fn challenge_command(app: &ChainQuest, wallet: &str, slug: &str, claim: bool) -> Result<()> {
    let wallet = parse_wallet(wallet)?;
    let now = Utc::now();
    let rewards = app.rewards();

    // Assigns today's set if this is the first look
    let today = rewards.daily_challenges(&wallet, now)?;
    if !today.iter().any(|c| c.slug == slug) {
        let offered: Vec<_> = today.iter().map(|c| c.slug).collect();
        bail!("'{slug}' is not one of today's challenges ({})", offered.join(", "));
    }

    if rewards.complete_challenge(&wallet, slug, now)? {
        println!("Challenge '{slug}' completed.");
    }
    if claim {
        print_claim(&rewards.claim_challenge(&wallet, slug, now)?);
    }
    Ok(())
}

pub fn grant_box_command(app: &ChainQuest, wallet: &str, tier: &str) -> Result<()> {
    let wallet = parse_wallet(wallet)?;
    let Some(tier) = RewardTier::from_str(tier) else {
        bail!("Unknown tier '{tier}' (common, rare, epic, legendary)");
    };
    let granted = app.rewards().grant_mystery_box(&wallet, tier, "cli")?;
    println!("Granted {} mystery box: {}", tier.label(), granted.entity.id);
    Ok(())
}

/// Open a mystery box by id, or list unopened boxes when no id is given
pub fn open_box_command(app: &ChainQuest, wallet: &str, box_id: Option<&str>) -> Result<()> {
    let wallet = parse_wallet(wallet)?;
    let rewards = app.rewards();

    let Some(box_id) = box_id else {
        let unopened: Vec<_> = rewards
            .mystery_boxes(&wallet)?
            .into_iter()
            .filter(|b| !b.is_claimed())
            .collect();
        if unopened.is_empty() {
            println!("No unopened mystery boxes.");
        }
        for b in unopened {
            println!("  {}", b.entity.id);
        }
        return Ok(());
    };

    print_claim(&rewards.open_mystery_box(&wallet, box_id)?);
    Ok(())
}

/// Recompute the stored level from XP
pub fn sync_command(app: &ChainQuest, wallet: &str) -> Result<()> {
    let wallet = parse_wallet(wallet)?;
    let sync = app.levels().synchronize(&wallet)?;
    if sync.corrected {
        print_events(&[RewardEvent::LevelChanged(sync.clone())]);
    } else {
        println!("Level {} ({}) is up to date.", sync.new_level, sync.title);
    }

    let progress = LevelProgress::new(app.store().get(&wallet)?.total_xp);
    if !progress.is_max_level() {
        println!("{:.0}% of the way to the next level.", progress.progress_to_next() * 100.0);
    }
    Ok(())
}
