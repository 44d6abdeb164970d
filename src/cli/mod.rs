//! CLI command implementations

pub mod init;
pub mod mint;
pub mod rewards;
pub mod status;

use anyhow::{Context, Result};

use chainquest::progress::WalletAddress;
use chainquest::rewards::{ClaimOutcome, ClaimResult, RewardEvent};

pub fn parse_wallet(raw: &str) -> Result<WalletAddress> {
    WalletAddress::parse(raw).with_context(|| format!("Invalid wallet address: {raw}"))
}

/// Print a claim's outcome and what it earned
pub fn print_claim(result: &ClaimResult) {
    match &result.outcome {
        ClaimOutcome::Claimed(receipt) => println!("Claimed {}", receipt.entity),
        ClaimOutcome::AlreadyClaimed => println!("Already claimed - nothing new to collect."),
        ClaimOutcome::InFlight => println!("A claim for this is still in progress."),
    }
    print_events(&result.events());
}

pub fn print_events(events: &[RewardEvent]) {
    for event in events {
        match event {
            RewardEvent::XpAwarded { amount, reason } => println!("  +{amount} XP ({reason})"),
            RewardEvent::TokensCredited { amount } => println!("  +{amount} tokens"),
            RewardEvent::ItemFound { item } => println!("  Found: {item}"),
            RewardEvent::LevelChanged(sync) if sync.leveled_up() => {
                println!("  Level up! {} -> {} ({})", sync.old_level, sync.new_level, sync.title)
            }
            RewardEvent::LevelChanged(sync) => {
                println!("  Level corrected: {} -> {}", sync.old_level, sync.new_level)
            }
            RewardEvent::BoxGranted { box_id, tier } => {
                println!("  Bonus {} mystery box: {box_id}", tier.label())
            }
        }
    }
}
