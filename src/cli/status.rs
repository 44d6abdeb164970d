//! Status command implementation

use anyhow::Result;
use serde_json::json;

use chainquest::ChainQuest;
use chainquest::progress::LevelProgress;
use chainquest::rewards::EntityKind;

use super::parse_wallet;

/// Print a wallet's progress as JSON
pub fn status_command(app: &ChainQuest, wallet: &str) -> Result<()> {
    let wallet = parse_wallet(wallet)?;
    let store = app.store();

    let Some(progress) = store.find(&wallet)? else {
        println!("No progress yet for {}. Run `chainquest login {}` first.", wallet.short(), wallet);
        return Ok(());
    };

    let claims = app.claims();
    let completed_modules: Vec<_> = claims
        .list(&wallet, EntityKind::Module)?
        .into_iter()
        .filter(|m| m.is_claimed())
        .map(|m| m.entity.id)
        .collect();
    let minted: Vec<_> = claims
        .list(&wallet, EntityKind::NftMint)?
        .into_iter()
        .filter(|m| m.is_claimed())
        .map(|m| m.entity.id)
        .collect();
    let unopened_boxes = claims
        .list(&wallet, EntityKind::MysteryBox)?
        .iter()
        .filter(|b| !b.is_claimed())
        .count();

    let status = json!({
        "progress": progress,
        "level": LevelProgress::new(progress.total_xp),
        "inventory": store.inventory(&wallet)?,
        "completed_modules": completed_modules,
        "minted_nfts": minted,
        "unopened_boxes": unopened_boxes,
    });

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
