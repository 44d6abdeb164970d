//! Mint command implementation

use anyhow::Result;

use chainquest::ChainQuest;
use chainquest::progress::TokenAmount;
use chainquest::rewards::{MintOutcome, RewardEvent};
use chainquest::wallet::SimulatedWallet;

use super::{parse_wallet, print_events};

/// Mint a module's completion NFT, paying from a simulated wallet
pub async fn mint_command(
    app: &ChainQuest,
    wallet: &str,
    module_id: &str,
    balance: Option<f64>,
) -> Result<()> {
    let address = parse_wallet(wallet)?;
    let minter = app.minter();
    let balance = balance
        .map(TokenAmount::from_decimal)
        .unwrap_or(app.config().wallet.simulated_balance);
    let wallet = SimulatedWallet::new(address, balance);

    println!(
        "Minting completion NFT for '{module_id}' (fee {}, wallet holds {balance})...",
        minter.settings().fee
    );

    match minter.mint(&wallet, module_id).await? {
        MintOutcome::Minted { receipt, level } => {
            println!(
                "Minted! Transaction: {}",
                receipt.tx_signature.as_deref().unwrap_or("-")
            );
            let mut events = vec![RewardEvent::XpAwarded {
                amount: receipt.bundle.xp,
                reason: format!("NFT {module_id}"),
            }];
            if let Some(level) = level.filter(|l| l.corrected) {
                events.push(RewardEvent::LevelChanged(level));
            }
            print_events(&events);
        }
        MintOutcome::AlreadyMinted => println!("This NFT is already minted."),
        MintOutcome::InFlight => {
            println!("A mint for this module is still pending. Try again in a few minutes.")
        }
    }
    Ok(())
}
