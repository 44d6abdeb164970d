//! Paid completion NFT mints against a simulated wallet

mod common;

use chainquest::QuestError;
use chainquest::progress::TokenAmount;
use chainquest::rewards::{ClaimState, EntityKind, EntityRef, MintOutcome};
use chainquest::wallet::{SimulatedFailure, SimulatedWallet, WalletError};

use common::{TestApp, wallet};

fn ready(test: &TestApp, n: u8, balance_milli: u64) -> SimulatedWallet {
    let owner = wallet(n);
    test.app
        .rewards()
        .complete_module(&owner, "blockchain-basics")
        .unwrap();
    SimulatedWallet::new(owner, TokenAmount::from_milli(balance_milli))
}

fn mint_entity(n: u8) -> EntityRef {
    EntityRef::new(wallet(n), EntityKind::NftMint, "blockchain-basics")
}

#[tokio::test]
async fn test_low_balance_reserves_nothing() {
    let test = TestApp::new();
    let simulated = ready(&test, 10, 5);

    let err = test
        .app
        .minter()
        .mint(&simulated, "blockchain-basics")
        .await
        .unwrap_err();
    match err {
        QuestError::InsufficientBalance {
            required,
            available,
        } => {
            assert_eq!(required, TokenAmount::from_milli(10));
            assert_eq!(available, TokenAmount::from_milli(5));
        }
        other => panic!("unexpected error: {other}"),
    }

    let entity = test.app.claims().get(&mint_entity(10)).unwrap();
    assert_eq!(entity.state, ClaimState::Unclaimed);
    assert_eq!(simulated.submitted(), 0);
}

#[tokio::test]
async fn test_rejection_releases_and_allows_retry() {
    let test = TestApp::new();
    let simulated = ready(&test, 11, 250);
    simulated.fail_next_payment(SimulatedFailure::Reject("user declined".into()));
    let minter = test.app.minter();

    let err = minter.mint(&simulated, "blockchain-basics").await.unwrap_err();
    assert!(matches!(err, QuestError::Wallet(WalletError::Rejected(_))));
    assert!(err.is_retryable());
    assert_eq!(
        test.app.claims().get(&mint_entity(11)).unwrap().state,
        ClaimState::Unclaimed
    );
    let xp_before = test.app.store().get(&wallet(11)).unwrap().total_xp;

    let outcome = minter.mint(&simulated, "blockchain-basics").await.unwrap();
    let MintOutcome::Minted { receipt, .. } = outcome else {
        panic!("expected a mint, got {outcome:?}");
    };
    assert!(receipt.tx_signature.is_some());
    assert_eq!(
        test.app.store().get(&wallet(11)).unwrap().total_xp,
        xp_before + receipt.bundle.xp
    );
}

#[tokio::test]
async fn test_mint_succeeds_once() {
    let test = TestApp::new();
    let simulated = ready(&test, 12, 250);
    let minter = test.app.minter();

    let first = minter.mint(&simulated, "blockchain-basics").await.unwrap();
    assert!(matches!(first, MintOutcome::Minted { .. }));

    let second = minter.mint(&simulated, "blockchain-basics").await.unwrap();
    assert!(matches!(second, MintOutcome::AlreadyMinted));

    assert_eq!(simulated.submitted(), 1);
    assert_eq!(simulated.balance_of(&wallet(12)), TokenAmount::from_milli(240));
    assert_eq!(test.app.claims().payout_count(&mint_entity(12)).unwrap(), 1);
}

#[tokio::test]
async fn test_mint_before_module_is_not_found() {
    let test = TestApp::new();
    let simulated = SimulatedWallet::new(wallet(13), TokenAmount::from_milli(250));

    let err = test.app.minter().mint(&simulated, "defi-101").await.unwrap_err();
    assert!(matches!(err, QuestError::NotFound { .. }));
}

#[tokio::test]
async fn test_disconnected_wallet() {
    let test = TestApp::new();
    let err = test
        .app
        .minter()
        .mint(&SimulatedWallet::disconnected(), "blockchain-basics")
        .await
        .unwrap_err();
    assert!(matches!(err, QuestError::Wallet(WalletError::NotConnected)));
}
