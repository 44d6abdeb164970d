//! ChainQuest - progression and rewards for a blockchain learning app
//!
//! Tracks per-wallet XP, tokens, streaks and levels, and pays out rewards for
//! finished modules, daily challenges, mystery boxes and completion NFT mints.
//! Every payout is guarded so it happens exactly once, even when several
//! tabs or devices race on the same reward.
//!
//! ## Components
//!
//! 1. **Progress store** (`progress`): per-wallet records, streaks, inventory
//!    and the level synchronizer.
//! 2. **Rewards** (`rewards`): tiers, rolled bundles, the claim guard and the
//!    flows built on it.
//! 3. **Session** (`session`): per-connection context and the daily popup
//!    throttle.
//! 4. **Wallet** (`wallet`): the async wallet boundary.

pub mod app;
pub mod config;
pub mod error;
pub mod progress;
pub mod rewards;
pub mod session;
pub mod wallet;

pub use app::ChainQuest;
pub use error::{QuestError, Result};
