//! Rewards: tiers, rolled bundles, the claim guard and the flows built on it
//!
//! ```text
//!   complete module / challenge / open box / mint
//!                      │
//!                      ▼
//!               ClaimGuard (one tx)
//!        state transition + progress + ledger
//!                      │
//!                      ▼
//!             LevelSynchronizer
//! ```

mod catalog;
mod claims;
mod entities;
mod generator;
mod manager;
mod mint;
mod tiers;

pub use catalog::{CHALLENGES_PER_DAY, DAILY_CHALLENGES, DailyChallenge, LearningModule, MODULES, NFT_MINT_XP};
pub use claims::ClaimGuard;
pub use entities::{
    ClaimOutcome, ClaimReceipt, ClaimState, EntityKind, EntityRef, NewRewardable, Reservation,
    RewardSpec, RewardableEntity,
};
pub use generator::{RewardBundle, RewardGenerator};
pub use manager::{ClaimResult, DailyChallengeView, GrantedBox, RewardEvent, RewardManager};
pub use mint::{LEASE_MARGIN, MintOutcome, MintSettings, NftMinter};
pub use tiers::{RewardTier, TIERS, TierParams};
