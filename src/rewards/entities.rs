//! Reward-bearing entities and claim states

use std::fmt;

use serde::Serialize;

use super::generator::RewardBundle;
use super::tiers::RewardTier;
use crate::progress::{TokenAmount, WalletAddress};

/// What kind of thing pays out a reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A finished learning module
    Module,
    /// A daily challenge
    Challenge,
    /// A mystery box, rolled when opened
    MysteryBox,
    /// The paid completion NFT for a module
    NftMint,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Challenge => "challenge",
            Self::MysteryBox => "mystery_box",
            Self::NftMint => "nft_mint",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "module" => Some(Self::Module),
            "challenge" => Some(Self::Challenge),
            "mystery_box" => Some(Self::MysteryBox),
            "nft_mint" => Some(Self::NftMint),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Challenge => "challenge",
            Self::MysteryBox => "mystery box",
            Self::NftMint => "completion NFT",
        }
    }
}

/// Identifies one rewardable entity owned by one wallet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityRef {
    pub wallet: WalletAddress,
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(wallet: WalletAddress, kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            wallet,
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' of {}", self.kind.label(), self.id, self.wallet.short())
    }
}

/// How the payout of an entity is determined
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardSpec {
    /// Known amounts, e.g. module and challenge rewards
    Fixed(RewardBundle),
    /// Rolled by the generator at claim time
    Rolled(RewardTier),
}

/// Payout state of an entity
///
/// `Unclaimed -> Claimed` for free claims,
/// `Unclaimed -> InFlight -> Claimed` (or back to `Unclaimed`) for paid ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    Unclaimed,
    InFlight,
    Claimed,
}

impl ClaimState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclaimed => "unclaimed",
            Self::InFlight => "in_flight",
            Self::Claimed => "claimed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unclaimed" => Some(Self::Unclaimed),
            "in_flight" => Some(Self::InFlight),
            "claimed" => Some(Self::Claimed),
            _ => None,
        }
    }
}

/// Entity as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardableEntity {
    pub entity: EntityRef,
    pub completed: bool,
    pub state: ClaimState,
    pub reward: RewardSpec,
    pub created_at: i64,
    pub reserved_at: Option<i64>,
    pub claimed_at: Option<i64>,
}

impl RewardableEntity {
    pub fn is_claimed(&self) -> bool {
        self.state == ClaimState::Claimed
    }
}

/// An entity to register
#[derive(Debug, Clone)]
pub struct NewRewardable {
    pub entity: EntityRef,
    pub completed: bool,
    pub reward: RewardSpec,
}

impl NewRewardable {
    pub fn fixed(entity: EntityRef, xp: u64, tokens: TokenAmount) -> Self {
        Self {
            entity,
            completed: false,
            reward: RewardSpec::Fixed(RewardBundle::fixed(xp, tokens, None)),
        }
    }

    pub fn rolled(entity: EntityRef, tier: RewardTier) -> Self {
        Self {
            entity,
            completed: false,
            reward: RewardSpec::Rolled(tier),
        }
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }
}

/// A committed payout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    pub entity: EntityRef,
    pub bundle: RewardBundle,
    pub claimed_at: i64,
    pub tx_signature: Option<String>,
}

/// Result of a claim attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// This call performed the transition and paid out
    Claimed(ClaimReceipt),
    /// Someone already claimed it; nothing was paid
    AlreadyClaimed,
    /// A paid claim for this entity is in progress
    InFlight,
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }

    pub fn receipt(&self) -> Option<&ClaimReceipt> {
        match self {
            Self::Claimed(receipt) => Some(receipt),
            _ => None,
        }
    }
}

/// Result of reserving a paid claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// This caller holds the lease and must finalize or release it
    Reserved,
    AlreadyClaimed,
    InFlight,
}
