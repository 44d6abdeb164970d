//! Reward tiers and their roll parameters

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Reward rarity, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardTier {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// Roll parameters for one tier
#[derive(Debug, Clone)]
pub struct TierParams {
    pub tier: RewardTier,
    /// Token range in thousandths, half-open `[min, max)`
    pub token_milli: (u64, u64),
    /// XP range, half-open `[min, max)`
    pub xp: (u64, u64),
    /// Probability of an additional special item
    pub special_chance: f64,
    pub special_items: &'static [&'static str],
}

/// All tier definitions (sorted by rank)
pub static TIERS: &[TierParams] = &[
    TierParams {
        tier: RewardTier::Common,
        token_milli: (10, 14),
        xp: (70, 150),
        special_chance: 0.03,
        special_items: &["Bronze Badge"],
    },
    TierParams {
        tier: RewardTier::Rare,
        token_milli: (14, 20),
        xp: (150, 260),
        special_chance: 0.10,
        special_items: &["Silver Key", "Rare Sticker Pack"],
    },
    TierParams {
        tier: RewardTier::Epic,
        token_milli: (20, 32),
        xp: (260, 420),
        special_chance: 0.25,
        special_items: &["Golden Compass", "Epic Avatar Frame"],
    },
    TierParams {
        tier: RewardTier::Legendary,
        token_milli: (32, 50),
        xp: (420, 700),
        special_chance: 0.50,
        special_items: &["Genesis Shard", "Diamond Hands Trophy"],
    },
];

impl RewardTier {
    pub const ALL: [RewardTier; 4] = [Self::Common, Self::Rare, Self::Epic, Self::Legendary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "common" => Some(Self::Common),
            "rare" => Some(Self::Rare),
            "epic" => Some(Self::Epic),
            "legendary" => Some(Self::Legendary),
            _ => None,
        }
    }

    /// Parse a tier, falling back to the lowest tier for anything unknown
    pub fn parse_or_lowest(s: &str) -> Self {
        Self::from_str(s).unwrap_or_else(|| {
            warn!(tier = s, "unknown reward tier, using common");
            Self::Common
        })
    }

    pub fn params(&self) -> &'static TierParams {
        TIERS
            .iter()
            .find(|p| p.tier == *self)
            .unwrap_or(&TIERS[0])
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Rare => "Rare",
            Self::Epic => "Epic",
            Self::Legendary => "Legendary",
        }
    }

    /// Bonus box tier for finishing all daily challenges, by login streak
    pub fn for_streak(streak_days: u32) -> Self {
        match streak_days {
            14.. => Self::Legendary,
            7..=13 => Self::Epic,
            3..=6 => Self::Rare,
            _ => Self::Common,
        }
    }
}

impl std::fmt::Display for RewardTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parsing_falls_back() {
        assert_eq!(RewardTier::parse_or_lowest("EPIC"), RewardTier::Epic);
        assert_eq!(RewardTier::parse_or_lowest("mythic"), RewardTier::Common);
        assert_eq!(RewardTier::parse_or_lowest(""), RewardTier::Common);
    }

    #[test]
    fn test_special_chance_increases_with_rank() {
        for pair in TIERS.windows(2) {
            assert!(pair[0].tier < pair[1].tier);
            assert!(pair[0].special_chance < pair[1].special_chance);
            assert!(pair[0].xp.1 <= pair[1].xp.1);
        }
        for params in TIERS {
            assert!(params.token_milli.0 < params.token_milli.1);
            assert!(params.xp.0 < params.xp.1);
            assert!(!params.special_items.is_empty());
        }
    }

    #[test]
    fn test_streak_tiers() {
        assert_eq!(RewardTier::for_streak(0), RewardTier::Common);
        assert_eq!(RewardTier::for_streak(3), RewardTier::Rare);
        assert_eq!(RewardTier::for_streak(7), RewardTier::Epic);
        assert_eq!(RewardTier::for_streak(30), RewardTier::Legendary);
    }
}
