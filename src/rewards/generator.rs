//! Randomized reward bundles
//!
//! Rolls are cosmetic and economic, not security tokens, so the thread-local
//! PRNG is used.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use super::tiers::RewardTier;
use crate::progress::TokenAmount;

/// Tokens, XP and an optional special item paid out by one claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardBundle {
    pub tokens: TokenAmount,
    pub xp: u64,
    pub special_item: Option<String>,
}

impl RewardBundle {
    pub fn fixed(xp: u64, tokens: TokenAmount, special_item: Option<String>) -> Self {
        Self {
            tokens,
            xp,
            special_item,
        }
    }
}

/// Maps a tier to a freshly rolled bundle
#[derive(Debug, Clone, Copy, Default)]
pub struct RewardGenerator;

impl RewardGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, tier: RewardTier) -> RewardBundle {
        self.generate_with(tier, &mut rand::thread_rng())
    }

    /// Roll a bundle from the given RNG
    pub fn generate_with<R: Rng + ?Sized>(&self, tier: RewardTier, rng: &mut R) -> RewardBundle {
        let params = tier.params();
        let (min_milli, max_milli) = params.token_milli;

        // Uniform over the 3-decimal values in [min, max)
        let milli = rng.gen_range(min_milli..max_milli);

        let xp = rng.gen_range(params.xp.0..params.xp.1);

        let special_item = if rng.gen_bool(params.special_chance) {
            params.special_items.choose(rng).map(|item| item.to_string())
        } else {
            None
        };

        RewardBundle {
            tokens: TokenAmount::from_milli(milli),
            xp,
            special_item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_draws_stay_in_tier_ranges() {
        let generator = RewardGenerator::new();
        let mut rng = StdRng::seed_from_u64(7);

        for tier in RewardTier::ALL {
            let params = tier.params();
            for _ in 0..10_000 {
                let bundle = generator.generate_with(tier, &mut rng);
                let milli = bundle.tokens.milli();
                assert!(
                    (params.token_milli.0..params.token_milli.1).contains(&milli),
                    "{tier}: {milli} outside token range"
                );
                assert!(
                    (params.xp.0..params.xp.1).contains(&bundle.xp),
                    "{tier}: {} outside xp range",
                    bundle.xp
                );
                if let Some(item) = &bundle.special_item {
                    assert!(params.special_items.contains(&item.as_str()));
                }
            }
        }
    }

    #[test]
    fn test_common_box_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let bundle = RewardGenerator::new().generate_with(RewardTier::Common, &mut rng);
            let tokens = bundle.tokens.as_f64();
            assert!((0.010..0.014).contains(&tokens), "{tokens}");
            assert!((70..150).contains(&bundle.xp));
        }
    }

    #[test]
    fn test_token_values_are_equally_likely() {
        let generator = RewardGenerator::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut counts = [0u32; 4];
        for _ in 0..40_000 {
            let milli = generator.generate_with(RewardTier::Common, &mut rng).tokens.milli();
            counts[(milli - 10) as usize] += 1;
        }
        // 10_000 expected per value
        for count in counts {
            assert!((9_000..11_000).contains(&count), "{counts:?}");
        }
    }

    #[test]
    fn test_legendary_grants_items_more_often() {
        let generator = RewardGenerator::new();
        let mut rng = StdRng::seed_from_u64(99);
        let count = |tier, rng: &mut StdRng| {
            (0..5_000)
                .filter(|_| generator.generate_with(tier, rng).special_item.is_some())
                .count()
        };
        let common = count(RewardTier::Common, &mut rng);
        let legendary = count(RewardTier::Legendary, &mut rng);
        assert!(legendary > common * 4, "common={common} legendary={legendary}");
    }

    #[test]
    fn test_thread_rng_entry_point() {
        let bundle = RewardGenerator::new().generate(RewardTier::Rare);
        assert!((14..20).contains(&bundle.tokens.milli()));
    }
}
