//! Learning modules and daily challenge definitions
//!
//! Static content that seeds rewardable entities. Daily challenges rotate
//! through the pool by day ordinal, three per day.

use chrono::{Datelike, NaiveDate};

use crate::progress::TokenAmount;

/// A learning module and its completion reward
#[derive(Debug, Clone)]
pub struct LearningModule {
    pub id: &'static str,
    pub title: &'static str,
    pub xp: u64,
    pub tokens: TokenAmount,
}

/// All learning modules in curriculum order
pub static MODULES: &[LearningModule] = &[
    LearningModule {
        id: "blockchain-basics",
        title: "Blockchain Basics",
        xp: 200,
        tokens: TokenAmount::from_milli(5),
    },
    LearningModule {
        id: "wallets-and-keys",
        title: "Wallets & Keys",
        xp: 250,
        tokens: TokenAmount::from_milli(5),
    },
    LearningModule {
        id: "smart-contracts",
        title: "Smart Contracts",
        xp: 300,
        tokens: TokenAmount::from_milli(8),
    },
    LearningModule {
        id: "defi-101",
        title: "DeFi 101",
        xp: 350,
        tokens: TokenAmount::from_milli(10),
    },
    LearningModule {
        id: "nfts-and-ownership",
        title: "NFTs & Digital Ownership",
        xp: 300,
        tokens: TokenAmount::from_milli(8),
    },
];

/// XP bonus paid when a module's completion NFT is minted
pub const NFT_MINT_XP: u64 = 50;

impl LearningModule {
    pub fn get(id: &str) -> Option<&'static LearningModule> {
        MODULES.iter().find(|m| m.id == id)
    }
}

/// A daily challenge template
#[derive(Debug, Clone)]
pub struct DailyChallenge {
    pub slug: &'static str,
    pub title: &'static str,
    pub xp: u64,
    pub tokens: TokenAmount,
}

pub static DAILY_CHALLENGES: &[DailyChallenge] = &[
    DailyChallenge {
        slug: "quiz-streak",
        title: "Answer 3 quiz questions in a row",
        xp: 30,
        tokens: TokenAmount::from_milli(2),
    },
    DailyChallenge {
        slug: "read-lesson",
        title: "Read one lesson to the end",
        xp: 15,
        tokens: TokenAmount::from_milli(1),
    },
    DailyChallenge {
        slug: "block-builder",
        title: "Win a round of Block Builder",
        xp: 40,
        tokens: TokenAmount::from_milli(3),
    },
    DailyChallenge {
        slug: "gas-guesser",
        title: "Guess a gas fee within 10%",
        xp: 35,
        tokens: TokenAmount::from_milli(2),
    },
    DailyChallenge {
        slug: "hash-match",
        title: "Match 5 hashes in Hash Match",
        xp: 25,
        tokens: TokenAmount::from_milli(2),
    },
];

pub const CHALLENGES_PER_DAY: usize = 3;

impl DailyChallenge {
    pub fn get(slug: &str) -> Option<&'static DailyChallenge> {
        DAILY_CHALLENGES.iter().find(|c| c.slug == slug)
    }

    /// The challenges offered on a given day
    pub fn for_day(day: NaiveDate) -> Vec<&'static DailyChallenge> {
        let start = day.num_days_from_ce().rem_euclid(DAILY_CHALLENGES.len() as i32) as usize;
        (0..CHALLENGES_PER_DAY)
            .map(|i| &DAILY_CHALLENGES[(start + i) % DAILY_CHALLENGES.len()])
            .collect()
    }

    /// Entity id of this challenge on a given day (`2024-03-01:quiz-streak`)
    pub fn entity_id(&self, day_bucket: &str) -> String {
        format!("{day_bucket}:{}", self.slug)
    }
}
