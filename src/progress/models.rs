//! Data models for per-wallet progress
//!
//! These structures represent the data stored in and read from the progress store.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::QuestError;

/// A validated wallet address, the primary key of every progress record.
///
/// Accepts EVM style `0x` + hex (normalized to lower case) and base58 account
/// keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

impl WalletAddress {
    pub fn parse(raw: &str) -> Result<Self, QuestError> {
        let trimmed = raw.trim();

        if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            if (40..=64).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Ok(Self(format!("0x{}", hex.to_ascii_lowercase())));
            }
            return Err(QuestError::InvalidAddress(raw.to_string()));
        }

        if (32..=44).contains(&trimmed.len()) && trimmed.chars().all(|c| BASE58_ALPHABET.contains(c))
        {
            return Ok(Self(trimmed.to_string()));
        }

        Err(QuestError::InvalidAddress(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines and popups (`0x1234…abcd`)
    pub fn short(&self) -> String {
        if self.0.len() <= 12 {
            return self.0.clone();
        }
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = QuestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(addr: WalletAddress) -> Self {
        addr.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const MILLIS_PER_TOKEN: u64 = 1000;

/// Non-negative token amount with three decimal places, stored as thousandths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(u64);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub const fn from_milli(milli: u64) -> Self {
        Self(milli)
    }

    /// Round a decimal amount to three places. Negative and non-finite input is zero.
    pub fn from_decimal(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::ZERO;
        }
        Self((value * MILLIS_PER_TOKEN as f64).round() as u64)
    }

    pub const fn milli(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / MILLIS_PER_TOKEN as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:03}",
            self.0 / MILLIS_PER_TOKEN,
            self.0 % MILLIS_PER_TOKEN
        )
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if value < 0.0 {
            return Err(serde::de::Error::custom("token amount cannot be negative"));
        }
        Ok(Self::from_decimal(value))
    }
}

/// Boolean flags on a progress record. Setting a flag is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressFlag {
    OnboardingSeen,
}

impl ProgressFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnboardingSeen => "onboarding_seen",
        }
    }
}

/// Per-wallet progress record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    pub wallet: WalletAddress,
    pub total_xp: u64,
    pub level: u32,
    pub tokens: TokenAmount,
    pub streak: u32,
    pub best_streak: u32,

    // Timestamps (ms since epoch)
    pub last_login_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,

    pub onboarding_seen: bool,
}

/// Additive change to a progress record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressDelta {
    pub xp: u64,
    pub tokens: TokenAmount,
    pub flags: BTreeSet<ProgressFlag>,
}

impl ProgressDelta {
    pub fn xp(amount: u64) -> Self {
        Self {
            xp: amount,
            ..Self::default()
        }
    }

    pub fn with_tokens(mut self, tokens: TokenAmount) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_flag(mut self, flag: ProgressFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.xp == 0 && self.tokens.is_zero() && self.flags.is_empty()
    }
}

/// Whether applying a delta created the record or updated an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    Created,
    Updated,
}

impl DeltaOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }
}

/// Result of recording a login for the daily streak
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// This was the wallet's first connection
    pub created: bool,
    /// First login of the calendar day
    pub first_today: bool,
    /// Streak grew by one (consecutive day)
    pub streak_extended: bool,
    pub streak: u32,
    pub best_streak: u32,
}
