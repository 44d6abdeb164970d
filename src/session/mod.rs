//! Per-connection session context
//!
//! A session starts when a wallet connects and ends on logout. It carries the
//! "shown this session" markers for popups and the fresh-login signal, so no
//! process-wide flags are needed.

mod throttle;

pub use throttle::{PopupDecision, PopupThrottle, ShowReason, SuppressReason, ThrottlePolicy};

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::progress::WalletAddress;

/// Popups that are throttled to roughly once per day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupKind {
    DailyStreak,
    DailyChallenges,
}

impl PopupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyStreak => "daily_streak",
            Self::DailyChallenges => "daily_challenges",
        }
    }
}

/// State for one connected wallet between connect and logout
#[derive(Debug)]
pub struct Session {
    wallet: WalletAddress,
    started_at: DateTime<Utc>,
    fresh_login: bool,
    shown: HashSet<PopupKind>,
}

impl Session {
    /// Start a session. `fresh_login` is true when the connect just happened.
    pub fn begin(wallet: WalletAddress, now: DateTime<Utc>, fresh_login: bool) -> Self {
        debug!(wallet = %wallet.short(), fresh_login, "session started");
        Self {
            wallet,
            started_at: now,
            fresh_login,
            shown: HashSet::new(),
        }
    }

    pub fn wallet(&self) -> &WalletAddress {
        &self.wallet
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_fresh_login(&self) -> bool {
        self.fresh_login
    }

    /// Fresh-login signal for one popup, consumed once that popup is shown
    pub fn fresh_login_pending(&self, kind: PopupKind) -> bool {
        self.fresh_login && !self.shown.contains(&kind)
    }

    pub fn shown_this_session(&self, kind: PopupKind) -> bool {
        self.shown.contains(&kind)
    }

    pub(crate) fn record_shown(&mut self, kind: PopupKind) {
        self.shown.insert(kind);
    }

    pub fn end(self) {
        debug!(wallet = %self.wallet.short(), shown = self.shown.len(), "session ended");
    }
}
