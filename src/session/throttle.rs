//! Once-per-day popup throttle
//!
//! Backed by a single persisted `last_shown_at` per (wallet, popup) and the
//! session's in-memory markers.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use rusqlite::OptionalExtension;
use serde::Serialize;
use tracing::debug;

use super::{PopupKind, Session};
use crate::error::Result;
use crate::progress::db::ProgressDb;
use crate::progress::{day_offset, from_ms, local_day};

/// Time windows for the throttle
#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    /// Suppress when shown more recently than this
    pub min_gap: Duration,
    /// Always show again once this much time has passed
    pub reset_after: Duration,
    /// Offset used to decide what "today" means
    pub day_offset: FixedOffset,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            min_gap: Duration::hours(6),
            reset_after: Duration::hours(24),
            day_offset: day_offset(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowReason {
    FreshLogin,
    NeverShown,
    ResetElapsed,
    Due,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    ShownToday,
    WithinMinGap,
    ShownThisSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum PopupDecision {
    Show(ShowReason),
    Suppress(SuppressReason),
}

impl PopupDecision {
    pub fn is_show(&self) -> bool {
        matches!(self, Self::Show(_))
    }
}

impl ThrottlePolicy {
    /// Pure decision over the inputs; evaluated top to bottom
    pub fn decide(
        &self,
        last_shown: Option<DateTime<Utc>>,
        fresh_login: bool,
        shown_this_session: bool,
        now: DateTime<Utc>,
    ) -> PopupDecision {
        if fresh_login {
            return PopupDecision::Show(ShowReason::FreshLogin);
        }
        let Some(last) = last_shown else {
            return PopupDecision::Show(ShowReason::NeverShown);
        };

        let elapsed = now - last;
        if elapsed >= self.reset_after {
            return PopupDecision::Show(ShowReason::ResetElapsed);
        }
        if local_day(last, self.day_offset) == local_day(now, self.day_offset) {
            return PopupDecision::Suppress(SuppressReason::ShownToday);
        }
        if elapsed < self.min_gap {
            return PopupDecision::Suppress(SuppressReason::WithinMinGap);
        }
        if shown_this_session {
            return PopupDecision::Suppress(SuppressReason::ShownThisSession);
        }
        PopupDecision::Show(ShowReason::Due)
    }
}

/// Decides when throttled popups fire and records that they did
#[derive(Clone)]
pub struct PopupThrottle {
    db: ProgressDb,
    policy: ThrottlePolicy,
}

impl PopupThrottle {
    pub fn new(db: ProgressDb, policy: ThrottlePolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    pub fn last_shown(&self, session: &Session, kind: PopupKind) -> Result<Option<DateTime<Utc>>> {
        let conn = self.db.conn()?;
        let last: Option<i64> = conn
            .query_row(
                "SELECT last_shown_at FROM popup_state WHERE wallet = ?1 AND popup = ?2",
                rusqlite::params![session.wallet().as_str(), kind.as_str()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(last.map(from_ms))
    }

    pub fn check(&self, session: &Session, kind: PopupKind, now: DateTime<Utc>) -> Result<PopupDecision> {
        let last = self.last_shown(session, kind)?;
        let decision = self.policy.decide(
            last,
            session.fresh_login_pending(kind),
            session.shown_this_session(kind),
            now,
        );
        debug!(wallet = %session.wallet().short(), popup = kind.as_str(), ?decision, "popup throttle");
        Ok(decision)
    }

    /// Persist the timestamp, then update the session markers
    pub fn mark_shown(&self, session: &mut Session, kind: PopupKind, now: DateTime<Utc>) -> Result<()> {
        self.db.write(|tx| {
            tx.execute(
                r#"INSERT INTO popup_state (wallet, popup, last_shown_at) VALUES (?1, ?2, ?3)
                   ON CONFLICT(wallet, popup) DO UPDATE SET last_shown_at = excluded.last_shown_at"#,
                rusqlite::params![session.wallet().as_str(), kind.as_str(), now.timestamp_millis()],
            )?;
            Ok(())
        })?;
        session.record_shown(kind);
        Ok(())
    }

    /// Check and, when the popup fires, mark it shown
    pub fn maybe_show(&self, session: &mut Session, kind: PopupKind, now: DateTime<Utc>) -> Result<PopupDecision> {
        let decision = self.check(session, kind, now)?;
        if decision.is_show() {
            self.mark_shown(session, kind, now)?;
        }
        Ok(decision)
    }
}
