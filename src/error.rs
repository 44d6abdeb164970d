//! Error taxonomy for progress and reward operations
//!
//! `AlreadyClaimed` is deliberately absent: a claim on an entity that was
//! already paid out is a normal outcome (`ClaimOutcome::AlreadyClaimed`).

use crate::progress::TokenAmount;
use crate::wallet::WalletError;

pub type Result<T> = std::result::Result<T, QuestError>;

/// Errors surfaced by the progress store, claim guard and reward flows
#[derive(Debug, thiserror::Error)]
pub enum QuestError {
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("{0} is not completed yet")]
    NotCompleted(String),

    #[error("{0} has no pending paid claim")]
    NotReserved(String),

    #[error("progress store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("insufficient balance: {required} required, {available} available")]
    InsufficientBalance {
        required: TokenAmount,
        available: TokenAmount,
    },

    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),
}

impl QuestError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    /// Whether the user may safely try the same action again.
    ///
    /// Nothing here is retried automatically for payout-affecting operations.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) => true,
            Self::Wallet(e) => e.is_retryable() || matches!(e, WalletError::Rejected(_)),
            _ => false,
        }
    }

    /// Message suitable for a toast or CLI error line
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { what, .. } => format!("That {what} doesn't exist."),
            Self::NotCompleted(_) => "Finish this first, then claim your reward.".to_string(),
            Self::NotReserved(_) => {
                "This payment has no pending claim. Start the mint again.".to_string()
            }
            Self::StoreUnavailable(_) => {
                "Progress could not be saved right now. Nothing was claimed; please try again."
                    .to_string()
            }
            // Wallet failures are surfaced verbatim
            Self::Wallet(e) => format!("Wallet error: {e}. You can retry."),
            Self::InsufficientBalance {
                required,
                available,
            } => format!("You need {required} but your wallet holds {available}."),
            Self::InvalidAddress(addr) => format!("'{addr}' is not a valid wallet address."),
        }
    }
}

impl From<rusqlite::Error> for QuestError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
