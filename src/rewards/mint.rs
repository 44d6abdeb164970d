//! Paid completion NFT mints
//!
//! The wallet call happens outside any database transaction. A paid claim
//! takes an in-flight lease first, then finalizes on success or releases on a
//! definite failure. A timeout leaves the lease in place: the payment may
//! still land, so the claim stays blocked until the lease expires.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::catalog::LearningModule;
use super::claims::ClaimGuard;
use super::entities::{ClaimOutcome, ClaimReceipt, ClaimState, EntityKind, EntityRef, Reservation};
use crate::error::{QuestError, Result};
use crate::progress::db::ProgressDb;
use crate::progress::levels::{LevelSync, LevelSynchronizer};
use crate::progress::{TokenAmount, now_ms};
use crate::wallet::{RetryPolicy, Wallet, WalletError, retry_read};

/// Mint fee and wallet limits
#[derive(Debug, Clone)]
pub struct MintSettings {
    pub fee: TokenAmount,
    pub request_timeout: Duration,
    pub in_flight_ttl: Duration,
    pub balance_retry: RetryPolicy,
}

/// Slack between the payment deadline and the earliest lease takeover
pub const LEASE_MARGIN: Duration = Duration::from_secs(5);

impl MintSettings {
    /// How long a reservation blocks other mints.
    ///
    /// Never shorter than the payment deadline plus `LEASE_MARGIN`, so a lease
    /// cannot be taken over while its payment may still be pending.
    pub fn lease(&self) -> Duration {
        self.in_flight_ttl.max(self.request_timeout + LEASE_MARGIN)
    }
}

impl Default for MintSettings {
    fn default() -> Self {
        Self {
            fee: TokenAmount::from_milli(10),
            request_timeout: Duration::from_secs(15),
            in_flight_ttl: Duration::from_secs(300),
            balance_retry: RetryPolicy::default(),
        }
    }
}

/// Result of a mint attempt
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MintOutcome {
    Minted {
        receipt: ClaimReceipt,
        /// `None` when the follow-up level sync failed
        level: Option<LevelSync>,
    },
    AlreadyMinted,
    /// Another mint for this module is waiting on the wallet
    InFlight,
}

/// Mints module completion NFTs against a connected wallet
#[derive(Clone)]
pub struct NftMinter {
    claims: ClaimGuard,
    levels: LevelSynchronizer,
    settings: MintSettings,
}

impl NftMinter {
    pub fn new(db: ProgressDb, settings: MintSettings) -> Self {
        if settings.lease() > settings.in_flight_ttl {
            warn!(
                in_flight_ttl_ms = settings.in_flight_ttl.as_millis() as u64,
                lease_ms = settings.lease().as_millis() as u64,
                "in-flight ttl shorter than the payment timeout, extending the lease"
            );
        }
        Self {
            claims: ClaimGuard::new(db.clone()),
            levels: LevelSynchronizer::new(db),
            settings,
        }
    }

    pub fn settings(&self) -> &MintSettings {
        &self.settings
    }

    pub async fn mint(&self, wallet: &dyn Wallet, module_id: &str) -> Result<MintOutcome> {
        let address = wallet.connected_address().ok_or(WalletError::NotConnected)?;
        let module = LearningModule::get(module_id)
            .ok_or_else(|| QuestError::not_found("learning module", module_id))?;
        let entity = EntityRef::new(address.clone(), EntityKind::NftMint, module.id);

        let current = self.claims.get(&entity)?;
        if current.state == ClaimState::Claimed {
            return Ok(MintOutcome::AlreadyMinted);
        }
        if !current.completed {
            return Err(QuestError::NotCompleted(entity.to_string()));
        }

        let limit = self.settings.request_timeout;
        let fee = self.settings.fee;
        let available = retry_read(&self.settings.balance_retry, "balance", || {
            within(limit, wallet.balance(&address))
        })
        .await?;
        if available < fee {
            return Err(QuestError::InsufficientBalance {
                required: fee,
                available,
            });
        }

        let lease_ms = i64::try_from(self.settings.lease().as_millis()).unwrap_or(i64::MAX);
        match self.claims.reserve(&entity, now_ms(), lease_ms)? {
            Reservation::Reserved => {}
            Reservation::AlreadyClaimed => return Ok(MintOutcome::AlreadyMinted),
            Reservation::InFlight => return Ok(MintOutcome::InFlight),
        }

        let memo = format!("chainquest:nft:{}", module.id);
        let receipt = match within(limit, wallet.submit_payment(&address, fee, &memo)).await {
            Ok(receipt) => receipt,
            Err(e @ WalletError::Timeout { .. }) => {
                warn!(entity = %entity, "mint payment timed out, lease kept until it expires");
                return Err(e.into());
            }
            Err(e) => {
                self.claims.release(&entity)?;
                return Err(e.into());
            }
        };

        let outcome = self
            .claims
            .finalize(&entity, Some(&receipt.signature))
            .inspect_err(|e| {
                error!(entity = %entity, signature = %receipt.signature, error = %e, "payment confirmed but claim not recorded");
            })?;

        match outcome {
            ClaimOutcome::Claimed(claim) => {
                let level = self
                    .levels
                    .synchronize(&entity.wallet)
                    .inspect_err(|e| warn!(entity = %entity, error = %e, "level sync after mint failed"))
                    .ok();
                info!(entity = %entity, signature = %receipt.signature, fee = %fee, "completion NFT minted");
                Ok(MintOutcome::Minted {
                    receipt: claim,
                    level,
                })
            }
            ClaimOutcome::AlreadyClaimed | ClaimOutcome::InFlight => Ok(MintOutcome::AlreadyMinted),
        }
    }
}

async fn within<T>(
    limit: Duration,
    request: impl Future<Output = std::result::Result<T, WalletError>>,
) -> std::result::Result<T, WalletError> {
    match timeout(limit, request).await {
        Ok(result) => result,
        Err(_) => Err(WalletError::Timeout {
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
