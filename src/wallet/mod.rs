//! Wallet boundary
//!
//! The connected wallet is an external collaborator: balance reads and payment
//! submission may fail, hang, or be rejected by the user. Everything behind
//! the [`Wallet`] trait is async and must not be awaited while holding the
//! progress database lock.

mod retry;

pub use retry::{RetryPolicy, retry_read};

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

use crate::progress::{TokenAmount, WalletAddress};

/// Failures reported by the wallet or its network
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The user declined, or the chain refused the transaction
    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("wallet network error: {0}")]
    Network(String),

    /// No answer in time. The request may still land.
    #[error("wallet request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("no wallet connected")]
    NotConnected,
}

impl WalletError {
    /// Transient failures that an idempotent read may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout { .. })
    }
}

/// A confirmed payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub signature: String,
    pub amount: TokenAmount,
}

/// Connected wallet
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Address of the connected account, if any
    fn connected_address(&self) -> Option<WalletAddress>;

    async fn balance(&self, address: &WalletAddress) -> Result<TokenAmount, WalletError>;

    /// Pay `amount` from `from`, tagged with `memo`
    async fn submit_payment(
        &self,
        from: &WalletAddress,
        amount: TokenAmount,
        memo: &str,
    ) -> Result<TxReceipt, WalletError>;
}

/// Scripted failure for the next simulated request
#[derive(Debug, Clone)]
pub enum SimulatedFailure {
    Reject(String),
    Network(String),
    /// Never answers
    Hang,
}

/// In-process wallet used by the CLI and tests
pub struct SimulatedWallet {
    connected: Option<WalletAddress>,
    balances: Mutex<HashMap<WalletAddress, TokenAmount>>,
    latency: Duration,
    balance_failures: Mutex<VecDeque<SimulatedFailure>>,
    payment_failures: Mutex<VecDeque<SimulatedFailure>>,
    submitted: AtomicU32,
}

impl SimulatedWallet {
    pub fn new(address: WalletAddress, balance: TokenAmount) -> Self {
        Self {
            connected: Some(address.clone()),
            balances: Mutex::new(HashMap::from([(address, balance)])),
            latency: Duration::ZERO,
            balance_failures: Mutex::new(VecDeque::new()),
            payment_failures: Mutex::new(VecDeque::new()),
            submitted: AtomicU32::new(0),
        }
    }

    /// A wallet with no connected account
    pub fn disconnected() -> Self {
        Self {
            connected: None,
            balances: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            balance_failures: Mutex::new(VecDeque::new()),
            payment_failures: Mutex::new(VecDeque::new()),
            submitted: AtomicU32::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn fail_next_balance(&self, failure: SimulatedFailure) {
        lock(&self.balance_failures).push_back(failure);
    }

    pub fn fail_next_payment(&self, failure: SimulatedFailure) {
        lock(&self.payment_failures).push_back(failure);
    }

    pub fn set_balance(&self, address: &WalletAddress, amount: TokenAmount) {
        lock(&self.balances).insert(address.clone(), amount);
    }

    /// Balance without latency or scripted failures
    pub fn balance_of(&self, address: &WalletAddress) -> TokenAmount {
        lock(&self.balances).get(address).copied().unwrap_or_default()
    }

    /// Payment submissions seen so far, failed ones included
    pub fn submitted(&self) -> u32 {
        self.submitted.load(Ordering::SeqCst)
    }

    async fn respond(&self, queue: &Mutex<VecDeque<SimulatedFailure>>) -> Result<(), WalletError> {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        // Guard dropped before any await below
        let failure = lock(queue).pop_front();
        match failure {
            None => Ok(()),
            Some(SimulatedFailure::Reject(reason)) => Err(WalletError::Rejected(reason)),
            Some(SimulatedFailure::Network(reason)) => Err(WalletError::Network(reason)),
            Some(SimulatedFailure::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Wallet for SimulatedWallet {
    fn connected_address(&self) -> Option<WalletAddress> {
        self.connected.clone()
    }

    async fn balance(&self, address: &WalletAddress) -> Result<TokenAmount, WalletError> {
        if self.connected.is_none() {
            return Err(WalletError::NotConnected);
        }
        self.respond(&self.balance_failures).await?;
        Ok(self.balance_of(address))
    }

    async fn submit_payment(
        &self,
        from: &WalletAddress,
        amount: TokenAmount,
        memo: &str,
    ) -> Result<TxReceipt, WalletError> {
        // Only the connected account can sign
        if self.connected.as_ref() != Some(from) {
            return Err(WalletError::NotConnected);
        }
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.respond(&self.payment_failures).await?;

        let mut balances = lock(&self.balances);
        let balance = balances.entry(from.clone()).or_default();
        if *balance < amount {
            return Err(WalletError::Rejected("insufficient funds".to_string()));
        }
        *balance = balance.saturating_sub(amount);

        let signature = format!("sim{}", Uuid::new_v4().simple());
        debug!(memo, %amount, %signature, "simulated payment confirmed");
        Ok(TxReceipt { signature, amount })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Simulator state stays usable after a panicking test thread
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
