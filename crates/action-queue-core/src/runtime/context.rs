//! Collaborators the interpreter drives.
//!
//! Wallets, borrow engines, swap providers and exchanges live outside this
//! crate. The interpreter sees them only through these traits so a host
//! application can plug in its own engines and tests can plug in fakes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::{AmountFor, LoanKind};
use crate::error::CollaboratorError;

pub type CollabResult<T> = std::result::Result<T, CollaboratorError>;

// ─── Wallets ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletInfo {
    pub wallet_id: String,
    /// Currency plugin of the wallet, e.g. `bitcoin`.
    pub plugin_id: String,
}

/// Resolve a wallet id to its currency plugin.
#[async_trait]
pub trait WalletLookup: Send + Sync {
    async fn wallet_info(&self, wallet_id: &str) -> CollabResult<WalletInfo>;
}

/// What a wallet knows about one of its transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxConfirmations {
    /// Not seen yet.
    Unknown,
    Confirmations(u32),
    /// Final by the chain's own standard.
    Confirmed,
    /// Evicted from the network and will never confirm.
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTx {
    pub tx_id: String,
}

#[async_trait]
pub trait WalletEngine: WalletLookup {
    /// Balance in the smallest unit, as a decimal string.
    async fn balance(&self, wallet_id: &str, token_id: Option<&str>) -> CollabResult<String>;

    async fn receive_address(&self, wallet_id: &str, token_id: Option<&str>)
        -> CollabResult<String>;

    async fn tx_confirmations(&self, wallet_id: &str, tx_id: &str)
        -> CollabResult<TxConfirmations>;

    /// Build, sign and broadcast a spend.
    async fn send(
        &self,
        wallet_id: &str,
        token_id: Option<&str>,
        native_amount: &str,
        address: &str,
    ) -> CollabResult<SentTx>;

    /// Broadcast a pre-signed transaction.
    async fn broadcast(&self, wallet_id: &str, raw_tx: &[u8]) -> CollabResult<SentTx>;
}

// ─── Borrow engines ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    pub kind: LoanKind,
    pub borrow_plugin_id: String,
    pub wallet_id: String,
    pub token_id: Option<String>,
    pub native_amount: String,
    pub from_token_id: Option<String>,
}

/// A transaction broadcast while approving a loan operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedTx {
    pub wallet_id: String,
    pub tx_id: String,
}

#[async_trait]
pub trait BorrowPlugins: Send + Sync {
    /// Build and broadcast every transaction the operation needs, in order.
    async fn approve(&self, request: &LoanRequest) -> CollabResult<Vec<ApprovedTx>>;
}

// ─── Swaps ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub from_wallet_id: String,
    pub from_token_id: Option<String>,
    pub to_wallet_id: String,
    pub to_token_id: Option<String>,
    pub native_amount: String,
    pub amount_for: AmountFor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReceipt {
    pub tx_id: String,
    /// Where the payout lands.
    pub payout_address: String,
    /// Quoted payout in the destination's smallest unit.
    pub payout_native_amount: String,
}

#[async_trait]
pub trait SwapProvider: Send + Sync {
    async fn approve_swap(&self, request: &SwapRequest) -> CollabResult<SwapReceipt>;
}

// ─── Exchanges ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOrder {
    pub exchange_plugin_id: String,
    pub wallet_id: String,
    pub token_id: Option<String>,
    pub native_amount: String,
}

#[async_trait]
pub trait ExchangeProvider: Send + Sync {
    /// Address on the exchange to send funds to for a sell order.
    async fn deposit_address(&self, order: &ExchangeOrder) -> CollabResult<String>;

    /// Place a buy order that pays out to `payout_address`.
    async fn place_buy(&self, order: &ExchangeOrder, payout_address: &str) -> CollabResult<()>;
}

// ─── Rates, notifications, time ───────────────────────────────────────────

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Current rate of a pair such as `BTC_iso:USD`.
    async fn rate(&self, currency_pair: &str) -> CollabResult<f64>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn toast(&self, message: &str) -> CollabResult<()>;
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

// ─── ExecutionContext ─────────────────────────────────────────────────────

/// Every collaborator one interpreter needs.
#[derive(Clone)]
pub struct ExecutionContext {
    pub wallets: Arc<dyn WalletEngine>,
    pub borrow: Arc<dyn BorrowPlugins>,
    pub swaps: Arc<dyn SwapProvider>,
    pub exchanges: Arc<dyn ExchangeProvider>,
    pub rates: Arc<dyn RateProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl ExecutionContext {
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}
