//! Collaborators for running the queue without a wallet engine.
//!
//! The operator binary only inspects, cancels and re-registers programs. It
//! resolves wallet plugins from the `wallets` map in the config; every call
//! that would need a live engine reports `Unavailable`.

use std::collections::BTreeMap;
use std::sync::Arc;

use action_queue_core::runtime::context::{
    ApprovedTx, BorrowPlugins, CollabResult, ExchangeOrder, ExchangeProvider, ExecutionContext,
    LoanRequest, Notifier, RateProvider, SentTx, SwapProvider, SwapReceipt, SwapRequest,
    SystemClock, TxConfirmations, WalletEngine, WalletInfo, WalletLookup,
};
use action_queue_core::CollaboratorError;
use async_trait::async_trait;

fn offline<T>(what: &str) -> CollabResult<T> {
    Err(CollaboratorError::Unavailable(format!(
        "{what} needs a wallet engine; aq runs offline"
    )))
}

/// Wallet lookups backed by the config's `walletId -> pluginId` map.
pub struct ConfiguredWallets {
    wallets: BTreeMap<String, String>,
}

impl ConfiguredWallets {
    pub fn new(wallets: BTreeMap<String, String>) -> Self {
        Self { wallets }
    }
}

#[async_trait]
impl WalletLookup for ConfiguredWallets {
    async fn wallet_info(&self, wallet_id: &str) -> CollabResult<WalletInfo> {
        self.wallets
            .get(wallet_id)
            .map(|plugin_id| WalletInfo {
                wallet_id: wallet_id.to_string(),
                plugin_id: plugin_id.clone(),
            })
            .ok_or_else(|| CollaboratorError::WalletNotFound(wallet_id.to_string()))
    }
}

#[async_trait]
impl WalletEngine for ConfiguredWallets {
    async fn balance(&self, _wallet_id: &str, _token_id: Option<&str>) -> CollabResult<String> {
        offline("balance")
    }

    async fn receive_address(
        &self,
        _wallet_id: &str,
        _token_id: Option<&str>,
    ) -> CollabResult<String> {
        offline("receive address")
    }

    async fn tx_confirmations(
        &self,
        _wallet_id: &str,
        _tx_id: &str,
    ) -> CollabResult<TxConfirmations> {
        offline("transaction status")
    }

    async fn send(
        &self,
        _wallet_id: &str,
        _token_id: Option<&str>,
        _native_amount: &str,
        _address: &str,
    ) -> CollabResult<SentTx> {
        offline("send")
    }

    async fn broadcast(&self, _wallet_id: &str, _raw_tx: &[u8]) -> CollabResult<SentTx> {
        offline("broadcast")
    }
}

/// Stands in for borrow, swap, exchange and rate collaborators.
pub struct Offline;

#[async_trait]
impl BorrowPlugins for Offline {
    async fn approve(&self, _request: &LoanRequest) -> CollabResult<Vec<ApprovedTx>> {
        offline("loan approval")
    }
}

#[async_trait]
impl SwapProvider for Offline {
    async fn approve_swap(&self, _request: &SwapRequest) -> CollabResult<SwapReceipt> {
        offline("swap")
    }
}

#[async_trait]
impl ExchangeProvider for Offline {
    async fn deposit_address(&self, _order: &ExchangeOrder) -> CollabResult<String> {
        offline("exchange deposit")
    }

    async fn place_buy(&self, _order: &ExchangeOrder, _payout_address: &str) -> CollabResult<()> {
        offline("exchange buy")
    }
}

#[async_trait]
impl RateProvider for Offline {
    async fn rate(&self, _currency_pair: &str) -> CollabResult<f64> {
        offline("exchange rate")
    }
}

/// Completion toasts go to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn toast(&self, message: &str) -> CollabResult<()> {
        tracing::info!(%message, "toast");
        Ok(())
    }
}

pub fn context(wallets: BTreeMap<String, String>) -> ExecutionContext {
    let offline = Arc::new(Offline);
    ExecutionContext {
        wallets: Arc::new(ConfiguredWallets::new(wallets)),
        borrow: offline.clone(),
        swaps: offline.clone(),
        exchanges: offline.clone(),
        rates: offline,
        notifier: Arc::new(LogNotifier),
        clock: Arc::new(SystemClock),
    }
}
