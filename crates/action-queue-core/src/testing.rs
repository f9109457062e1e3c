//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use push_client::{
    DevicePayload, DeviceUpdatePayload, LoginPayload, LoginUpdatePayload, PushApi, PushError,
    PushEventStatus,
};

use crate::error::CollaboratorError;
use crate::runtime::context::*;

// ─── Wallets ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct WalletsInner {
    plugins: HashMap<String, String>,
    balances: HashMap<(String, Option<String>), String>,
    confirmations: HashMap<String, TxConfirmations>,
    sent: Vec<(String, String, String)>,
    broadcasts: Vec<(String, Vec<u8>)>,
    balance_reads: usize,
    unavailable: bool,
}

#[derive(Default)]
pub struct FakeWallets {
    inner: Mutex<WalletsInner>,
}

impl FakeWallets {
    pub fn add_wallet(&self, wallet_id: &str, plugin_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.plugins.insert(wallet_id.into(), plugin_id.into());
    }

    pub fn set_balance(&self, wallet_id: &str, token_id: Option<&str>, amount: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.balances.insert(
            (wallet_id.into(), token_id.map(String::from)),
            amount.into(),
        );
    }

    pub fn set_confirmations(&self, tx_id: &str, status: TxConfirmations) {
        let mut inner = self.inner.lock().unwrap();
        inner.confirmations.insert(tx_id.into(), status);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap().unavailable = unavailable;
    }

    /// Hex of every raw transaction broadcast so far, in order.
    pub fn broadcasts(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.broadcasts.iter().map(|(_, raw)| hex::encode(raw)).collect()
    }

    /// `(wallet_id, native_amount, address)` of every spend.
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn balance_reads(&self) -> usize {
        self.inner.lock().unwrap().balance_reads
    }

    fn check_available(&self) -> CollabResult<()> {
        if self.inner.lock().unwrap().unavailable {
            return Err(CollaboratorError::Unavailable("wallet engine offline".into()));
        }
        Ok(())
    }

    fn require_wallet(&self, wallet_id: &str) -> CollabResult<String> {
        self.inner
            .lock()
            .unwrap()
            .plugins
            .get(wallet_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::WalletNotFound(wallet_id.into()))
    }
}

#[async_trait]
impl WalletLookup for FakeWallets {
    async fn wallet_info(&self, wallet_id: &str) -> CollabResult<WalletInfo> {
        let plugin_id = self.require_wallet(wallet_id)?;
        Ok(WalletInfo {
            wallet_id: wallet_id.into(),
            plugin_id,
        })
    }
}

#[async_trait]
impl WalletEngine for FakeWallets {
    async fn balance(&self, wallet_id: &str, token_id: Option<&str>) -> CollabResult<String> {
        self.check_available()?;
        self.require_wallet(wallet_id)?;
        let mut inner = self.inner.lock().unwrap();
        inner.balance_reads += 1;
        Ok(inner
            .balances
            .get(&(wallet_id.to_string(), token_id.map(String::from)))
            .cloned()
            .unwrap_or_else(|| "0".into()))
    }

    async fn receive_address(
        &self,
        wallet_id: &str,
        _token_id: Option<&str>,
    ) -> CollabResult<String> {
        self.require_wallet(wallet_id)?;
        Ok(format!("addr-{wallet_id}"))
    }

    async fn tx_confirmations(
        &self,
        _wallet_id: &str,
        tx_id: &str,
    ) -> CollabResult<TxConfirmations> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .confirmations
            .get(tx_id)
            .copied()
            .unwrap_or(TxConfirmations::Unknown))
    }

    async fn send(
        &self,
        wallet_id: &str,
        _token_id: Option<&str>,
        native_amount: &str,
        address: &str,
    ) -> CollabResult<SentTx> {
        self.require_wallet(wallet_id)?;
        let mut inner = self.inner.lock().unwrap();
        inner
            .sent
            .push((wallet_id.into(), native_amount.into(), address.into()));
        Ok(SentTx {
            tx_id: format!("sent-{}", inner.sent.len()),
        })
    }

    async fn broadcast(&self, wallet_id: &str, raw_tx: &[u8]) -> CollabResult<SentTx> {
        self.require_wallet(wallet_id)?;
        let mut inner = self.inner.lock().unwrap();
        inner.broadcasts.push((wallet_id.into(), raw_tx.to_vec()));
        Ok(SentTx {
            tx_id: hex::encode(raw_tx),
        })
    }
}

// ─── Borrow / swap / exchange ─────────────────────────────────────────────

#[derive(Default)]
pub struct FakeBorrow {
    requests: Mutex<Vec<LoanRequest>>,
    failure: Mutex<Option<CollaboratorError>>,
}

impl FakeBorrow {
    pub fn fail_with(&self, error: CollaboratorError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn requests(&self) -> Vec<LoanRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BorrowPlugins for FakeBorrow {
    async fn approve(&self, request: &LoanRequest) -> CollabResult<Vec<ApprovedTx>> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let n = requests.len();
        // An approval followed by the operation itself.
        Ok(vec![
            ApprovedTx {
                wallet_id: request.wallet_id.clone(),
                tx_id: format!("approve-{n}"),
            },
            ApprovedTx {
                wallet_id: request.wallet_id.clone(),
                tx_id: format!("loan-{n}"),
            },
        ])
    }
}

pub struct FakeSwaps {
    pub payout: Mutex<String>,
    requests: Mutex<Vec<SwapRequest>>,
}

impl Default for FakeSwaps {
    fn default() -> Self {
        Self {
            payout: Mutex::new("1000".into()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeSwaps {
    pub fn requests(&self) -> Vec<SwapRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapProvider for FakeSwaps {
    async fn approve_swap(&self, request: &SwapRequest) -> CollabResult<SwapReceipt> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(SwapReceipt {
            tx_id: "swap-1".into(),
            payout_address: format!("addr-{}", request.to_wallet_id),
            payout_native_amount: self.payout.lock().unwrap().clone(),
        })
    }
}

#[derive(Default)]
pub struct FakeExchange {
    buys: Mutex<Vec<(ExchangeOrder, String)>>,
}

impl FakeExchange {
    pub fn buys(&self) -> Vec<(ExchangeOrder, String)> {
        self.buys.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeProvider for FakeExchange {
    async fn deposit_address(&self, order: &ExchangeOrder) -> CollabResult<String> {
        Ok(format!("{}-deposit", order.exchange_plugin_id))
    }

    async fn place_buy(&self, order: &ExchangeOrder, payout_address: &str) -> CollabResult<()> {
        self.buys
            .lock()
            .unwrap()
            .push((order.clone(), payout_address.to_string()));
        Ok(())
    }
}

// ─── Rates / notifier / clock ─────────────────────────────────────────────

#[derive(Default)]
pub struct FakeRates {
    rates: Mutex<HashMap<String, f64>>,
}

impl FakeRates {
    pub fn set(&self, pair: &str, rate: f64) {
        self.rates.lock().unwrap().insert(pair.into(), rate);
    }
}

#[async_trait]
impl RateProvider for FakeRates {
    async fn rate(&self, currency_pair: &str) -> CollabResult<f64> {
        self.rates
            .lock()
            .unwrap()
            .get(currency_pair)
            .copied()
            .ok_or_else(|| CollaboratorError::Unavailable(format!("no rate for {currency_pair}")))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn toast(&self, message: &str) -> CollabResult<()> {
        self.messages.lock().unwrap().push(message.into());
        Ok(())
    }
}

#[derive(Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ─── Fakes bundle ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Fakes {
    pub wallets: Arc<FakeWallets>,
    pub borrow: Arc<FakeBorrow>,
    pub swaps: Arc<FakeSwaps>,
    pub exchanges: Arc<FakeExchange>,
    pub rates: Arc<FakeRates>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

impl Fakes {
    /// Wallets `w1` (bitcoin) and `w2` (ethereum), clock at 1_000_000.
    pub fn new() -> Self {
        let fakes = Self {
            wallets: Arc::new(FakeWallets::default()),
            borrow: Arc::new(FakeBorrow::default()),
            swaps: Arc::new(FakeSwaps::default()),
            exchanges: Arc::new(FakeExchange::default()),
            rates: Arc::new(FakeRates::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            clock: Arc::new(ManualClock::default()),
        };
        fakes.wallets.add_wallet("w1", "bitcoin");
        fakes.wallets.add_wallet("w2", "ethereum");
        fakes.clock.set(1_000_000);
        fakes
    }

    pub fn context(&self) -> ExecutionContext {
        ExecutionContext {
            wallets: self.wallets.clone(),
            borrow: self.borrow.clone(),
            swaps: self.swaps.clone(),
            exchanges: self.exchanges.clone(),
            rates: self.rates.clone(),
            notifier: self.notifier.clone(),
            clock: self.clock.clone(),
        }
    }
}

// ─── Push server ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePush {
    login_updates: Mutex<Vec<LoginUpdatePayload>>,
    device_updates: Mutex<Vec<DeviceUpdatePayload>>,
    statuses: Mutex<Vec<PushEventStatus>>,
    failing: AtomicBool,
}

impl FakePush {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_statuses(&self, statuses: Vec<PushEventStatus>) {
        *self.statuses.lock().unwrap() = statuses;
    }

    pub fn login_updates(&self) -> Vec<LoginUpdatePayload> {
        self.login_updates.lock().unwrap().clone()
    }

    pub fn device_updates(&self) -> Vec<DeviceUpdatePayload> {
        self.device_updates.lock().unwrap().clone()
    }

    fn check(&self) -> push_client::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PushError::Status {
                path: "/v2/login/update".into(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PushApi for FakePush {
    async fn update_device(
        &self,
        payload: &DeviceUpdatePayload,
    ) -> push_client::Result<DevicePayload> {
        self.check()?;
        self.device_updates.lock().unwrap().push(payload.clone());
        Ok(DevicePayload {
            login_ids: payload.root_login_ids.clone(),
            ..DevicePayload::default()
        })
    }

    async fn update_login(&self, payload: &LoginUpdatePayload) -> push_client::Result<()> {
        self.check()?;
        self.login_updates.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn login_events(&self) -> push_client::Result<LoginPayload> {
        self.check()?;
        Ok(LoginPayload {
            events: self.statuses.lock().unwrap().clone(),
        })
    }
}
