use base64::Engine as _;
use serde::{Deserialize, Serialize};

// ─── Triggers ─────────────────────────────────────────────────────────────

/// A watch condition the push server evaluates on our behalf.
/// Discriminated by the JSON `"type"` field.
///
/// Triggers are addressed by `pluginId` rather than wallet id because the
/// server has no notion of wallets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushTrigger {
    #[serde(rename_all = "camelCase")]
    AddressBalance {
        plugin_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        above_amount: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        below_amount: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    PriceLevel {
        currency_pair: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        above_rate: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        below_rate: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    TxConfirm {
        plugin_id: String,
        confirmations: u32,
        txid: String,
    },
    /// Market alerts. Never produced from an action program, but the server
    /// reports them alongside program events.
    #[serde(rename_all = "camelCase")]
    PriceChange {
        plugin_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        above_ratio: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        below_ratio: Option<f64>,
        range: PriceChangeRange,
    },
}

impl PushTrigger {
    pub fn type_name(&self) -> &'static str {
        match self {
            PushTrigger::AddressBalance { .. } => "address-balance",
            PushTrigger::PriceLevel { .. } => "price-level",
            PushTrigger::TxConfirm { .. } => "tx-confirm",
            PushTrigger::PriceChange { .. } => "price-change",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceChangeRange {
    Hourly,
    Daily,
}

// ─── Events ───────────────────────────────────────────────────────────────

/// A pre-signed transaction the server submits by itself once the paired
/// trigger fires. `rawTx` travels hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastTx {
    pub plugin_id: String,
    #[serde(with = "hex::serde")]
    pub raw_tx: Vec<u8>,
}

/// The unit registered with the push server: one trigger plus whatever the
/// server should do when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    pub event_id: String,
    pub trigger: PushTrigger,
    /// Flipped by the server, exactly once. Clients always send `false`.
    pub triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub broadcast_txs: Vec<BroadcastTx>,
}

impl PushEvent {
    pub fn new(event_id: impl Into<String>, trigger: PushTrigger) -> Self {
        Self {
            event_id: event_id.into(),
            trigger,
            triggered: false,
            push_message: None,
            push_payload: None,
            broadcast_txs: Vec::new(),
        }
    }
}

/// Server-side lifecycle of a registered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushEventState {
    Waiting,
    Triggered,
    Cancelled,
    Complete,
    Hidden,
}

/// Status of one event as reported by `POST /v2/login`.
///
/// The trigger is kept as raw JSON: the server may hold trigger kinds this
/// client never registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEventStatus {
    pub event_id: String,
    #[serde(default)]
    pub trigger: serde_json::Value,
    pub state: PushEventState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_tx_errors: Option<Vec<Option<String>>>,
}

impl PushEventStatus {
    /// Non-null broadcast errors reported by the server, if any.
    pub fn broadcast_errors(&self) -> Vec<&str> {
        self.broadcast_tx_errors
            .iter()
            .flatten()
            .filter_map(|e| e.as_deref())
            .collect()
    }
}

// ─── Request / response payloads ──────────────────────────────────────────

/// `POST /v2/device/update`: device identity plus its interest set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdatePayload {
    /// base64-encoded root login ids of every account on this device.
    pub root_login_ids: Vec<String>,
    pub events: Vec<PushEvent>,
    pub device_token: String,
}

impl DeviceUpdatePayload {
    pub fn new(root_login_ids: &[Vec<u8>], events: Vec<PushEvent>, device_token: &str) -> Self {
        Self {
            root_login_ids: root_login_ids.iter().map(|id| encode_login_id(id)).collect(),
            events,
            device_token: device_token.to_string(),
        }
    }
}

/// `POST /v2/login/update`: create new events and retire fired or
/// abandoned ones in a single call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUpdatePayload {
    pub events: Vec<PushEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_events: Vec<String>,
}

impl LoginUpdatePayload {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.remove_events.is_empty()
    }
}

/// Response of `POST /v2/device/update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePayload {
    #[serde(default)]
    pub login_ids: Vec<String>,
    #[serde(default)]
    pub events: Vec<PushEventStatus>,
    #[serde(default)]
    pub ignore_marketing: bool,
    #[serde(default)]
    pub ignore_price_changes: bool,
}

/// Response of `POST /v2/login`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    #[serde(default)]
    pub events: Vec<PushEventStatus>,
}

pub fn encode_login_id(raw: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(raw)
}

/// Returns `None` when `encoded` is not valid base64.
pub fn decode_login_id(encoded: &str) -> Option<Vec<u8>> {
    base64::engine::general_purpose::STANDARD.decode(encoded).ok()
}

// ─── Tests ────────────────────────────────────────────────────────────────
