//! `push-client`: typed client for the push trigger service.
//!
//! The push server watches conditions on behalf of devices that may be
//! offline: address balances, price levels, transaction confirmations. When a
//! trigger fires the server flips the event's `triggered` flag, optionally
//! broadcasts the pre-signed transactions bundled with it, and sends a push
//! message that wakes the device.
//!
//! # Architecture
//!
//! ```text
//! PushEvent { trigger, broadcastTxs, … }
//!     │
//!     ▼
//! PushClient        ← POST /v2/device/update, /v2/login/update, /v2/login
//!     │                per-attempt timeout, exponential backoff on 5xx/429
//!     ▼
//! push server       ← evaluates triggers, fires once, broadcasts txs
//! ```
//!
//! Callers depend on the [`PushApi`] trait so the queue can be exercised
//! against in-memory fakes.

pub mod client;
pub mod error;
pub mod types;

pub use client::{PushApi, PushClient, PushClientConfig, RetryPolicy};
pub use error::PushError;
pub use types::{
    BroadcastTx, DevicePayload, DeviceUpdatePayload, LoginPayload, LoginUpdatePayload,
    PriceChangeRange, PushEvent, PushEventState, PushEventStatus, PushTrigger,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, PushError>;
