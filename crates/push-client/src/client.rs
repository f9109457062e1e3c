use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::types::{DevicePayload, DeviceUpdatePayload, LoginPayload, LoginUpdatePayload};
use crate::{PushError, Result};

const DEVICE_UPDATE_PATH: &str = "/v2/device/update";
const LOGIN_UPDATE_PATH: &str = "/v2/login/update";
const LOGIN_PATH: &str = "/v2/login";

// ─── PushApi ──────────────────────────────────────────────────────────────

/// The remote trigger service, as seen by the action queue.
///
/// [`PushClient`] is the HTTP implementation; tests substitute in-memory
/// fakes.
#[async_trait]
pub trait PushApi: Send + Sync {
    /// Register device identity and its full interest set.
    async fn update_device(&self, payload: &DeviceUpdatePayload) -> Result<DevicePayload>;

    /// Create and retire events for the current login.
    async fn update_login(&self, payload: &LoginUpdatePayload) -> Result<()>;

    /// Fetch the server-side status of every event for the current login.
    async fn login_events(&self) -> Result<LoginPayload>;
}

// ─── RetryPolicy ──────────────────────────────────────────────────────────

/// Exponential backoff between attempts of one request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.max_delay)
    }
}

// ─── PushClient ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PushClientConfig {
    /// Server origin, e.g. `https://push.example.com`. No trailing path.
    pub base_url: String,
    pub api_key: Option<String>,
    pub device_id: Option<String>,
    /// base64 root login id the login endpoints act on.
    pub login_id: Option<String>,
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl PushClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            device_id: None,
            login_id: None,
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP client for the push trigger service.
pub struct PushClient {
    http: reqwest::Client,
    config: PushClientConfig,
}

impl PushClient {
    pub fn new(config: PushClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(PushError::Config("base_url is empty".into()));
        }
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// POST `body` to `path`, retrying retryable failures with backoff.
    /// Returns the raw response body of the first successful attempt.
    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<String> {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.post_once(path, body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.retry.delay_after(attempt);
                    tracing::warn!(
                        path,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "push request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<String> {
        let mut req = self.http.post(self.url(path)).json(body);
        if let Some(key) = &self.config.api_key {
            req = req.header("X-Api-Key", key);
        }
        if let Some(device_id) = &self.config.device_id {
            req = req.header("X-Device-Id", device_id);
        }
        if let Some(login_id) = &self.config.login_id {
            req = req.header("X-Login-Id", login_id);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(PushError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        tracing::debug!(path, status = status.as_u16(), "push request ok");
        Ok(text)
    }

    fn parse<T: DeserializeOwned + Default>(path: &str, text: &str) -> Result<T> {
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(text).map_err(|source| PushError::Parse {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl PushApi for PushClient {
    async fn update_device(&self, payload: &DeviceUpdatePayload) -> Result<DevicePayload> {
        let text = self.post(DEVICE_UPDATE_PATH, payload).await?;
        Self::parse(DEVICE_UPDATE_PATH, &text)
    }

    async fn update_login(&self, payload: &LoginUpdatePayload) -> Result<()> {
        self.post(LOGIN_UPDATE_PATH, payload).await?;
        Ok(())
    }

    async fn login_events(&self) -> Result<LoginPayload> {
        let text = self.post(LOGIN_PATH, &serde_json::json!({})).await?;
        Self::parse(LOGIN_PATH, &text)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
