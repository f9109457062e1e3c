use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use push_client::{types::decode_login_id, PushClientConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};
use crate::paths;
use crate::queue::{DeviceIdentity, QueueOptions};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PushConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_base_url() -> String {
    "https://push.example.invalid".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// DeviceConfig / NotificationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_token: String,
    /// base64-encoded.
    #[serde(default)]
    pub root_login_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_body")]
    pub body: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
        }
    }
}

fn default_title() -> String {
    "Action complete".to_string()
}

fn default_body() -> String {
    "Open the app to continue".to_string()
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_max_inline_delay_ms")]
    pub max_inline_delay_ms: u64,
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    /// walletId → pluginId, for tools that run without a wallet engine.
    #[serde(default)]
    pub wallets: BTreeMap<String, String>,
}

fn default_version() -> u32 {
    1
}

fn default_store_path() -> String {
    paths::STORE_FILE.to_string()
}

fn default_max_steps() -> usize {
    64
}

fn default_max_inline_delay_ms() -> u64 {
    5_000
}

fn default_lock_ttl_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            store_path: default_store_path(),
            max_steps: default_max_steps(),
            max_inline_delay_ms: default_max_inline_delay_ms(),
            lock_ttl_secs: default_lock_ttl_secs(),
            push: PushConfig::default(),
            device: DeviceConfig::default(),
            notification: NotificationConfig::default(),
            wallets: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(QueueError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn store_path(&self, root: &Path) -> PathBuf {
        paths::store_path(root, &self.store_path)
    }

    pub fn max_inline_delay(&self) -> Duration {
        Duration::from_millis(self.max_inline_delay_ms)
    }

    pub fn push_message(&self) -> String {
        format!("{}: {}", self.notification.title, self.notification.body)
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            max_steps: self.max_steps,
            lock_ttl: Duration::from_secs(self.lock_ttl_secs),
            push_message: Some(self.push_message()),
        }
    }

    pub fn push_client_config(&self) -> PushClientConfig {
        let retry = &self.push.retry;
        PushClientConfig {
            api_key: self.push.api_key.clone(),
            device_id: non_empty(&self.device.device_id),
            login_id: self.device.root_login_ids.first().cloned(),
            timeout: Duration::from_secs(self.push.request_timeout_secs),
            retry: RetryPolicy {
                max_attempts: retry.max_attempts,
                initial_delay: Duration::from_millis(retry.initial_delay_ms),
                max_delay: Duration::from_millis(retry.max_delay_ms),
                backoff_multiplier: retry.backoff_multiplier,
            },
            ..PushClientConfig::new(self.push.base_url.clone())
        }
    }

    /// `None` when no device token is configured.
    pub fn device_identity(&self) -> Result<Option<DeviceIdentity>> {
        if self.device.device_token.is_empty() {
            return Ok(None);
        }
        let root_login_ids = self
            .device
            .root_login_ids
            .iter()
            .map(|id| {
                decode_login_id(id)
                    .ok_or_else(|| QueueError::Config(format!("root login id '{id}' is not base64")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(DeviceIdentity {
            device_token: self.device.device_token.clone(),
            root_login_ids,
        }))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.push.base_url.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "push.base_url is empty".to_string(),
            });
        }

        if self.push.retry.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "push.retry.max_attempts is 0; requests are still tried once".to_string(),
            });
        }

        if self.max_steps == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "max_steps is 0; programs would never advance".to_string(),
            });
        }

        for id in &self.device.root_login_ids {
            if decode_login_id(id).is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("device.root_login_ids entry '{id}' is not base64"),
                });
            }
        }

        if !self.device.device_token.is_empty() && self.device.root_login_ids.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "device.device_token is set but device.root_login_ids is empty"
                    .to_string(),
            });
        }

        warnings
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
