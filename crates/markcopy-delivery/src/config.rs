//! Delivery protocol constants and their persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use markcopy_core::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Every tunable of the delivery protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_fast_probe_attempts")]
    pub fast_probe_attempts: u32,
    #[serde(default = "default_fast_probe_interval_ms")]
    pub fast_probe_interval_ms: u64,
    /// Cap on a single probe's wait for an answer.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Cap on the wait for a conversion command's answer.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Cap on the wait for one script injection.
    #[serde(default = "default_inject_timeout_ms")]
    pub inject_timeout_ms: u64,
    #[serde(default = "default_ready_probe_attempts")]
    pub ready_probe_attempts: u32,
    /// Ready probe `i` (from 1) waits `backoff_step_ms * i` first.
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
    /// Slow-path retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Injected in order into every frame.
    #[serde(default = "default_agent_scripts")]
    pub agent_scripts: Vec<String>,
    /// Drop a dispatch to a tab that already has one running.
    #[serde(default)]
    pub coalesce_concurrent: bool,
    /// Path to config file (not serialized).
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_fast_probe_attempts() -> u32 {
    2
}
fn default_fast_probe_interval_ms() -> u64 {
    100
}
fn default_probe_timeout_ms() -> u64 {
    500
}
fn default_command_timeout_ms() -> u64 {
    10_000
}
fn default_inject_timeout_ms() -> u64 {
    5_000
}
fn default_ready_probe_attempts() -> u32 {
    5
}
fn default_backoff_step_ms() -> u64 {
    200
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_agent_scripts() -> Vec<String> {
    [
        "vendor/turndown.js",
        "vendor/turndown-plugin-gfm.js",
        "vendor/readability.js",
        "content.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            fast_probe_attempts: default_fast_probe_attempts(),
            fast_probe_interval_ms: default_fast_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            inject_timeout_ms: default_inject_timeout_ms(),
            ready_probe_attempts: default_ready_probe_attempts(),
            backoff_step_ms: default_backoff_step_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            agent_scripts: default_agent_scripts(),
            coalesce_concurrent: false,
            config_path: PathBuf::new(),
        }
    }
}

impl DeliveryConfig {
    /// Load `delivery.json` from `config_dir`, or return defaults.
    pub fn load(config_dir: &Path) -> Self {
        let config_path = config_dir.join("delivery.json");
        let mut config: DeliveryConfig = std::fs::read_to_string(&config_path)
            .ok()
            .and_then(|s| match serde_json::from_str(&s) {
                Ok(config) => Some(config),
                Err(e) => {
                    debug!("Ignoring malformed {}: {}", config_path.display(), e);
                    None
                }
            })
            .unwrap_or_default();
        config.config_path = config_path;
        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        Ok(())
    }

    /// Total slow-path attempts: the first plus `max_retries`.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn fast_probe_interval(&self) -> Duration {
        Duration::from_millis(self.fast_probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn inject_timeout(&self) -> Duration {
        Duration::from_millis(self.inject_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Wait before ready probe `attempt` (from 1): strictly increasing.
    pub fn ready_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_step_ms.saturating_mul(u64::from(attempt)))
    }
}
