//! `[backends.<name>]` tables

use crate::backend_executor::Pricing;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One model backend
///
/// `command` is either a CLI program (`gemini`, `claude`) that takes the
/// prompt as its last argument or on stdin, or the base URL of an
/// OpenAI-compatible API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// Seconds allowed per model call
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,

    pub model: Option<String>,

    /// Variable holding the API key, e.g. `GOOGLE_API_KEY`
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub prompt_stdin: bool,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub pricing: Pricing,
}

/// `[backends.<name>.retry]`: transient failures only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles per retry
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    1000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            enabled: true,
            timeout: default_timeout_secs(),
            model: None,
            api_key_env: None,
            env: BTreeMap::new(),
            prompt_stdin: false,
            retry: RetrySettings::default(),
            pricing: Pricing::default(),
        }
    }
}

impl BackendConfig {
    pub fn is_http(&self) -> bool {
        self.command.starts_with("http://") || self.command.starts_with("https://")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// The API key, if the named variable is set and non-empty
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env.as_deref()?;
        std::env::var(var).ok().filter(|key| !key.is_empty())
    }
}
