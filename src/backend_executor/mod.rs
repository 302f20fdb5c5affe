//! Model backends
//!
//! A backend is either a model CLI run as a subprocess or an
//! OpenAI-compatible HTTP endpoint. [`connect`] picks one from a
//! `[backends.<name>]` table and wraps it in transient-error retry.

mod cli_backend;
mod cost;
mod http_backend;
mod output_parser;
mod retry;
#[cfg(test)]
pub(crate) mod scripted;
pub(crate) mod types;

pub use cost::{CostTracker, Pricing};
pub use output_parser::{extract_json, strip_code_fences};
pub use types::{BackendError, BackendExecutor, ModelResponse, PromptRequest};

use crate::config::BackendConfig;
use cli_backend::CliBackend;
use http_backend::HttpBackend;
use retry::{RetryExecutor, RetryPolicy};
use std::sync::Arc;

/// Build the executor a backend table describes
pub fn connect(name: &str, config: &BackendConfig) -> Arc<dyn BackendExecutor> {
    let backend: Arc<dyn BackendExecutor> = if config.is_http() {
        Arc::new(HttpBackend::new(name, config))
    } else {
        Arc::new(CliBackend::new(name, config))
    };

    if config.retry.max_retries == 0 {
        return backend;
    }
    Arc::new(RetryExecutor::new(
        backend,
        RetryPolicy::from_settings(&config.retry),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrySettings;

    #[test]
    fn test_connect_cli_backend() {
        let config = BackendConfig {
            command: "gemini".into(),
            ..Default::default()
        };
        assert_eq!(connect("gemini", &config).name(), "gemini");
    }

    #[test]
    fn test_connect_http_backend_without_retry() {
        let config = BackendConfig {
            command: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            retry: RetrySettings {
                max_retries: 0,
                delay_ms: 0,
            },
            ..Default::default()
        };
        assert_eq!(connect("flash", &config).name(), "flash");
    }

    #[tokio::test]
    async fn test_connected_cli_backend_answers() {
        let config = BackendConfig {
            command: "echo".into(),
            ..Default::default()
        };
        let response = connect("echo", &config)
            .execute(&PromptRequest::new("ready"))
            .await
            .unwrap();
        assert_eq!(response.text.trim(), "ready");
    }
}
