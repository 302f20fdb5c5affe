//! OpenAI-compatible chat completion backend

use super::types::{
    BackendError, BackendExecutor, ModelResponse, PromptRequest, ResponseFormat, TokenUsage,
};
use crate::config::BackendConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Chat completion client for Gemini's OpenAI endpoint and compatibles
///
/// Every call runs at temperature 0, so two attempts on the same file
/// differ only by the feedback they carry.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl HttpBackend {
    pub fn new(name: impl Into<String>, config: &BackendConfig) -> Self {
        let timeout = config.timeout();
        Self {
            name: name.into(),
            endpoint: config.command.trim_end_matches('/').to_string(),
            api_key: config.api_key(),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn body<'a>(&'a self, request: &'a PromptRequest) -> ChatBody<'a> {
        let system = request.system.as_deref().map(|content| ChatMessage {
            role: "system",
            content,
        });
        let user = ChatMessage {
            role: "user",
            content: &request.prompt,
        };

        ChatBody {
            model: &self.model,
            messages: system.into_iter().chain(std::iter::once(user)).collect(),
            temperature: 0.0,
            response_format: (request.format == ResponseFormat::Json)
                .then(|| json!({ "type": "json_object" })),
        }
    }

    fn status_error(&self, status: StatusCode, body: &str) -> BackendError {
        let detail = format!("HTTP {}: {}", status, body.trim());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Auth(detail),
            StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited {
                retry_after: retry_after_secs(body),
            },
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                BackendError::Timeout(self.timeout)
            }
            s if s.is_client_error() => BackendError::Rejected(detail),
            _ => BackendError::Transport(detail),
        }
    }
}

/// `retry_after` seconds from a JSON error body, when the provider sends one
fn retry_after_secs(body: &str) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("retry_after")
        .and_then(serde_json::Value::as_f64)
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

fn reply_into_response(reply: ChatReply, fallback_model: &str, elapsed: Duration) -> ModelResponse {
    let text = reply
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .unwrap_or_default();

    let mut response = ModelResponse::new(text, elapsed)
        .with_model(reply.model.unwrap_or_else(|| fallback_model.to_string()));
    if let Some(usage) = reply.usage {
        response = response.with_usage(TokenUsage::new(usage.prompt_tokens, usage.completion_tokens));
    }
    response
}

#[async_trait]
impl BackendExecutor for HttpBackend {
    async fn execute(&self, request: &PromptRequest) -> Result<ModelResponse, BackendError> {
        let start = Instant::now();

        let mut call = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&self.body(request));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout)
            } else {
                BackendError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.status_error(status, &body));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        let response = reply_into_response(reply, &self.model, start.elapsed());
        tracing::debug!(
            backend = %self.name,
            model = ?response.model,
            tokens = ?response.usage.map(|u| u.total()),
            elapsed_ms = response.elapsed.as_millis() as u64,
            "completion received"
        );
        Ok(response)
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        let mut check = self
            .client
            .get(format!("{}/models", self.endpoint))
            .timeout(Duration::from_secs(5));
        if let Some(key) = &self.api_key {
            check = check.bearer_auth(key);
        }
        matches!(check.send().await, Ok(r) if r.status().is_success())
    }
}
