//! What goes to a model and what comes back

use async_trait::async_trait;
use std::ops::AddAssign;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("provider is rate limiting requests (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("credentials rejected: {0}")]
    Auth(String),

    /// The provider refused the request itself (bad model name, oversized prompt)
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unreadable response: {0}")]
    Malformed(String),

    #[error("backend exited with status {code:?}: {stderr}")]
    Exited { code: Option<i32>, stderr: String },

    #[error("cannot run backend: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Sending the same prompt again may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout(_) | BackendError::RateLimited { .. } | BackendError::Transport(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BackendError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Shape of the answer a caller expects
///
/// Analysis stages want a JSON object; patch prompts ask for JSON in the
/// prompt text, and regeneration wants a bare file body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub prompt: String,
    pub system: Option<String>,
    /// Directory CLI backends run in, normally the SDK root
    pub working_dir: Option<PathBuf>,
    pub format: ResponseFormat,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            working_dir: None,
            format: ResponseFormat::Text,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn expecting_json(mut self) -> Self {
        self.format = ResponseFormat::Json;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub text: String,
    /// Model the provider reports having used
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
    pub elapsed: Duration,
}

impl ModelResponse {
    pub fn new(text: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            text: text.into(),
            model: None,
            usage: None,
            elapsed,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Tokens billed for one or more calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// A model the pipeline can prompt
#[async_trait]
pub trait BackendExecutor: Send + Sync {
    async fn execute(&self, request: &PromptRequest) -> Result<ModelResponse, BackendError>;

    fn name(&self) -> &str;

    /// Cheap reachability check used by `doctor`
    async fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(BackendError::Timeout(Duration::from_secs(30)).is_transient());
        assert!(BackendError::RateLimited { retry_after: None }.is_transient());
        assert!(BackendError::Transport("connection reset".into()).is_transient());

        assert!(!BackendError::Auth("invalid token".into()).is_transient());
        assert!(!BackendError::Malformed("not json".into()).is_transient());
        assert!(!BackendError::Rejected("unknown model".into()).is_transient());
        assert!(
            !BackendError::Exited {
                code: Some(1),
                stderr: "boom".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::Exited {
            code: Some(2),
            stderr: "usage".into(),
        };
        assert_eq!(err.to_string(), "backend exited with status Some(2): usage");
        assert!(BackendError::Timeout(Duration::from_secs(5)).to_string().contains("5s"));
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage::new(10, 5);
        total += TokenUsage::new(1, 2);
        assert_eq!(total, TokenUsage::new(11, 7));
        assert_eq!(total.total(), 18);
    }

    #[test]
    fn test_prompt_request_builder() {
        let request = PromptRequest::new("list the files")
            .with_system("you select context")
            .in_dir("/sdk")
            .expecting_json();

        assert_eq!(request.format, ResponseFormat::Json);
        assert_eq!(request.system.as_deref(), Some("you select context"));
        assert_eq!(request.working_dir, Some(PathBuf::from("/sdk")));
        assert_eq!(PromptRequest::new("x").format, ResponseFormat::Text);
    }

    #[test]
    fn test_model_response_builder() {
        let response = ModelResponse::new("{}", Duration::from_millis(20))
            .with_model("gemini-2.5-flash")
            .with_usage(TokenUsage::new(1200, 300));

        assert_eq!(response.model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(response.usage.map(|u| u.total()), Some(1500));
    }
}
