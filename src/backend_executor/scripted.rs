//! Canned backend for tests

use super::types::{BackendError, BackendExecutor, ModelResponse, PromptRequest, TokenUsage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Replays canned responses in order and records every prompt
///
/// Each answer reports 1000 input and 100 output tokens.
pub(crate) struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, BackendError>>>,
    pub prompts: Mutex<Vec<PromptRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new(responses: Vec<Result<String, BackendError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn ok(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }
}

#[async_trait]
impl BackendExecutor for ScriptedBackend {
    async fn execute(&self, request: &PromptRequest) -> Result<ModelResponse, BackendError> {
        self.prompts.lock().unwrap().push(request.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Malformed("script exhausted".into())));
        next.map(|text| {
            ModelResponse::new(text, Duration::from_millis(1)).with_usage(TokenUsage::new(1000, 100))
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
