//! Two-stage context selection
//!
//! Stage one shows the model the SDK's file listings with the diff and
//! asks for every file that might matter. Stage two sends each candidate
//! on its own, concurrently, and keeps the ones the model votes to include.

use super::AnalysisError;
use crate::backend_executor::{BackendExecutor, CostTracker, Pricing, PromptRequest, extract_json};
use crate::template::{FilterContextPrompt, PromptEngine, SelectContextPrompt, TreeListing};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Deserialize)]
struct Candidates {
    file_paths: Vec<String>,
}

/// The model's verdict on one candidate file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContextVerdict {
    pub filename: String,
    pub inclusion: bool,
    #[serde(default)]
    pub reasoning: String,
}

/// Shared by both stages
pub(super) struct Selector {
    pub executor: Arc<dyn BackendExecutor>,
    pub prompts: Arc<PromptEngine>,
    pub root: PathBuf,
    pub pricing: Pricing,
    pub max_concurrent: usize,
}

impl Selector {
    /// Stage one: candidate paths, deduplicated, in the model's order
    pub async fn candidates(
        &self,
        git_diff: &str,
        trees: &[TreeListing],
        cost: &mut CostTracker,
    ) -> Result<Vec<String>, AnalysisError> {
        let (system, prompt) = self
            .prompts
            .select_context_prompt(&SelectContextPrompt { git_diff, trees })?;
        let request = PromptRequest::new(prompt)
            .with_system(system)
            .in_dir(&self.root)
            .expecting_json();

        let response = self.executor.execute(&request).await?;
        cost.record(response.usage, &self.pricing);

        let parsed: Candidates = parse_json("context selection", &response.text)?;
        let mut paths: Vec<String> = Vec::with_capacity(parsed.file_paths.len());
        for path in parsed.file_paths {
            let path = path.trim().to_string();
            if !path.is_empty() && !paths.contains(&path) {
                paths.push(path);
            }
        }
        tracing::info!(candidates = paths.len(), model = ?response.model, "context selection stage 1 done");
        Ok(paths)
    }

    /// Stage two: one verdict per readable candidate, in candidate order
    ///
    /// Candidates outside the SDK root or missing on disk are dropped
    /// without a call. A failed call excludes that file.
    pub async fn filter(
        &self,
        git_diff: &str,
        candidates: Vec<String>,
        cost: &mut CostTracker,
    ) -> Vec<ContextVerdict> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));
        let git_diff: Arc<str> = Arc::from(git_diff);
        let mut handles = Vec::with_capacity(candidates.len());

        for path in candidates {
            let Some(content) = self.read_candidate(&path) else {
                continue;
            };
            let executor = self.executor.clone();
            let prompts = self.prompts.clone();
            let semaphore = semaphore.clone();
            let git_diff = git_diff.clone();
            let root = self.root.clone();

            handles.push((
                path.clone(),
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let (system, prompt) = prompts.filter_context_prompt(&FilterContextPrompt {
                        git_diff: &git_diff,
                        file_path: &path,
                        file_content: &content,
                    })?;
                    let request = PromptRequest::new(prompt)
                        .with_system(system)
                        .in_dir(root)
                        .expecting_json();
                    let response = executor.execute(&request).await?;
                    let verdict = parse_json::<ContextVerdict>("context filter", &response.text);
                    Ok::<_, AnalysisError>((response.usage, verdict))
                }),
            ));
        }

        let mut verdicts = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            let (usage, verdict) = match handle.await {
                Ok(Ok(done)) => done,
                Ok(Err(e)) => {
                    tracing::warn!(path = %path, error = %e, "context verdict failed, excluding file");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "context task failed, excluding file");
                    continue;
                }
            };
            cost.record(usage, &self.pricing);

            match verdict {
                Ok(mut verdict) => {
                    // The answer is about the file we sent, whatever name it quotes
                    verdict.filename = path;
                    tracing::debug!(
                        path = %verdict.filename,
                        include = verdict.inclusion,
                        reasoning = %verdict.reasoning,
                        "context verdict"
                    );
                    verdicts.push(verdict);
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "unreadable context verdict, excluding file");
                }
            }
        }

        tracing::info!(
            evaluated = verdicts.len(),
            included = verdicts.iter().filter(|v| v.inclusion).count(),
            "context selection stage 2 done"
        );
        verdicts
    }

    /// Contents of a candidate inside the root, if it can be read
    pub fn read_candidate(&self, path: &str) -> Option<String> {
        let relative = Path::new(path);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            tracing::warn!(path, "context candidate outside the SDK root, skipping");
            return None;
        }

        match std::fs::read_to_string(self.root.join(relative)) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(path, error = %e, "context candidate unreadable, skipping");
                None
            }
        }
    }
}

/// Deserialize the JSON a model answered with
pub(super) fn parse_json<T: serde::de::DeserializeOwned>(
    stage: &'static str,
    text: &str,
) -> Result<T, AnalysisError> {
    let value = extract_json(text).ok_or_else(|| AnalysisError::Malformed {
        stage,
        message: "no JSON object in the response".into(),
    })?;
    serde_json::from_value(value).map_err(|e| AnalysisError::Malformed {
        stage,
        message: e.to_string(),
    })
}
