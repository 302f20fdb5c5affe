//! One file's trip through patching, with regeneration as the fallback

use super::plan::FileChange;
use crate::backend_executor::{
    BackendError, BackendExecutor, CostTracker, ModelResponse, Pricing, PromptRequest,
    strip_code_fences,
};
use crate::patch::{EditRequest, FilePatcher, PatchError, PatchOutcome};
use crate::template::{
    AttemptFeedback, CreatePrompt, PatchPrompt, PromptEngine, RegeneratePrompt, TemplateError,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("prompt error: {0}")]
    Template(#[from] TemplateError),

    #[error("{0}")]
    Patch(#[from] PatchError),

    #[error("backend returned no file content")]
    EmptyOutput,
}

/// How a file ended up updated
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum UpdateStrategy {
    Patched { patches_applied: usize },
    Regenerated { reason: String },
    Created,
    Failed { error: String },
}

impl UpdateStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            UpdateStrategy::Patched { .. } => "patched",
            UpdateStrategy::Regenerated { .. } => "regenerated",
            UpdateStrategy::Created => "created",
            UpdateStrategy::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileUpdateResult {
    pub path: PathBuf,
    #[serde(flatten)]
    pub strategy: UpdateStrategy,
    /// Patch attempts made; zero for created files
    pub attempts: u32,
    pub written_to: Option<PathBuf>,
    pub cost: CostTracker,
    pub duration: Duration,
}

impl FileUpdateResult {
    pub fn is_success(&self) -> bool {
        !matches!(self.strategy, UpdateStrategy::Failed { .. })
    }
}

/// Why the patch loop gave up
enum PatchAbandoned {
    Reason(String),
    Fatal(SessionError),
}

/// Drives the backend for one file at a time
///
/// Patching existing files goes through the attempt loop; each failed
/// attempt's report is fed back into the next prompt. When the loop ends
/// without success the file is regenerated whole.
pub struct FileSession {
    executor: Arc<dyn BackendExecutor>,
    prompts: Arc<PromptEngine>,
    patcher: FilePatcher,
    pricing: Pricing,
}

impl FileSession {
    pub fn new(
        executor: Arc<dyn BackendExecutor>,
        prompts: Arc<PromptEngine>,
        patcher: FilePatcher,
        pricing: Pricing,
    ) -> Self {
        Self {
            executor,
            prompts,
            patcher,
            pricing,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.executor.name()
    }

    /// Run a change on top of `base`, the output an earlier change to the
    /// same path already wrote
    ///
    /// With a base the change always patches: the file exists by now even
    /// if the plan flagged it for creation.
    pub async fn run_on(&self, change: &FileChange, base: Option<&Path>) -> FileUpdateResult {
        let start = Instant::now();
        let mut cost = CostTracker::new();
        let mut attempts = 0;

        let outcome = if change.requires_creation && base.is_none() {
            self.create(change, &mut cost).await
        } else {
            self.update(change, base, &mut cost, &mut attempts).await
        };

        let (strategy, written_to) = match outcome {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(path = %change.path.display(), error = %e, "file update failed");
                (UpdateStrategy::Failed { error: e.to_string() }, None)
            }
        };

        tracing::info!(
            path = %change.path.display(),
            strategy = strategy.label(),
            attempts,
            cost_usd = cost.cost_usd,
            "file done"
        );

        FileUpdateResult {
            path: change.path.clone(),
            strategy,
            attempts,
            written_to,
            cost,
            duration: start.elapsed(),
        }
    }

    async fn update(
        &self,
        change: &FileChange,
        base: Option<&Path>,
        cost: &mut CostTracker,
        attempts: &mut u32,
    ) -> Result<(UpdateStrategy, Option<PathBuf>), SessionError> {
        let existing = self.patcher.read(base.unwrap_or(&change.path))?;

        match self.patch_loop(change, base, &existing, cost, attempts).await {
            Ok(done) => Ok(done),
            Err(PatchAbandoned::Fatal(e)) => Err(e),
            Err(PatchAbandoned::Reason(reason)) => {
                tracing::warn!(
                    path = %change.path.display(),
                    %reason,
                    "patching abandoned, regenerating file"
                );
                self.regenerate(change, &existing, reason, cost).await
            }
        }
    }

    async fn patch_loop(
        &self,
        change: &FileChange,
        base: Option<&Path>,
        existing: &str,
        cost: &mut CostTracker,
        attempts: &mut u32,
    ) -> Result<(UpdateStrategy, Option<PathBuf>), PatchAbandoned> {
        let file_path = display_path(&change.path);
        let max_attempts = self.patcher.engine().max_attempts();
        let system = self
            .prompts
            .system_prompt()
            .map_err(|e| PatchAbandoned::Fatal(e.into()))?;
        let mut history: Vec<AttemptFeedback> = Vec::new();

        loop {
            *attempts += 1;
            let attempt = *attempts;

            let prompt = self
                .prompts
                .patch_prompt(&PatchPrompt {
                    file_path: &file_path,
                    implementation_detail: &change.implementation_detail,
                    existing_file_content: existing,
                    max_attempts,
                    history: &history,
                })
                .map_err(|e| PatchAbandoned::Fatal(e.into()))?;

            let response = self
                .call(prompt, Some(&system), cost)
                .await
                .map_err(|e| PatchAbandoned::Reason(format!("backend error: {}", e)))?;

            let request = EditRequest::from_model_output(&response.text)
                .map_err(|e| PatchAbandoned::Reason(format!("unparseable patch output: {}", e)))?;

            let applied = self.patcher.apply_from(&change.path, base, &request, attempt);
            tracing::debug!(
                path = %file_path,
                attempt,
                pairs = ?request.pair_count(),
                state = ?applied.outcome.state(),
                "patch attempt settled"
            );

            // Read and write failures end the session
            if let Some(error) = applied.outcome.error().filter(|e| !e.is_request_error()) {
                return Err(PatchAbandoned::Fatal(error.clone().into()));
            }

            match applied.outcome {
                PatchOutcome::Applied(patched) => {
                    return Ok((
                        UpdateStrategy::Patched {
                            patches_applied: patched.patches_applied,
                        },
                        applied.written_to,
                    ));
                }
                PatchOutcome::Recoverable { .. } => {
                    let result = serde_json::to_string(&applied.report)
                        .unwrap_or_else(|_| format!("{:?}", applied.report));
                    tracing::debug!(path = %file_path, attempt, %result, "feeding back patch report");
                    history.push(AttemptFeedback {
                        attempt,
                        request: response.text,
                        result,
                    });
                }
                PatchOutcome::Terminal { max_attempts, .. } => {
                    return Err(PatchAbandoned::Reason(format!(
                        "maximum attempts ({}) exceeded",
                        max_attempts
                    )));
                }
            }
        }
    }

    async fn regenerate(
        &self,
        change: &FileChange,
        existing: &str,
        reason: String,
        cost: &mut CostTracker,
    ) -> Result<(UpdateStrategy, Option<PathBuf>), SessionError> {
        let file_path = display_path(&change.path);
        let prompt = self.prompts.regenerate_prompt(&RegeneratePrompt {
            file_path: &file_path,
            implementation_detail: &change.implementation_detail,
            existing_file_content: existing,
            reason: &reason,
        })?;

        let written = self.generate_into(&change.path, prompt, cost).await?;
        Ok((UpdateStrategy::Regenerated { reason }, Some(written)))
    }

    async fn create(
        &self,
        change: &FileChange,
        cost: &mut CostTracker,
    ) -> Result<(UpdateStrategy, Option<PathBuf>), SessionError> {
        let file_path = display_path(&change.path);
        let prompt = self.prompts.create_prompt(&CreatePrompt {
            file_path: &file_path,
            implementation_detail: &change.implementation_detail,
        })?;

        let written = self.generate_into(&change.path, prompt, cost).await?;
        Ok((UpdateStrategy::Created, Some(written)))
    }

    /// Ask for a whole file and write it out
    async fn generate_into(
        &self,
        path: &Path,
        prompt: String,
        cost: &mut CostTracker,
    ) -> Result<PathBuf, SessionError> {
        let response = self.call(prompt, None, cost).await?;
        let content = strip_code_fences(&response.text);
        if content.trim().is_empty() {
            return Err(SessionError::EmptyOutput);
        }
        Ok(self.patcher.write(path, &content)?)
    }

    async fn call(
        &self,
        prompt: String,
        system: Option<&str>,
        cost: &mut CostTracker,
    ) -> Result<ModelResponse, BackendError> {
        let mut request = PromptRequest::new(prompt).in_dir(self.patcher.root());
        if let Some(system) = system {
            request = request.with_system(system);
        }

        let response = self.executor.execute(&request).await?;
        cost.record(response.usage, &self.pricing);
        Ok(response)
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
