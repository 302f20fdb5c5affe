//! From an interface diff to a change plan
//!
//! Analysis runs in three model stages over one diff of the generated
//! interface code:
//!
//! 1. context selection picks candidate files from the SDK listings
//! 2. each candidate gets its own include/exclude verdict, concurrently
//! 3. diff analysis reads the included files and writes one instruction per
//!    file to change or create
//!
//! The result is a [`ChangePlan`] the updater can run directly.

mod context;
mod diff;
mod tree;

pub use context::ContextVerdict;
pub use diff::read_diff;

use crate::backend_executor::{
    BackendError, BackendExecutor, CostTracker, Pricing, PromptRequest,
};
use crate::config::AnalysisConfig;
use crate::template::{AnalyzeDiffPrompt, ContextFile, PromptEngine, TemplateError};
use crate::updater::{ChangePlan, PlanError};
use context::{Selector, parse_json};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("git diff failed (status {status:?}): {stderr}")]
    Git { status: Option<i32>, stderr: String },

    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("prompt error: {0}")]
    Template(#[from] TemplateError),

    #[error("unusable {stage} answer: {message}")]
    Malformed { stage: &'static str, message: String },

    #[error(transparent)]
    Plan(#[from] PlanError),
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub plan: ChangePlan,
    /// Verdicts for every candidate that was evaluated
    pub context: Vec<ContextVerdict>,
    pub candidates: usize,
    pub cost: CostTracker,
    pub duration: Duration,
}

impl Analysis {
    pub fn included(&self) -> impl Iterator<Item = &ContextVerdict> {
        self.context.iter().filter(|v| v.inclusion)
    }
}

pub struct Analyzer {
    selector: Selector,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(
        executor: Arc<dyn BackendExecutor>,
        prompts: Arc<PromptEngine>,
        root: &Path,
        config: AnalysisConfig,
        pricing: Pricing,
    ) -> Self {
        Self {
            selector: Selector {
                executor,
                prompts,
                root: root.to_path_buf(),
                pricing,
                max_concurrent: config.max_concurrent,
            },
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Diff of the generated code between two revisions of the SDK
    pub async fn git_diff(&self, base: &str, head: &str) -> Result<String, AnalysisError> {
        diff::git_diff(&self.selector.root, &self.config, base, head).await
    }

    /// Run all three stages over `git_diff`
    ///
    /// A blank diff yields an empty plan without calling the backend.
    pub async fn analyze(&self, git_diff: &str) -> Result<Analysis, AnalysisError> {
        let start = Instant::now();
        let mut cost = CostTracker::new();

        if git_diff.trim().is_empty() {
            tracing::info!("no interface changes in the diff, nothing to analyze");
            return Ok(Analysis {
                plan: ChangePlan::default(),
                context: Vec::new(),
                candidates: 0,
                cost,
                duration: start.elapsed(),
            });
        }

        let root = &self.selector.root;
        let trees: Vec<_> = self
            .config
            .tree_dirs
            .iter()
            .filter_map(|dir| {
                let tree = tree::list_tree(root, dir);
                if tree.is_none() {
                    tracing::warn!(dir = %dir, "listing directory missing, skipping");
                }
                tree
            })
            .collect();

        let candidates = self.selector.candidates(git_diff, &trees, &mut cost).await?;
        let candidate_count = candidates.len();
        let context = self.selector.filter(git_diff, candidates, &mut cost).await;

        let context_files: Vec<ContextFile> = context
            .iter()
            .filter(|v| v.inclusion)
            .filter_map(|v| {
                self.selector.read_candidate(&v.filename).map(|content| ContextFile {
                    path: v.filename.clone(),
                    content,
                })
            })
            .collect();

        let plan = self.analyze_diff(git_diff, &context_files, &mut cost).await?;

        tracing::info!(
            candidates = candidate_count,
            included = context_files.len(),
            files = plan.files_to_update.len(),
            cost_usd = cost.cost_usd,
            "analysis finished"
        );

        Ok(Analysis {
            plan,
            context,
            candidates: candidate_count,
            cost,
            duration: start.elapsed(),
        })
    }

    async fn analyze_diff(
        &self,
        git_diff: &str,
        context_files: &[ContextFile],
        cost: &mut CostTracker,
    ) -> Result<ChangePlan, AnalysisError> {
        let (system, prompt) = self
            .selector
            .prompts
            .analyze_diff_prompt(&AnalyzeDiffPrompt {
                git_diff,
                context_files,
            })?;
        let request = PromptRequest::new(prompt)
            .with_system(system)
            .in_dir(&self.selector.root)
            .expecting_json();

        let response = self.selector.executor.execute(&request).await?;
        cost.record(response.usage, &self.selector.pricing);

        let plan: ChangePlan = parse_json("diff analysis", &response.text)?;
        plan.check()?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend_executor::scripted::ScriptedBackend;
    use tempfile::TempDir;

    fn analyzer(root: &Path, backend: Arc<ScriptedBackend>) -> Analyzer {
        Analyzer::new(
            backend,
            Arc::new(PromptEngine::new().unwrap()),
            root,
            AnalysisConfig {
                max_concurrent: 1,
                ..Default::default()
            },
            Pricing::new(1.0, 10.0),
        )
    }

    fn sdk() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/viam/components/arm")).unwrap();
        std::fs::create_dir_all(root.join("tests")).unwrap();
        std::fs::write(root.join("src/viam/components/arm/arm.py"), "class Arm: ...\n").unwrap();
        std::fs::write(root.join("tests/test_arm.py"), "def test_arm(): ...\n").unwrap();
        dir
    }

    const PLAN: &str = r#"{
        "files_to_update": ["src/viam/components/arm/arm.py"],
        "implementation_details": ["Add an abstract stop() method"],
        "create_new_files": [false]
    }"#;

    #[tokio::test]
    async fn test_blank_diff_makes_no_calls() {
        let dir = sdk();
        let backend = Arc::new(ScriptedBackend::ok(&[]));

        let analysis = analyzer(dir.path(), backend.clone()).analyze("\n  \n").await.unwrap();
        assert!(analysis.plan.is_empty());
        assert_eq!(analysis.cost.calls, 0);
        assert!(backend.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_three_stages_produce_plan() {
        let dir = sdk();
        let backend = Arc::new(ScriptedBackend::ok(&[
            r#"{"file_paths": ["src/viam/components/arm/arm.py", "tests/test_arm.py"]}"#,
            r#"{"filename": "src/viam/components/arm/arm.py", "inclusion": true, "reasoning": "the arm"}"#,
            r#"{"filename": "tests/test_arm.py", "inclusion": false, "reasoning": "unrelated"}"#,
            PLAN,
        ]));

        let analysis = analyzer(dir.path(), backend.clone())
            .analyze("+    rpc Stop(StopRequest) returns (StopResponse);")
            .await
            .unwrap();

        assert_eq!(analysis.candidates, 2);
        assert_eq!(analysis.context.len(), 2);
        assert_eq!(analysis.included().count(), 1);
        assert_eq!(analysis.cost.calls, 4);
        assert_eq!(analysis.plan.requires_creation, vec![false]);

        let changes = analysis.plan.into_changes().unwrap();
        assert_eq!(changes[0].path, PathBuf::from("src/viam/components/arm/arm.py"));

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].prompt.contains("src/viam/components/arm/arm.py"));
        assert!(prompts[0].prompt.contains("tests/test_arm.py"));
        // Only the included file reaches diff analysis
        assert!(prompts[3].prompt.contains("File: src/viam/components/arm/arm.py"));
        assert!(!prompts[3].prompt.contains("File: tests/test_arm.py"));
        assert!(prompts[3].prompt.contains("rpc Stop"));
    }

    #[tokio::test]
    async fn test_mismatched_plan_rejected() {
        let dir = sdk();
        let backend = Arc::new(ScriptedBackend::ok(&[
            r#"{"file_paths": []}"#,
            r#"{"files_to_update": ["a.py", "b.py"], "implementation_details": ["one"], "create_new_files": [false, false]}"#,
        ]));

        let result = analyzer(dir.path(), backend).analyze("+ rpc Stop").await;
        assert!(matches!(
            result,
            Err(AnalysisError::Plan(PlanError::Mismatched { files: 2, details: 1, .. }))
        ));
    }

    #[tokio::test]
    async fn test_selection_backend_failure_propagates() {
        let dir = sdk();
        let backend = Arc::new(ScriptedBackend::new(vec![Err(BackendError::Auth(
            "bad key".into(),
        ))]));

        let result = analyzer(dir.path(), backend).analyze("+ rpc Stop").await;
        assert!(matches!(result, Err(AnalysisError::Backend(BackendError::Auth(_)))));
    }
}
