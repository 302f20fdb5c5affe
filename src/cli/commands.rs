//! CLI command implementations

use super::output::{OutputEvent, OutputHandler};
use crate::analyzer::{Analyzer, read_diff};
use crate::backend_executor::{BackendExecutor, Pricing, connect};
use crate::config::PatcherConfig;
use crate::patch::{EditRequest, FilePatcher, OutputMode, PatchEngine};
use crate::template::PromptEngine;
use crate::updater::{ChangePlan, FileChange, FileSession, Updater};
use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where `analyze` and `run` get the interface diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSource {
    /// A saved diff
    File(PathBuf),
    /// `git diff` in the SDK root; unset revisions come from `[analysis]`
    Git {
        base: Option<String>,
        head: Option<String>,
    },
}

/// Apply one edit request to one file
///
/// `patch` names a JSON file holding `search_text`/`replacement_text`, or
/// `-` for stdin. `file` is relative to the SDK root. The structured report
/// goes to stdout; the exit code is 0 on success, 1 on a recoverable
/// failure and 2 once attempts are exhausted.
pub fn apply_file(
    file: &Path,
    patch: &Path,
    attempt: u32,
    project_dir: &Path,
    config: &PatcherConfig,
    output: OutputMode,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    let raw = if patch == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read edit request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(patch)
            .with_context(|| format!("failed to read edit request {}", patch.display()))?
    };

    let request = EditRequest::from_model_output(&raw)
        .with_context(|| format!("invalid edit request in {}", patch.display()))?;

    let patcher = FilePatcher::new(
        &config.sdk_root(project_dir),
        output,
        PatchEngine::new(config.defaults.max_attempts()),
    );
    let outcome = patcher.apply(file, &request, attempt);

    let report = serde_json::to_string_pretty(&outcome.report)?;
    handler.result(outcome.is_success(), Some(&report));

    Ok(if outcome.is_success() {
        0
    } else if outcome.stop_trying() {
        2
    } else {
        1
    })
}

/// The configured generation backend, connected
struct Generation {
    name: String,
    executor: Arc<dyn BackendExecutor>,
    pricing: Pricing,
    prompts: Arc<PromptEngine>,
    sdk_root: PathBuf,
}

impl Generation {
    fn from_config(config: &PatcherConfig, project_dir: &Path) -> Result<Self> {
        let (name, backend) = config.generation_backend()?;
        Ok(Self {
            executor: connect(&name, backend),
            pricing: backend.pricing,
            prompts: Arc::new(PromptEngine::new()?),
            sdk_root: config.sdk_root(project_dir),
            name,
        })
    }

    fn analyzer(&self, config: &PatcherConfig) -> Analyzer {
        Analyzer::new(
            self.executor.clone(),
            self.prompts.clone(),
            &self.sdk_root,
            config.analysis(),
            self.pricing,
        )
    }
}

/// Run every change in a plan against the configured backend
pub async fn run_update(
    plan_path: &Path,
    project_dir: &Path,
    config: &PatcherConfig,
    output: OutputMode,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    let plan = ChangePlan::load(plan_path)?;
    let changes = plan.into_changes()?;

    if changes.is_empty() {
        tracing::info!(plan = %plan_path.display(), "plan has no files to update");
        handler.emit(OutputEvent::Info {
            message: "No files need to be updated.".into(),
        });
        return Ok(0);
    }

    let generation = Generation::from_config(config, project_dir)?;
    update(&generation, changes, config, output, handler).await
}

async fn update(
    generation: &Generation,
    changes: Vec<FileChange>,
    config: &PatcherConfig,
    output: OutputMode,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    let session = FileSession::new(
        generation.executor.clone(),
        generation.prompts.clone(),
        FilePatcher::new(
            &generation.sdk_root,
            output,
            PatchEngine::new(config.defaults.max_attempts()),
        ),
        generation.pricing,
    );

    handler.emit(OutputEvent::RunStart {
        files: changes.len(),
        backend: generation.name.clone(),
    });

    let summary = Updater::new(session, config.defaults.max_concurrent)
        .run(changes)
        .await;

    for result in &summary.results {
        handler.emit(OutputEvent::file_complete(result));
    }
    handler.emit(OutputEvent::run_complete(&summary));

    Ok(if summary.all_succeeded() { 0 } else { 1 })
}

/// Diff, select context and write a change plan
///
/// The plan goes to `out` when given, otherwise to stdout.
pub async fn run_analyze(
    source: &DiffSource,
    out: Option<&Path>,
    project_dir: &Path,
    config: &PatcherConfig,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    let generation = Generation::from_config(config, project_dir)?;
    let Some(plan) = analyze(&generation, source, config, handler).await? else {
        return Ok(0);
    };

    let json = serde_json::to_string_pretty(&plan)?;
    match out {
        Some(path) => {
            std::fs::write(path, format!("{}\n", json))
                .with_context(|| format!("failed to write plan {}", path.display()))?;
            handler.emit(OutputEvent::Info {
                message: format!("Plan written to {}", path.display()),
            });
        }
        None => handler.result(true, Some(&json)),
    }
    Ok(0)
}

/// Analyze the diff, then update every file the plan names
pub async fn run_pipeline(
    source: &DiffSource,
    out: Option<&Path>,
    project_dir: &Path,
    config: &PatcherConfig,
    output: OutputMode,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    let generation = Generation::from_config(config, project_dir)?;
    let Some(plan) = analyze(&generation, source, config, handler).await? else {
        return Ok(0);
    };

    if let Some(path) = out {
        std::fs::write(path, serde_json::to_string_pretty(&plan)?)
            .with_context(|| format!("failed to write plan {}", path.display()))?;
    }

    if plan.is_empty() {
        handler.emit(OutputEvent::Info {
            message: "Analysis found no SDK files to update.".into(),
        });
        return Ok(0);
    }
    update(&generation, plan.into_changes()?, config, output, handler).await
}

/// `None` when the diff is empty and there is nothing to plan
async fn analyze(
    generation: &Generation,
    source: &DiffSource,
    config: &PatcherConfig,
    handler: &dyn OutputHandler,
) -> Result<Option<ChangePlan>> {
    let analyzer = generation.analyzer(config);

    let git_diff = match source {
        DiffSource::File(path) => read_diff(path)?,
        DiffSource::Git { base, head } => {
            let defaults = analyzer.config();
            let base = base.as_deref().unwrap_or(&defaults.base);
            let head = head.as_deref().unwrap_or(&defaults.head);
            analyzer.git_diff(base, head).await?
        }
    };

    if git_diff.trim().is_empty() {
        handler.emit(OutputEvent::Info {
            message: "No interface changes detected; the SDK needs no update.".into(),
        });
        return Ok(None);
    }

    handler.emit(OutputEvent::Debug {
        message: format!("diff is {} bytes", git_diff.len()),
    });
    let analysis = analyzer.analyze(&git_diff).await?;
    handler.emit(OutputEvent::analysis_complete(&analysis));
    Ok(Some(analysis.plan))
}

/// Check backend availability and the SDK root
pub async fn doctor(config: &PatcherConfig, project_dir: &Path, handler: &dyn OutputHandler) -> i32 {
    handler.emit(OutputEvent::Info {
        message: "Checking backends...".into(),
    });

    let mut all_ok = true;
    let enabled = config.enabled_backends();

    for (name, backend) in &enabled {
        let executor = connect(name, backend);
        let kind = if backend.is_http() { "http" } else { "cli" };

        let mut status = if executor.is_available().await {
            format!("✓ {} ({}: {})", name, kind, backend.command)
        } else {
            all_ok = false;
            format!("✗ {} ({}: {} - unreachable)", name, kind, backend.command)
        };

        if let Some(ref var) = backend.api_key_env {
            if backend.api_key().is_none() {
                all_ok = false;
                status.push_str(&format!(" - ${} is not set", var));
            }
        }

        let pricing = backend.pricing;
        if !pricing.is_free() {
            status.push_str(&format!(
                " [${}/M in, ${}/M out]",
                pricing.input_per_million, pricing.output_per_million
            ));
        }

        handler.emit(OutputEvent::Info { message: status });
    }

    if enabled.is_empty() {
        all_ok = false;
        handler.emit(OutputEvent::Info {
            message: "  (no backends configured)".into(),
        });
    }

    match config.generation_backend() {
        Ok((name, _)) => handler.emit(OutputEvent::Info {
            message: format!("\nGeneration backend: {}", name),
        }),
        Err(e) => {
            all_ok = false;
            handler.emit(OutputEvent::Info {
                message: format!("\n✗ {}", e),
            });
        }
    }

    let sdk_root = config.sdk_root(project_dir);
    if sdk_root.is_dir() {
        handler.emit(OutputEvent::Info {
            message: format!("✓ SDK root: {}", sdk_root.display()),
        });
        let analysis = config.analysis();
        if !sdk_root.join(&analysis.gen_dir).is_dir() {
            handler.emit(OutputEvent::Info {
                message: format!("  (no generated code at {} yet)", analysis.gen_dir),
            });
        }
    } else {
        all_ok = false;
        handler.emit(OutputEvent::Info {
            message: format!("✗ SDK root {} is not a directory", sdk_root.display()),
        });
    }

    if all_ok { 0 } else { 1 }
}
