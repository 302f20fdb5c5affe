//! Output handlers for CLI commands
//!
//! Supports console (pretty), JSON-lines and quiet output.

use crate::analyzer::Analysis;
use crate::updater::{FileUpdateResult, RunSummary, UpdateStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How command progress is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
    Quiet,
}

impl OutputFormat {
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if json {
            Self::Json
        } else if quiet {
            Self::Quiet
        } else {
            Self::Console
        }
    }
}

/// Events emitted while a command runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputEvent {
    AnalysisComplete {
        candidates: usize,
        included: usize,
        files: usize,
        total_tokens: u64,
        cost_usd: f64,
        duration_ms: u64,
    },
    RunStart {
        files: usize,
        backend: String,
    },
    FileComplete {
        path: String,
        strategy: String,
        attempts: u32,
        written_to: Option<String>,
        error: Option<String>,
        cost_usd: f64,
        duration_ms: u64,
    },
    RunComplete {
        success: bool,
        succeeded: usize,
        failed: usize,
        /// Files per strategy label
        by_strategy: BTreeMap<String, usize>,
        total_tokens: u64,
        cost_usd: f64,
        duration_ms: u64,
    },
    Info {
        message: String,
    },
    Debug {
        message: String,
    },
}

impl OutputEvent {
    pub fn analysis_complete(analysis: &Analysis) -> Self {
        Self::AnalysisComplete {
            candidates: analysis.candidates,
            included: analysis.included().count(),
            files: analysis.plan.files_to_update.len(),
            total_tokens: analysis.cost.usage.total(),
            cost_usd: analysis.cost.cost_usd,
            duration_ms: millis(analysis.duration),
        }
    }

    pub fn file_complete(result: &FileUpdateResult) -> Self {
        let error = match &result.strategy {
            UpdateStrategy::Failed { error } => Some(error.clone()),
            UpdateStrategy::Regenerated { reason } => Some(reason.clone()),
            _ => None,
        };
        Self::FileComplete {
            path: result.path.display().to_string(),
            strategy: result.strategy.label().to_string(),
            attempts: result.attempts,
            written_to: result.written_to.as_ref().map(|p| p.display().to_string()),
            error,
            cost_usd: result.cost.cost_usd,
            duration_ms: millis(result.duration),
        }
    }

    pub fn run_complete(summary: &RunSummary) -> Self {
        Self::RunComplete {
            success: summary.all_succeeded(),
            succeeded: summary.succeeded(),
            failed: summary.failed(),
            by_strategy: summary
                .by_strategy()
                .into_iter()
                .map(|(label, count)| (label.to_string(), count))
                .collect(),
            total_tokens: summary.cost.usage.total(),
            cost_usd: summary.cost.cost_usd,
            duration_ms: millis(summary.duration),
        }
    }
}

/// Output handler trait
pub trait OutputHandler: Send + Sync {
    fn emit(&self, event: OutputEvent);

    /// Write the command's final result to stdout
    fn result(&self, success: bool, output: Option<&str>);
}

/// Console output handler
pub struct ConsoleHandler {
    debug: bool,
}

impl ConsoleHandler {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    fn format_duration(ms: u64) -> String {
        if ms < 1000 {
            format!("{}ms", ms)
        } else {
            format!("{:.1}s", ms as f64 / 1000.0)
        }
    }
}

impl OutputHandler for ConsoleHandler {
    fn emit(&self, event: OutputEvent) {
        match event {
            OutputEvent::AnalysisComplete {
                candidates,
                included,
                files,
                total_tokens,
                cost_usd,
                duration_ms,
            } => {
                eprintln!(
                    "✓ analysis: {}/{} context file(s) kept, {} file(s) to update in {} ({} tokens, ${:.4})",
                    included,
                    candidates,
                    files,
                    Self::format_duration(duration_ms),
                    total_tokens,
                    cost_usd
                );
            }
            OutputEvent::RunStart { files, backend } => {
                eprintln!("Updating {} file(s) with backend '{}'", files, backend);
            }
            OutputEvent::FileComplete {
                path,
                strategy,
                attempts,
                written_to,
                error,
                duration_ms,
                ..
            } => {
                let mark = if strategy == "failed" { "✗" } else { "✓" };
                let target = written_to
                    .map(|w| format!(" -> {}", w))
                    .unwrap_or_default();
                eprintln!(
                    "{} {} [{}, {} attempt(s), {}]{}",
                    mark,
                    path,
                    strategy,
                    attempts,
                    Self::format_duration(duration_ms),
                    target
                );
                if let Some(error) = error {
                    eprintln!("    {}", error);
                }
            }
            OutputEvent::RunComplete {
                success,
                succeeded,
                failed,
                by_strategy,
                total_tokens,
                cost_usd,
                duration_ms,
            } => {
                eprintln!();
                let mark = if success { "✓" } else { "✗" };
                eprintln!(
                    "{} {} updated, {} failed in {} ({} tokens, ${:.4})",
                    mark,
                    succeeded,
                    failed,
                    Self::format_duration(duration_ms),
                    total_tokens,
                    cost_usd
                );
                if !by_strategy.is_empty() {
                    let parts: Vec<String> = by_strategy
                        .iter()
                        .map(|(label, count)| format!("{} {}", label, count))
                        .collect();
                    eprintln!("  {}", parts.join(", "));
                }
            }
            OutputEvent::Info { message } => {
                eprintln!("{}", message);
            }
            OutputEvent::Debug { message } => {
                if self.debug {
                    eprintln!("[debug] {}", message);
                }
            }
        }
    }

    fn result(&self, _success: bool, output: Option<&str>) {
        if let Some(out) = output {
            println!("{}", out);
        }
    }
}

/// One JSON object per line on stdout
pub struct JsonHandler;

impl JsonHandler {
    fn print_json<T: Serialize>(&self, value: &T) {
        if let Ok(s) = serde_json::to_string(value) {
            println!("{}", s);
        }
    }
}

impl OutputHandler for JsonHandler {
    fn emit(&self, event: OutputEvent) {
        self.print_json(&event);
    }

    fn result(&self, success: bool, output: Option<&str>) {
        #[derive(Serialize)]
        struct FinalResult<'a> {
            #[serde(rename = "type")]
            kind: &'static str,
            success: bool,
            output: Option<serde_json::Value>,
            #[serde(skip_serializing_if = "Option::is_none")]
            text: Option<&'a str>,
        }

        // Structured output stays structured
        let parsed = output.and_then(|o| serde_json::from_str(o).ok());
        let text = if parsed.is_none() { output } else { None };
        self.print_json(&FinalResult {
            kind: "Result",
            success,
            output: parsed,
            text,
        });
    }
}

/// Emits nothing but the final result
pub struct QuietHandler;

impl OutputHandler for QuietHandler {
    fn emit(&self, _event: OutputEvent) {}

    fn result(&self, _success: bool, output: Option<&str>) {
        if let Some(out) = output {
            println!("{}", out);
        }
    }
}

pub fn create_handler(format: OutputFormat, debug: bool) -> Box<dyn OutputHandler> {
    match format {
        OutputFormat::Console => Box::new(ConsoleHandler::new(debug)),
        OutputFormat::Json => Box::new(JsonHandler),
        OutputFormat::Quiet => Box::new(QuietHandler),
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
