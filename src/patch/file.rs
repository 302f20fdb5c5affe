//! Patch application against files on disk

use super::error::PatchError;
use super::governor::{PatchEngine, PatchOutcome, PatchReport, success_message};
use super::request::EditRequest;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where patched or regenerated content is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Write next to the original as `<stem>_ai<ext>`
    #[default]
    Sibling,
    /// Overwrite the original file
    InPlace,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sibling" => Ok(Self::Sibling),
            "in_place" | "inplace" => Ok(Self::InPlace),
            other => Err(format!(
                "unknown output mode '{}' (expected 'sibling' or 'in-place')",
                other
            )),
        }
    }
}

impl OutputMode {
    /// Path the output for `path` is written to
    pub fn output_path(&self, path: &Path) -> PathBuf {
        match self {
            OutputMode::InPlace => path.to_path_buf(),
            OutputMode::Sibling => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                let name = match path.extension() {
                    Some(ext) => format!("{}_ai.{}", stem, ext.to_string_lossy()),
                    None => format!("{}_ai", stem),
                };
                path.with_file_name(name)
            }
        }
    }
}

/// Outcome of a governed file patch, with the report for the caller
#[derive(Debug, Clone)]
pub struct FilePatchOutcome {
    pub outcome: PatchOutcome,
    pub report: PatchReport,
    pub written_to: Option<PathBuf>,
}

impl FilePatchOutcome {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn stop_trying(&self) -> bool {
        self.report.stop_trying
    }
}

/// Reads a target file, runs the engine, writes the result
///
/// Paths are resolved against `root`. The engine never touches disk; this
/// type is the only writer.
#[derive(Debug, Clone)]
pub struct FilePatcher {
    root: PathBuf,
    output: OutputMode,
    engine: PatchEngine,
}

impl FilePatcher {
    pub fn new(root: &Path, output: OutputMode, engine: PatchEngine) -> Self {
        Self {
            root: root.to_path_buf(),
            output,
            engine,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn engine(&self) -> PatchEngine {
        self.engine
    }

    /// Resolve a path relative to the root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Read a target file
    pub fn read(&self, path: &Path) -> Result<String, PatchError> {
        let full_path = self.resolve(path);
        if !full_path.exists() {
            return Err(PatchError::FileNotFound { path: full_path });
        }
        fs::read_to_string(&full_path).map_err(|e| PatchError::ReadFailed {
            path: full_path,
            message: e.to_string(),
        })
    }

    /// Apply an edit request to one file under the attempt ceiling
    pub fn apply(&self, path: &Path, request: &EditRequest, attempt: u32) -> FilePatchOutcome {
        self.apply_from(path, None, request, attempt)
    }

    /// Like [`apply`](Self::apply), but patch the text of `source` instead
    /// of `path` itself
    ///
    /// Used when an earlier change already wrote a sibling output for the
    /// same file: the next change must build on that output. The result is
    /// still written to the output path of `path`.
    pub fn apply_from(
        &self,
        path: &Path,
        source: Option<&Path>,
        request: &EditRequest,
        attempt: u32,
    ) -> FilePatchOutcome {
        let outcome = match self.read(source.unwrap_or(path)) {
            Ok(content) => self.engine.apply(&content, request, attempt),
            Err(error) => self.engine.settle(attempt, Err(error)),
        };

        let patched = match outcome {
            PatchOutcome::Applied(patched) => patched,
            failed => {
                return FilePatchOutcome {
                    report: failed.report(),
                    outcome: failed,
                    written_to: None,
                };
            }
        };

        match self.write(path, &patched.content) {
            Ok(written_to) => {
                tracing::info!(
                    path = %written_to.display(),
                    patches = patched.patches_applied,
                    "wrote patched file"
                );
                let saved = written_to.display().to_string();
                FilePatchOutcome {
                    report: PatchReport::success(
                        success_message(patched.patches_applied, Some(&saved)),
                        patched.patches_applied,
                    ),
                    outcome: PatchOutcome::Applied(patched),
                    written_to: Some(written_to),
                }
            }
            Err(error) => {
                let outcome = self.engine.settle(attempt, Err(error));
                FilePatchOutcome {
                    report: outcome.report(),
                    outcome,
                    written_to: None,
                }
            }
        }
    }

    /// Write content for `path` according to the output mode
    ///
    /// Creates parent directories for new files.
    pub fn write(&self, path: &Path, content: &str) -> Result<PathBuf, PatchError> {
        let target = self.output.output_path(&self.resolve(path));

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| PatchError::WriteFailed {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }

        fs::write(&target, content).map_err(|e| PatchError::WriteFailed {
            path: target.clone(),
            message: e.to_string(),
        })?;

        Ok(target)
    }
}
