//! Change plans: which files to touch and what to do to each

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("invalid plan JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "plan lists {files} files but {details} implementation details and {creation} creation flags; all three must match"
    )]
    Mismatched {
        files: usize,
        details: usize,
        creation: usize,
    },
}

/// Analysis output naming the files to update
///
/// The three lists are parallel: entry `i` of each describes one change.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChangePlan {
    pub files_to_update: Vec<String>,
    pub implementation_details: Vec<String>,
    #[serde(default, alias = "create_new_files")]
    pub requires_creation: Vec<bool>,
}

/// One file change from a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub implementation_detail: String,
    pub requires_creation: bool,
}

impl ChangePlan {
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path).map_err(|e| PlanError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|source| PlanError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.files_to_update.is_empty()
    }

    /// The parallel lists must line up; missing creation flags are allowed
    pub fn check(&self) -> Result<(), PlanError> {
        let files = self.files_to_update.len();
        let details = self.implementation_details.len();
        let creation = if self.requires_creation.is_empty() {
            files
        } else {
            self.requires_creation.len()
        };

        if files != details || files != creation {
            return Err(PlanError::Mismatched {
                files,
                details,
                creation,
            });
        }
        Ok(())
    }

    /// Split the plan into per-file changes
    ///
    /// A plan without `requires_creation` treats every file as existing.
    pub fn into_changes(self) -> Result<Vec<FileChange>, PlanError> {
        self.check()?;

        let mut flags = self.requires_creation.into_iter();
        Ok(self
            .files_to_update
            .into_iter()
            .zip(self.implementation_details)
            .map(|(path, implementation_detail)| FileChange {
                path: PathBuf::from(path),
                implementation_detail,
                requires_creation: flags.next().unwrap_or(false),
            })
            .collect())
    }
}
