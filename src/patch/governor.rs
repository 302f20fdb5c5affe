//! Attempt ceiling and the structured outcome of a patch attempt

use super::applier::{PatchedDocument, apply_validated};
use super::error::PatchError;
use super::request::EditRequest;
use super::validator::validate;
use serde::{Deserialize, Serialize};

/// Default number of failing attempts reported as recoverable
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Where a patch attempt ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    Succeeded,
    RecoverableFailure,
    TerminalFailure,
}

/// Outcome of one governed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied(PatchedDocument),
    /// The caller may retry with a new attempt number
    Recoverable { error: PatchError },
    /// The ceiling was exceeded; the caller should fall back
    Terminal { error: PatchError, max_attempts: u32 },
}

impl PatchOutcome {
    pub fn state(&self) -> PatchState {
        match self {
            PatchOutcome::Applied(_) => PatchState::Succeeded,
            PatchOutcome::Recoverable { .. } => PatchState::RecoverableFailure,
            PatchOutcome::Terminal { .. } => PatchState::TerminalFailure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PatchOutcome::Applied(_))
    }

    pub fn error(&self) -> Option<&PatchError> {
        match self {
            PatchOutcome::Applied(_) => None,
            PatchOutcome::Recoverable { error } | PatchOutcome::Terminal { error, .. } => {
                Some(error)
            }
        }
    }

    /// Serializable report using the default success message
    pub fn report(&self) -> PatchReport {
        match self {
            PatchOutcome::Applied(patched) => PatchReport::success(
                success_message(patched.patches_applied, None),
                patched.patches_applied,
            ),
            PatchOutcome::Recoverable { error } => PatchReport::failure(format!("ERROR: {}", error)),
            PatchOutcome::Terminal { max_attempts, .. } => PatchReport::stop(*max_attempts),
        }
    }
}

/// Human-readable success line, optionally naming where the result went
pub fn success_message(patches_applied: usize, saved_to: Option<&str>) -> String {
    match saved_to {
        Some(path) => format!(
            "SUCCESS: Applied {} patches and saved to {}. All search blocks were unique and patches applied successfully.",
            patches_applied, path
        ),
        None => format!(
            "SUCCESS: Applied {} patches. All search blocks were unique and patches applied successfully.",
            patches_applied
        ),
    }
}

/// Fixed directive returned once the ceiling is exceeded
pub fn stop_trying_message(max_attempts: u32) -> String {
    format!(
        "STOP_TRYING: Maximum attempts ({}) exceeded. Stop trying to apply patches to this file; \
         the file will be regenerated instead.",
        max_attempts
    )
}

/// Wire form of an outcome, as handed back to an automated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patches_applied: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stop_trying: bool,
}

impl PatchReport {
    pub fn success(message: String, patches_applied: usize) -> Self {
        Self {
            success: true,
            message: Some(message),
            patches_applied: Some(patches_applied),
            error: None,
            stop_trying: false,
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            message: None,
            patches_applied: None,
            error: Some(error),
            stop_trying: false,
        }
    }

    pub fn stop(max_attempts: u32) -> Self {
        Self {
            stop_trying: true,
            ..Self::failure(stop_trying_message(max_attempts))
        }
    }
}

/// Validate-then-apply under an attempt ceiling
///
/// Stateless across calls: the caller tracks the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchEngine {
    max_attempts: u32,
}

impl Default for PatchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl PatchEngine {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run validation and application against an in-memory document
    pub fn apply(&self, document: &str, request: &EditRequest, attempt: u32) -> PatchOutcome {
        let result = validate(document, request).and_then(|()| apply_validated(document, request));
        self.settle(attempt, result)
    }

    /// Map a raw result onto the state machine
    ///
    /// Every failure goes through the same ceiling check, including
    /// request-shape and file errors.
    pub fn settle(
        &self,
        attempt: u32,
        result: Result<PatchedDocument, PatchError>,
    ) -> PatchOutcome {
        match result {
            Ok(patched) => {
                tracing::debug!(
                    attempt,
                    patches = patched.patches_applied,
                    "patch attempt succeeded"
                );
                PatchOutcome::Applied(patched)
            }
            Err(error) if attempt > self.max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts = self.max_attempts,
                    %error,
                    "patch attempts exhausted"
                );
                PatchOutcome::Terminal {
                    error,
                    max_attempts: self.max_attempts,
                }
            }
            Err(error) => {
                tracing::info!(attempt, index = ?error.index(), %error, "patch attempt failed");
                PatchOutcome::Recoverable { error }
            }
        }
    }
}
