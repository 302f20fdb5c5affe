//! Failure reasons for a patch attempt
//!
//! The display strings double as feedback for an automated caller, so each
//! one names the violated rule, the offending pair and what to change.

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can make a patch attempt fail
///
/// Pair numbers in messages are 1-based for the reader; `index` fields are
/// 0-based positions into the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error(
        "Mismatched list lengths - {search} search blocks but {replacement} replacement blocks. \
         Ensure search_text and replacement_text have exactly the same number of elements."
    )]
    LengthMismatch { search: usize, replacement: usize },

    #[error(
        "Patch {} (index {index}): Search text is empty. \
         Provide a non-empty search block copied from the file.",
        index + 1
    )]
    EmptySearch { index: usize },

    #[error(
        "Patch {} (index {index}): Search text not found in file. \
         The search block must exist in the file exactly as written, character for character.",
        index + 1
    )]
    NotFound { index: usize },

    #[error(
        "Patch {} (index {index}): Search text appears {count} times in file. \
         Include more surrounding context to make the search block unique.",
        index + 1
    )]
    NotUnique { index: usize, count: usize },

    #[error(
        "Patch {} (index {index}): Search text uniqueness changed during patching process \
         (applied {applied} patches successfully before failure). \
         Make the search blocks non-overlapping so earlier replacements do not alter later ones.",
        index + 1
    )]
    UniquenessChanged { index: usize, applied: usize },

    #[error("File {path} does not exist")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read file {path}: {message}")]
    ReadFailed { path: PathBuf, message: String },

    #[error("Failed to write patched content to {path}: {message}")]
    WriteFailed { path: PathBuf, message: String },
}

impl PatchError {
    /// The offending pair, if the error is tied to one
    pub fn index(&self) -> Option<usize> {
        match self {
            PatchError::EmptySearch { index }
            | PatchError::NotFound { index }
            | PatchError::NotUnique { index, .. }
            | PatchError::UniquenessChanged { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Returns true for errors caused by the edit request itself rather
    /// than by the filesystem
    pub fn is_request_error(&self) -> bool {
        !matches!(
            self,
            PatchError::FileNotFound { .. }
                | PatchError::ReadFailed { .. }
                | PatchError::WriteFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_pair_and_count() {
        let err = PatchError::NotUnique { index: 0, count: 2 };
        let msg = err.to_string();
        assert!(msg.contains("Patch 1 (index 0)"));
        assert!(msg.contains("appears 2 times"));
        assert!(msg.contains("more surrounding context"));
    }

    #[test]
    fn test_length_mismatch_has_no_index() {
        let err = PatchError::LengthMismatch {
            search: 2,
            replacement: 1,
        };
        assert_eq!(err.index(), None);
        assert!(err.to_string().contains("2 search blocks but 1 replacement blocks"));
    }

    #[test]
    fn test_uniqueness_changed_reports_applied() {
        let err = PatchError::UniquenessChanged {
            index: 1,
            applied: 1,
        };
        assert_eq!(err.index(), Some(1));
        assert!(err.to_string().contains("applied 1 patches"));
    }

    #[test]
    fn test_request_vs_file_errors() {
        assert!(PatchError::NotFound { index: 3 }.is_request_error());
        assert!(
            !PatchError::FileNotFound {
                path: PathBuf::from("a.py")
            }
            .is_request_error()
        );
    }
}
