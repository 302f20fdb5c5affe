//! Up-front validation of an edit request against the original document

use super::error::PatchError;
use super::request::EditRequest;

/// Result of validating a request: `Ok(())` or the first violation found
pub type ValidationOutcome = Result<(), PatchError>;

/// Count literal, non-overlapping occurrences of `needle` in `haystack`
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Check every pair against the unmodified document
///
/// Checks short-circuit in order: list lengths, then per pair emptiness
/// and exact-once occurrence. Nothing is mutated, so calling this twice
/// with the same inputs yields the same outcome.
pub fn validate(document: &str, request: &EditRequest) -> ValidationOutcome {
    if request.search_text.len() != request.replacement_text.len() {
        return Err(PatchError::LengthMismatch {
            search: request.search_text.len(),
            replacement: request.replacement_text.len(),
        });
    }

    for (index, search, _) in request.pairs() {
        if search.is_empty() {
            return Err(PatchError::EmptySearch { index });
        }

        match count_occurrences(document, search) {
            1 => {}
            0 => return Err(PatchError::NotFound { index }),
            count => return Err(PatchError::NotUnique { index, count }),
        }
    }

    Ok(())
}
