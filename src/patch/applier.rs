//! Sequential substitution of validated pairs

use super::error::PatchError;
use super::request::EditRequest;
use super::validator::count_occurrences;

/// A fully patched document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedDocument {
    pub content: String,
    pub patches_applied: usize,
}

/// Apply pairs in order to an accumulating copy of the document
///
/// Validation runs against the original text, so each pair is re-checked
/// against the accumulator before it is substituted: an earlier
/// replacement can remove or duplicate a later search block. On such a
/// failure the partial result is dropped and only the count of pairs
/// already applied is reported.
pub fn apply_validated(
    document: &str,
    request: &EditRequest,
) -> Result<PatchedDocument, PatchError> {
    let mut content = document.to_string();
    let mut applied = 0;

    for (index, search, replace) in request.pairs() {
        if count_occurrences(&content, search) != 1 {
            return Err(PatchError::UniquenessChanged { index, applied });
        }
        content = content.replacen(search, replace, 1);
        applied += 1;
    }

    Ok(PatchedDocument {
        content,
        patches_applied: applied,
    })
}
