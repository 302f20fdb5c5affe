//! Edit requests and parsing them out of model output

use crate::backend_executor::extract_json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors while turning model output into an edit request
#[derive(Debug, Error)]
pub enum EditParseError {
    #[error("no edit request found in output")]
    NoEditsFound,

    #[error("missing required field '{field}' in edit request")]
    MissingField { field: String },

    #[error("failed to parse edit request: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// An ordered list of literal search/replace pairs for one document
///
/// The two lists are kept as received so that a length mismatch can be
/// reported by the validator instead of being lost during parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EditRequest {
    pub search_text: Vec<String>,
    pub replacement_text: Vec<String>,
}

#[cfg(test)]
impl EditRequest {
    pub(crate) fn new(search_text: Vec<String>, replacement_text: Vec<String>) -> Self {
        Self {
            search_text,
            replacement_text,
        }
    }

    /// Build a request from already-paired blocks
    pub(crate) fn from_pairs<I, S, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, R)>,
        S: Into<String>,
        R: Into<String>,
    {
        let (search_text, replacement_text) = pairs
            .into_iter()
            .map(|(s, r)| (s.into(), r.into()))
            .unzip();
        Self::new(search_text, replacement_text)
    }
}

impl EditRequest {
    /// Number of pairs, or `None` when the lists disagree
    pub fn pair_count(&self) -> Option<usize> {
        (self.search_text.len() == self.replacement_text.len()).then_some(self.search_text.len())
    }

    /// Iterate pairs in order. Stops at the shorter list.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, &str, &str)> {
        self.search_text
            .iter()
            .zip(&self.replacement_text)
            .enumerate()
            .map(|(i, (s, r))| (i, s.as_str(), r.as_str()))
    }

    /// Parse a request from raw model output
    ///
    /// Accepts a bare JSON object, one wrapped in a markdown code block, or
    /// one embedded in surrounding prose.
    pub fn from_model_output(output: &str) -> Result<Self, EditParseError> {
        let value = extract_json(output).ok_or(EditParseError::NoEditsFound)?;

        let object = value.as_object().ok_or(EditParseError::NoEditsFound)?;
        for field in ["search_text", "replacement_text"] {
            if !object.contains_key(field) {
                return Err(EditParseError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_json() {
        let output = r#"{"search_text": ["a"], "replacement_text": ["b"]}"#;
        let request = EditRequest::from_model_output(output).unwrap();
        assert_eq!(request.search_text, vec!["a"]);
        assert_eq!(request.replacement_text, vec!["b"]);
        assert_eq!(request.pair_count(), Some(1));
    }

    #[test]
    fn test_parse_from_markdown_block() {
        let output = r#"
Here are the patches:

```json
{
  "search_text": ["def f():\n    return 1"],
  "replacement_text": ["def f():\n    return 2"]
}
```
"#;
        let request = EditRequest::from_model_output(output).unwrap();
        assert_eq!(request.search_text[0], "def f():\n    return 1");
    }

    #[test]
    fn test_mismatched_lengths_survive_parsing() {
        let output = r#"{"search_text": ["a", "b"], "replacement_text": ["a"]}"#;
        let request = EditRequest::from_model_output(output).unwrap();
        assert_eq!(request.pair_count(), None);
        assert_eq!(request.pairs().count(), 1);
    }

    #[test]
    fn test_missing_field() {
        let output = r#"{"search_text": ["a"]}"#;
        let result = EditRequest::from_model_output(output);
        assert!(matches!(
            result,
            Err(EditParseError::MissingField { ref field }) if field == "replacement_text"
        ));
    }

    #[test]
    fn test_no_json() {
        let result = EditRequest::from_model_output("I could not find anything to change.");
        assert!(matches!(result, Err(EditParseError::NoEditsFound)));
    }

    #[test]
    fn test_from_pairs() {
        let request = EditRequest::from_pairs([("x", "y"), ("1", "2")]);
        assert_eq!(request.search_text, vec!["x", "1"]);
        assert_eq!(request.replacement_text, vec!["y", "2"]);
        let pairs: Vec<_> = request.pairs().collect();
        assert_eq!(pairs[1], (1, "1", "2"));
    }
}
