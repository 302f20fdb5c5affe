//! Template error types with suggestions

use thiserror::Error;

/// Prompt rendering errors
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Referenced variable doesn't exist in the prompt context
    #[error("undefined variable '{name}' in prompt '{template}'{}", .suggestion.as_ref().map(|s| format!(", did you mean '{}'?", s)).unwrap_or_default())]
    UndefinedVariable {
        name: String,
        template: String,
        suggestion: Option<String>,
    },

    /// Template source failed to parse
    #[error("syntax error in prompt '{template}' at line {line}: {message}")]
    SyntaxError {
        template: String,
        line: usize,
        message: String,
    },

    /// No prompt registered under this name
    #[error("unknown prompt '{0}'")]
    UnknownTemplate(String),

    /// Wrapped minijinja error
    #[error("template error: {0}")]
    Internal(#[from] minijinja::Error),
}

impl TemplateError {
    pub fn undefined_variable(
        name: impl Into<String>,
        template: impl Into<String>,
        known_vars: &[String],
    ) -> Self {
        let name = name.into();
        let candidates: Vec<&str> = known_vars.iter().map(String::as_str).collect();
        let suggestion = suggest_correction(&name, &candidates);
        Self::UndefinedVariable {
            name,
            template: template.into(),
            suggestion,
        }
    }
}

/// Suggest a correction for a typo using Levenshtein distance
pub fn suggest_correction(typo: &str, candidates: &[&str]) -> Option<String> {
    let max_distance = (typo.len() / 2).max(2);

    candidates
        .iter()
        .map(|candidate| (levenshtein_distance(typo, candidate), *candidate))
        .filter(|(distance, _)| *distance <= max_distance)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.to_string())
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut current = Vec::with_capacity(b_chars.len() + 1);
        current.push(i + 1);
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            let value = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
            current.push(value);
        }
        previous = current;
    }

    previous[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("file_path", "file_pth"), 1);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_suggest_correction() {
        let candidates = ["file_path", "implementation_detail", "existing_file_content"];

        assert_eq!(
            suggest_correction("file_pth", &candidates),
            Some("file_path".into())
        );
        assert_eq!(suggest_correction("completely_unrelated", &candidates), None);
        assert_eq!(suggest_correction("anything", &[]), None);
    }

    #[test]
    fn test_undefined_variable_display() {
        let known = vec!["file_path".to_string(), "max_attempts".to_string()];
        let err = TemplateError::undefined_variable("max_atempts", "patch", &known);
        let msg = err.to_string();
        assert!(msg.contains("undefined variable 'max_atempts'"));
        assert!(msg.contains("prompt 'patch'"));
        assert!(msg.contains("did you mean 'max_attempts'"));
    }
}
