//! Extract structured content from raw model output
//!
//! Models wrap answers in markdown fences and prose; these helpers dig the
//! JSON or file body back out.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[A-Za-z0-9_+\-.]*[ \t]*\r?\n([\s\S]*?)\r?\n?```").unwrap()
});

/// Extract a JSON value from text
///
/// Tries, in order: fenced code blocks, the whole text, then each
/// balanced `{...}` or `[...]` span from left to right until one parses.
pub fn extract_json(text: &str) -> Option<Value> {
    for caps in FENCED_BLOCK.captures_iter(text) {
        if let Ok(json) = serde_json::from_str(caps[1].trim()) {
            return Some(json);
        }
    }

    if let Ok(json) = serde_json::from_str(text.trim()) {
        return Some(json);
    }

    text.char_indices()
        .filter(|(_, c)| matches!(c, '{' | '['))
        .find_map(|(start, _)| balanced_json_at(text, start))
}

/// Parse the balanced JSON value starting at byte offset `start`
fn balanced_json_at(text: &str, start: usize) -> Option<Value> {
    let remaining = &text[start..];
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in remaining.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&remaining[..=i]).ok();
                }
            }
            _ => {}
        }
    }

    None
}

/// Strip a single markdown fence wrapping a whole file
///
/// Regenerated files often come back as ```` ```python ... ``` ````; the
/// fence lines are dropped and a trailing newline is kept.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() > 6 {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() >= 2 {
            let body = lines[1..lines.len() - 1].join("\n");
            return format!("{}\n", body);
        }
    }
    text.to_string()
}
