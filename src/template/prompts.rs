//! Prompt sources and their render contexts

use serde::Serialize;

pub const SYSTEM: &str = "system";
pub const PATCH: &str = "patch";
pub const FEEDBACK: &str = "feedback";
pub const REGENERATE: &str = "regenerate";
pub const CREATE: &str = "create";
pub const SELECT_CONTEXT: &str = "select-context";
pub const SELECT_CONTEXT_SYSTEM: &str = "select-context-system";
pub const FILTER_CONTEXT: &str = "filter-context";
pub const FILTER_CONTEXT_SYSTEM: &str = "filter-context-system";
pub const ANALYZE_DIFF: &str = "analyze-diff";
pub const ANALYZE_DIFF_SYSTEM: &str = "analyze-diff-system";

/// Every prompt, by name
pub(super) const SOURCES: &[(&str, &str)] = &[
    (SYSTEM, SYSTEM_SOURCE),
    (PATCH, PATCH_SOURCE),
    (FEEDBACK, FEEDBACK_SOURCE),
    (REGENERATE, REGENERATE_SOURCE),
    (CREATE, CREATE_SOURCE),
    (SELECT_CONTEXT, SELECT_CONTEXT_SOURCE),
    (SELECT_CONTEXT_SYSTEM, SELECT_CONTEXT_SYSTEM_SOURCE),
    (FILTER_CONTEXT, FILTER_CONTEXT_SOURCE),
    (FILTER_CONTEXT_SYSTEM, FILTER_CONTEXT_SYSTEM_SOURCE),
    (ANALYZE_DIFF, ANALYZE_DIFF_SOURCE),
    (ANALYZE_DIFF_SYSTEM, ANALYZE_DIFF_SYSTEM_SOURCE),
];

const SYSTEM_SOURCE: &str = r#"You are a precise search-and-replace patch generator for SDK source files.

Answer with a single JSON object and nothing else:
{"search_text": ["..."], "replacement_text": ["..."]}

Rules:
1. Every search block is a character-for-character copy of text in the file, whitespace included.
2. Every search block appears exactly once in the file. When a snippet repeats, widen it with surrounding lines until it is unique.
3. search_text and replacement_text have the same number of elements. Element i of one pairs with element i of the other.
4. Patches apply in list order and must not overlap.
5. Change only what the requested edit needs."#;

const PATCH_SOURCE: &str = r#"Generate search-and-replace patches that make the following change to an existing file:
{{ implementation_detail }}

Current contents of the file:
=== {{ file_path }} ===
{{ existing_file_content }}

Each patch set you return is checked against the file. You have {{ max_attempts }} attempts; after that the file is regenerated in full instead.
{% for entry in history %}
{% include "feedback" %}
{% endfor %}"#;

const FEEDBACK_SOURCE: &str = r#"--- Attempt {{ entry.attempt }} ---
You answered:
{{ entry.request }}
The patch tool returned:
{{ entry.result }}"#;

const REGENERATE_SOURCE: &str = r#"Rewrite the complete file below so that it implements this change:
{{ implementation_detail }}

Search-and-replace patching did not succeed ({{ reason }}), so the whole file is needed.

Current contents of the file:
=== {{ file_path }} ===
{{ existing_file_content }}

Return only the full new file contents. Keep everything the change does not touch exactly as it is. No explanations."#;

const CREATE_SOURCE: &str = r#"Create the new file {{ file_path }} so that it implements this change:
{{ implementation_detail }}

Return only the complete file contents. No explanations."#;

const SELECT_CONTEXT_SOURCE: &str = r#"The interface definitions of an SDK have changed. Before anyone works out what to change in the SDK, pick the files worth reading as context.

Select, from the listings below:
- source files that implement the services, components or messages touched by the diff
- base classes, interfaces and type definitions those files build on
- analogous components that show the conventions a new implementation should follow
- utilities and error handling the changed code is likely to use
- tests for the changed functionality, and tests that show how similar code is tested

Cast a wide net. A file that turns out to be unnecessary costs little; a missing one leads to an implementation that ignores existing patterns.
{% for tree in trees %}
Tree of {{ tree.root }}:
{{ tree.listing }}
{% endfor %}
Changes to the generated interface code (git diff):
{{ git_diff }}

Answer with a JSON object: {"file_paths": ["path/relative/to/sdk/root", ...]}"#;

const SELECT_CONTEXT_SYSTEM_SOURCE: &str = r#"You select context files for an automated SDK update. Follow the instructions exactly."#;

const FILTER_CONTEXT_SOURCE: &str = r#"A candidate context file was picked for an SDK update. Decide whether it is worth including.

Changes to the generated interface code (git diff):
{{ git_diff }}

File to evaluate:
File path: {{ file_path }}
{{ file_content }}

Include the file if it holds code that must change, abstractions or types the change builds on, patterns or utilities a developer would reuse, or tests that show how to test similar functionality.
Exclude it if it is unrelated, boilerplate, documentation only, legacy code, or tests for unrelated features. When the value is marginal, exclude it.

Answer with a JSON object: {"filename": "{{ file_path }}", "inclusion": true or false, "reasoning": "one sentence"}"#;

const FILTER_CONTEXT_SYSTEM_SOURCE: &str = r#"You judge whether single files are useful context for implementing interface changes in an SDK. Be decisive and keep the context focused."#;

const ANALYZE_DIFF_SOURCE: &str = r#"Work out which SDK files must change, or be created, to implement the interface changes below, and write precise instructions for each.

Context files from the SDK:
<context_files>
{% for file in context_files %}File: {{ file.path }}
Content:
{{ file.content }}
--------------------------------
{% endfor %}</context_files>

Changes to the generated interface code (git diff):
<git_diff>
{{ git_diff }}
</git_diff>

For every affected file give one self-contained instruction: exact method signatures, parameter names, return types, behavior and documentation, following the conventions visible in the context files. Only suggest changes the diff requires. Never touch generated files.

Answer with a single JSON object whose three arrays have the same length, one entry per file:
{"files_to_update": ["path", ...], "implementation_details": ["instruction", ...], "create_new_files": [false, ...]}"#;

const ANALYZE_DIFF_SYSTEM_SOURCE: &str = r#"You translate interface definition changes into exact, actionable implementation instructions for SDK code. Each file gets exactly one instruction entry, and your output is valid JSON."#;

/// Context for the patch-generation prompt
#[derive(Debug, Clone, Serialize)]
pub struct PatchPrompt<'a> {
    pub file_path: &'a str,
    pub implementation_detail: &'a str,
    pub existing_file_content: &'a str,
    pub max_attempts: u32,
    pub history: &'a [AttemptFeedback],
}

/// One failed attempt, fed back to the model on the next one
#[derive(Debug, Clone, Serialize)]
pub struct AttemptFeedback {
    pub attempt: u32,
    /// The model's previous answer, verbatim
    pub request: String,
    /// JSON-serialized `PatchReport`, or a parse error
    pub result: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegeneratePrompt<'a> {
    pub file_path: &'a str,
    pub implementation_detail: &'a str,
    pub existing_file_content: &'a str,
    pub reason: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePrompt<'a> {
    pub file_path: &'a str,
    pub implementation_detail: &'a str,
}

/// One directory listing shown when selecting context
#[derive(Debug, Clone, Serialize)]
pub struct TreeListing {
    pub root: String,
    pub listing: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectContextPrompt<'a> {
    pub git_diff: &'a str,
    pub trees: &'a [TreeListing],
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterContextPrompt<'a> {
    pub git_diff: &'a str,
    pub file_path: &'a str,
    pub file_content: &'a str,
}

/// A file kept as context, with its contents
#[derive(Debug, Clone, Serialize)]
pub struct ContextFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeDiffPrompt<'a> {
    pub git_diff: &'a str,
    pub context_files: &'a [ContextFile],
}
