//! Prompt templates for patch generation
//!
//! Prompts are minijinja templates rendered from typed contexts:
//!
//! - `system`: output format and patch rules
//! - `patch`: implementation detail plus the current file, followed by the
//!   feedback from every failed attempt so far
//! - `regenerate`: full-file rewrite after patching is abandoned
//! - `create`: a new file from scratch
//! - `select-context`, `filter-context`, `analyze-diff`: the analysis
//!   stages that turn a git diff into a change plan, each with its own
//!   system prompt
//!
//! # Example
//!
//! ```ignore
//! use sdk_patcher::template::{CreatePrompt, PromptEngine};
//!
//! let engine = PromptEngine::new()?;
//! let prompt = engine.create_prompt(&CreatePrompt {
//!     file_path: "src/viam/services/new.py",
//!     implementation_detail: "Add a client for the new service",
//! })?;
//! ```

mod engine;
mod errors;
mod prompts;

pub use engine::PromptEngine;
pub use errors::TemplateError;
pub use prompts::{
    AnalyzeDiffPrompt, AttemptFeedback, ContextFile, CreatePrompt, FilterContextPrompt,
    PatchPrompt, RegeneratePrompt, SelectContextPrompt, TreeListing,
};
