//! Search/replace patch engine
//!
//! This module handles:
//! - Parsing edit requests (parallel `search_text`/`replacement_text` lists)
//!   from model output
//! - Validating every pair against the original document before mutation
//! - Applying pairs in order with an apply-time uniqueness re-check
//! - Mapping failures onto recoverable or terminal outcomes by attempt number
//! - Reading and writing target files
//!
//! # Example
//!
//! ```ignore
//! let engine = PatchEngine::default();
//! let request = EditRequest::from_model_output(
//!     r#"{"search_text": ["return 1"], "replacement_text": ["return 2"]}"#,
//! )?;
//!
//! match engine.apply("def f():\n    return 1\n", &request, 1) {
//!     PatchOutcome::Applied(patched) => println!("{}", patched.content),
//!     PatchOutcome::Recoverable { error } => println!("retry: {}", error),
//!     PatchOutcome::Terminal { .. } => println!("fall back to regeneration"),
//! }
//! ```

mod applier;
mod error;
mod file;
mod governor;
mod request;
mod validator;

pub use error::PatchError;
pub use file::{FilePatcher, OutputMode};
pub use governor::{DEFAULT_MAX_ATTEMPTS, PatchEngine, PatchOutcome};
pub use request::EditRequest;
