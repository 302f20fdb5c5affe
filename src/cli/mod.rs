//! CLI module for sdk-patcher
//!
//! This module provides:
//! - Command implementations (apply, update, analyze, run, doctor)
//! - Output handlers (console, JSON, quiet)
//!
//! # Example
//!
//! ```ignore
//! use sdk_patcher::cli::{commands, output};
//!
//! let handler = output::create_handler(output::OutputFormat::Console, false);
//! let exit_code = commands::run_update(plan, dir, &config, OutputMode::Sibling, &*handler).await?;
//! ```

pub mod commands;
pub mod output;

pub use commands::{DiffSource, apply_file, doctor, run_analyze, run_pipeline, run_update};
pub use output::{OutputFormat, create_handler};
