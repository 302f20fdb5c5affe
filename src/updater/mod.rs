//! Plan-driven SDK file updates
//!
//! A `ChangePlan` lists files and what to change in each. Every file goes
//! through a `FileSession`: existing files are patched through the attempt
//! loop and regenerated whole if patching gives up; new files are generated
//! directly. The `Updater` runs sessions concurrently and totals the cost.

mod plan;
mod runner;
mod session;

pub use plan::{ChangePlan, FileChange, PlanError};
pub use runner::{RunSummary, Updater};
pub use session::{FileSession, FileUpdateResult, UpdateStrategy};
