//! Configuration types and loading for sdk-patcher

mod analysis;
mod backend;
mod loader;

pub use analysis::AnalysisConfig;
pub use backend::{BackendConfig, RetrySettings};
pub use loader::{Defaults, PatcherConfig};
