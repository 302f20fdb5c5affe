//! `[analysis]`: where the interface diff and the context listings come from

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Generated interface code, relative to the SDK root
    pub gen_dir: String,

    /// Pathspec globs left out of the diff
    pub exclude: Vec<String>,

    /// Directories listed for context selection
    pub tree_dirs: Vec<String>,

    /// Revisions diffed by default
    pub base: String,
    pub head: String,

    /// Concurrent per-file relevance calls
    pub max_concurrent: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            gen_dir: "src/viam/gen".into(),
            exclude: vec!["*_pb2.py".into()],
            tree_dirs: vec!["src/viam".into(), "tests".into()],
            base: "HEAD~1".into(),
            head: "HEAD".into(),
            max_concurrent: 8,
        }
    }
}
