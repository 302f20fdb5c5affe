//! Directory listings shown to the model when it picks context files

use crate::template::TreeListing;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

fn is_noise(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.depth() > 0 && (name.starts_with('.') || name == "__pycache__")
}

/// Every file under `root/dir`, one root-relative path per line
///
/// Returns `None` when the directory does not exist. Paths use `/` so
/// the model can quote them back verbatim.
pub fn list_tree(root: &Path, dir: &str) -> Option<TreeListing> {
    let start = root.join(dir);
    if !start.is_dir() {
        return None;
    }

    let mut lines = Vec::new();
    for entry in WalkDir::new(&start)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_noise(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        lines.push(parts.join("/"));
    }

    Some(TreeListing {
        root: dir.to_string(),
        listing: lines.join("\n"),
    })
}
