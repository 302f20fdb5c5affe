//! Runs every change in a plan, one task per target file

use super::plan::FileChange;
use super::session::{FileSession, FileUpdateResult, UpdateStrategy};
use crate::backend_executor::CostTracker;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Results of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub results: Vec<FileUpdateResult>,
    pub cost: CostTracker,
    pub duration: Duration,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Count of results per strategy label
    pub fn by_strategy(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.strategy.label()).or_insert(0) += 1;
        }
        counts
    }
}

/// Fans changes out across tokio tasks
///
/// Changes to the same path run in plan order inside one task, so two
/// changes never race on one file. Distinct paths run concurrently, capped
/// by `max_concurrent` when set.
pub struct Updater {
    session: Arc<FileSession>,
    max_concurrent: Option<usize>,
}

impl Updater {
    pub fn new(session: FileSession, max_concurrent: Option<usize>) -> Self {
        Self {
            session: Arc::new(session),
            max_concurrent: max_concurrent.filter(|n| *n > 0),
        }
    }

    pub async fn run(&self, changes: Vec<FileChange>) -> RunSummary {
        let start = Instant::now();

        if changes.is_empty() {
            tracing::info!("plan contains no file changes, nothing to do");
            return RunSummary {
                results: Vec::new(),
                cost: CostTracker::new(),
                duration: start.elapsed(),
            };
        }

        let groups = group_by_path(changes);
        tracing::info!(
            files = groups.len(),
            backend = %self.session.backend_name(),
            max_concurrent = ?self.max_concurrent,
            "starting update run"
        );

        let semaphore = self.max_concurrent.map(|n| Arc::new(Semaphore::new(n)));
        let mut handles = Vec::with_capacity(groups.len());

        for (path, group) in groups {
            let session = self.session.clone();
            let semaphore = semaphore.clone();
            let count = group.len();

            handles.push((
                path,
                count,
                tokio::spawn(async move {
                    // Held for the whole group; dropped when the task ends
                    let _permit = match semaphore {
                        Some(ref s) => s.clone().acquire_owned().await.ok(),
                        None => None,
                    };

                    // Each change builds on what the previous one wrote
                    let mut base: Option<PathBuf> = None;
                    let mut results = Vec::with_capacity(group.len());
                    for change in &group {
                        let result = session.run_on(change, base.as_deref()).await;
                        if result.written_to.is_some() {
                            base = result.written_to.clone();
                        }
                        results.push(result);
                    }
                    results
                }),
            ));
        }

        let mut results = Vec::new();
        for (path, count, handle) in handles {
            match handle.await {
                Ok(group_results) => results.extend(group_results),
                Err(e) => {
                    tracing::error!(path = %path.display(), changes = count, error = %e, "update task failed");
                    results.extend(task_failed(&path, count, &e.to_string()));
                }
            }
        }

        let mut cost = CostTracker::new();
        for result in &results {
            cost.merge(&result.cost);
        }

        let summary = RunSummary {
            results,
            cost,
            duration: start.elapsed(),
        };

        tracing::info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            by_strategy = ?summary.by_strategy(),
            cost_usd = summary.cost.cost_usd,
            elapsed_ms = summary.duration.as_millis() as u64,
            "update run finished"
        );

        summary
    }
}

/// One failed result per change of a group whose task died
fn task_failed(path: &Path, count: usize, error: &str) -> Vec<FileUpdateResult> {
    (0..count)
        .map(|_| FileUpdateResult {
            path: path.to_path_buf(),
            strategy: UpdateStrategy::Failed {
                error: format!("update task failed: {}", error),
            },
            attempts: 0,
            written_to: None,
            cost: CostTracker::new(),
            duration: Duration::ZERO,
        })
        .collect()
}

/// Group changes by target path, keeping first-seen path order
fn group_by_path(changes: Vec<FileChange>) -> Vec<(PathBuf, Vec<FileChange>)> {
    let mut groups: Vec<(PathBuf, Vec<FileChange>)> = Vec::new();
    for change in changes {
        match groups.iter_mut().find(|(path, _)| *path == change.path) {
            Some((_, group)) => group.push(change),
            None => groups.push((change.path.clone(), vec![change])),
        }
    }
    groups
}
