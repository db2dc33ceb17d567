// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Partial Artifact Guard
//!
//! Tracks local files a lifecycle operation is about to produce. The
//! operation registers each path before the external call, then either
//! commits (keep everything) or rolls back (delete what exists). A guard
//! dropped without either rolls back on its own and logs the outcome.

use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub removed: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl RollbackReport {
    pub fn removed_any(&self) -> bool {
        !self.removed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PartialArtifacts {
    paths: Vec<PathBuf>,
    settled: bool,
}

impl PartialArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path this operation owns. Only paths that did not exist
    /// beforehand should be registered; a pre-existing file being replaced
    /// belongs to the caller.
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Keep every registered artifact.
    pub fn commit(mut self) {
        self.settled = true;
        self.paths.clear();
    }

    /// Remove every registered artifact that exists. Failures become
    /// warnings; they never replace the error that triggered the rollback.
    pub fn rollback(mut self) -> RollbackReport {
        self.settled = true;
        remove_all(std::mem::take(&mut self.paths))
    }
}

impl Drop for PartialArtifacts {
    fn drop(&mut self) {
        if self.settled || self.paths.is_empty() {
            return;
        }
        let report = remove_all(std::mem::take(&mut self.paths));
        for path in &report.removed {
            tracing::warn!(path = %path.display(), "Removed unsettled partial artifact");
        }
        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }
    }
}

fn remove_all(paths: Vec<PathBuf>) -> RollbackReport {
    let mut report = RollbackReport::default();
    for path in paths {
        match remove_path(&path) {
            Ok(true) => {
                tracing::info!(path = %path.display(), "Removed partial artifact");
                report.removed.push(path);
            }
            Ok(false) => {}
            Err(e) => report.warnings.push(format!(
                "Failed to remove partial artifact '{}': {}",
                path.display(),
                e
            )),
        }
    }
    report
}

fn remove_path(path: &Path) -> std::io::Result<bool> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path).map(|_| true),
        Ok(_) => std::fs::remove_file(path).map(|_| true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
