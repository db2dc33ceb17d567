// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Directory Resolver
//!
//! Picks the working directory for unbuild/build/export: an explicit caller
//! path wins over the configured default. Every candidate is contained in
//! the allowed root before the filesystem is touched.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Effective directory resolution and write checks

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::path_sanitizer::PathSanitizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPath {
    pub path: PathBuf,
    pub used_default: bool,
    pub created: bool,
    /// Topmost directory this call created, when it created any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_root: Option<PathBuf>,
}

pub struct DirectoryResolver {
    allowed_root: PathBuf,
    sanitizer: PathSanitizer,
}

impl DirectoryResolver {
    pub fn new(allowed_root: impl Into<PathBuf>) -> Self {
        Self {
            allowed_root: allowed_root.into(),
            sanitizer: PathSanitizer::new(),
        }
    }

    pub fn allowed_root(&self) -> &Path {
        &self.allowed_root
    }

    /// Contain an arbitrary caller path (file or directory) in the root.
    pub fn contain(&self, path: &str) -> OrchestratorResult<PathBuf> {
        self.sanitizer.contain(path, &self.allowed_root)
    }

    pub fn resolve(
        &self,
        explicit: Option<&str>,
        configured_default: Option<&Path>,
        must_create: bool,
    ) -> OrchestratorResult<ResolvedPath> {
        let explicit = explicit.filter(|p| !p.trim().is_empty());
        let (raw, used_default) = match (explicit, configured_default) {
            (Some(path), _) => (path.to_string(), false),
            (None, Some(default)) => (default.to_string_lossy().into_owned(), true),
            (None, None) => return Err(OrchestratorError::MissingDirectory),
        };

        let path = self.contain(&raw)?;

        if path.exists() && !path.is_dir() {
            return Err(OrchestratorError::InvalidPath(format!(
                "'{}' exists and is not a directory",
                path.display()
            )));
        }

        let mut created_root = None;
        if must_create {
            created_root = ensure_directory(&path)?;
            if let Err(e) = probe_writable(&path) {
                if let Some(dir) = &created_root {
                    if let Err(cleanup) = std::fs::remove_dir_all(dir) {
                        tracing::warn!(path = %dir.display(), error = %cleanup, "Failed to remove unwritable directory");
                    }
                }
                return Err(e);
            }
        }
        let created = created_root.is_some();

        tracing::debug!(
            path = %path.display(),
            used_default,
            created,
            "Resolved working directory"
        );

        Ok(ResolvedPath {
            path,
            used_default,
            created,
            created_root,
        })
    }
}

/// Create `path` with parents. Returns the topmost directory that was
/// missing beforehand. Losing a creation race to another caller is not an
/// error.
fn ensure_directory(path: &Path) -> OrchestratorResult<Option<PathBuf>> {
    if path.is_dir() {
        return Ok(None);
    }
    let topmost = path
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
        .last()
        .map(Path::to_path_buf);
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(topmost),
        Err(_) if path.is_dir() => Ok(None),
        Err(e) => Err(OrchestratorError::DirectoryNotWritable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn probe_writable(path: &Path) -> OrchestratorResult<()> {
    let probe = path.join(format!(".qlik-orchestrator-probe-{}", uuid::Uuid::new_v4()));
    std::fs::write(&probe, b"")
        .and_then(|_| std::fs::remove_file(&probe))
        .map_err(|e| OrchestratorError::DirectoryNotWritable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;

    #[test]
    fn test_explicit_wins_over_default() {
        let root = tempfile::tempdir().unwrap();
        let resolver = DirectoryResolver::new(root.path());
        let default = root.path().join("default");

        let resolved = resolver
            .resolve(Some("explicit"), Some(&default), true)
            .unwrap();
        assert_eq!(resolved.path, root.path().join("explicit"));
        assert!(!resolved.used_default);
        assert!(resolved.created);
        assert!(!default.exists());
    }

    #[test]
    fn test_default_used_when_no_explicit() {
        let root = tempfile::tempdir().unwrap();
        let resolver = DirectoryResolver::new(root.path());
        let default = root.path().join("unbuilds");

        let resolved = resolver.resolve(None, Some(&default), true).unwrap();
        assert!(resolved.used_default);
        assert!(resolved.path.is_dir());

        let blank = resolver.resolve(Some("  "), Some(&default), true).unwrap();
        assert!(blank.used_default);
        assert!(!blank.created);
    }

    #[test]
    fn test_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let resolver = DirectoryResolver::new(root.path());
        let err = resolver.resolve(None, None, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingDirectory);
    }

    #[test]
    fn test_traversal_rejected_before_creation() {
        let root = tempfile::tempdir().unwrap();
        let resolver = DirectoryResolver::new(root.path().join("inner"));

        let err = resolver.resolve(Some("../escape"), None, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathTraversal);
        assert!(!root.path().join("escape").exists());
    }

    #[test]
    fn test_creation_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let resolver = DirectoryResolver::new(root.path());

        let first = resolver.resolve(Some("a/b/c"), None, true).unwrap();
        let second = resolver.resolve(Some("a/b/c"), None, true).unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.path, second.path);
    }

    #[test]
    fn test_existing_file_is_not_a_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("plain"), b"x").unwrap();
        let resolver = DirectoryResolver::new(root.path());

        let err = resolver.resolve(Some("plain"), None, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
    }

    #[test]
    fn test_no_create_leaves_filesystem_alone() {
        let root = tempfile::tempdir().unwrap();
        let resolver = DirectoryResolver::new(root.path());
        let resolved = resolver.resolve(Some("later"), None, false).unwrap();
        assert!(!resolved.created);
        assert!(!resolved.path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_creation() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let root_path = root_path.clone();
                tokio::task::spawn_blocking(move || {
                    DirectoryResolver::new(root_path).resolve(Some("shared/out"), None, true)
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            let resolved = handle.await.unwrap().unwrap();
            if resolved.created {
                created += 1;
            }
        }
        assert!(created >= 1);
        assert!(root_path.join("shared/out").is_dir());
    }

    #[test]
    fn test_created_root_is_topmost_new_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("exports")).unwrap();
        let resolver = DirectoryResolver::new(root.path());

        let resolved = resolver.resolve(Some("exports/2026/q3"), None, true).unwrap();
        assert_eq!(resolved.created_root, Some(root.path().join("exports/2026")));

        let again = resolver.resolve(Some("exports/2026/q3"), None, true).unwrap();
        assert_eq!(again.created_root, None);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_creates_nothing_outside() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();
        let resolver = DirectoryResolver::new(root.path());

        let err = resolver.resolve(Some("link/escaped"), None, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathTraversal);
        assert!(!outside.path().join("escaped").exists());
    }
}
