// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Path Sanitizer Domain Service
//!
//! Path normalization and containment checks. Every caller-supplied
//! directory or file path is normalized here before the resolver or the
//! orchestrator touches the filesystem, so neither `../` sequences nor
//! symlinks can move an operation outside the configured allowed root.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Path traversal prevention

use std::path::{Component, Path, PathBuf};

use crate::domain::errors::OrchestratorError;

/// Path sanitizer domain service
///
/// # Security Guarantees
/// - `..` components are resolved lexically; a path that climbs above the
///   allowed root is rejected
/// - Symlinks along the existing part of a path are resolved and the
///   physical location must also sit under the (resolved) allowed root
/// - Relative paths are anchored at the allowed root
/// - Null bytes and over-long paths are rejected
pub struct PathSanitizer {
    /// Maximum allowed path length (default: 4096)
    max_path_len: usize,
}

impl PathSanitizer {
    /// Create a new path sanitizer with default settings
    pub fn new() -> Self {
        Self { max_path_len: 4096 }
    }

    /// Reject malformed input before any normalization happens.
    pub fn validate(&self, path: &str) -> Result<(), OrchestratorError> {
        if path.trim().is_empty() {
            return Err(OrchestratorError::InvalidPath("path is empty".to_string()));
        }

        if path.len() > self.max_path_len {
            return Err(OrchestratorError::InvalidPath(format!(
                "path exceeds {} characters",
                self.max_path_len
            )));
        }

        if path.contains('\0') {
            tracing::warn!(path = %path.escape_debug(), "Path contains null byte");
            return Err(OrchestratorError::InvalidPath(
                "path contains null byte".to_string(),
            ));
        }

        Ok(())
    }

    /// Normalize `path` lexically: `.` is dropped and `..` pops the previous
    /// component. Fails if `..` would climb above the start of the path.
    pub fn normalize(&self, path: &Path) -> Result<PathBuf, OrchestratorError> {
        let mut normalized = PathBuf::new();
        let mut depth = 0usize;

        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    normalized.push(component);
                }
                Component::CurDir => {}
                Component::Normal(part) => {
                    normalized.push(part);
                    depth += 1;
                }
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(OrchestratorError::InvalidPath(format!(
                            "'{}' climbs above its starting point",
                            path.display()
                        )));
                    }
                    normalized.pop();
                    depth -= 1;
                }
            }
        }

        Ok(normalized)
    }

    /// Normalize `path` and require it to stay within `allowed_root`.
    ///
    /// Relative paths are joined onto the root first. The root itself is
    /// normalized the same way, so `/srv/apps/./x` and `/srv/apps/x` agree.
    pub fn contain(&self, path: &str, allowed_root: &Path) -> Result<PathBuf, OrchestratorError> {
        self.validate(path)?;

        let root = self.normalize(allowed_root)?;
        let candidate = PathBuf::from(path);
        let anchored = if candidate.is_absolute() {
            candidate
        } else {
            root.join(candidate)
        };

        let normalized = self.normalize(&anchored).map_err(|_| OrchestratorError::PathTraversal {
            path: path.to_string(),
            root: root.clone(),
        })?;

        if !normalized.starts_with(&root) {
            tracing::warn!(
                path = %path,
                root = %root.display(),
                "Path outside allowed root detected"
            );
            return Err(OrchestratorError::PathTraversal {
                path: path.to_string(),
                root,
            });
        }

        let physical_root = physical(&root)?;
        let physical_path = physical(&normalized)?;
        if !physical_path.starts_with(&physical_root) {
            tracing::warn!(
                path = %path,
                resolved = %physical_path.display(),
                root = %physical_root.display(),
                "Path escapes allowed root through a symlink"
            );
            return Err(OrchestratorError::PathTraversal {
                path: path.to_string(),
                root,
            });
        }

        Ok(normalized)
    }
}

/// Resolve symlinks in the longest existing prefix of a normalized path and
/// append the missing tail unchanged. A missing tail holds no links.
fn physical(path: &Path) -> Result<PathBuf, OrchestratorError> {
    let mut existing = path;
    let mut tail = Vec::new();

    loop {
        let probe = if existing.as_os_str().is_empty() {
            Path::new(".")
        } else {
            existing
        };
        match std::fs::canonicalize(probe) {
            Ok(mut resolved) => {
                resolved.extend(tail.iter().rev());
                return Ok(resolved);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if std::fs::symlink_metadata(probe).is_ok() {
                    return Err(OrchestratorError::InvalidPath(format!(
                        "'{}' is a dangling symlink",
                        existing.display()
                    )));
                }
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        tail.push(name);
                        existing = parent;
                    }
                    _ => return Ok(path.to_path_buf()),
                }
            }
            Err(e) => {
                return Err(OrchestratorError::InvalidPath(format!(
                    "cannot resolve '{}': {}",
                    existing.display(),
                    e
                )))
            }
        }
    }
}

impl Default for PathSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;

    #[test]
    fn test_simple_path() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.contain("/workspace/file.txt", Path::new("/workspace"));
        assert_eq!(result.unwrap(), PathBuf::from("/workspace/file.txt"));
    }

    #[test]
    fn test_relative_path_is_anchored() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.contain("apps/sales", Path::new("/workspace"));
        assert_eq!(result.unwrap(), PathBuf::from("/workspace/apps/sales"));
    }

    #[test]
    fn test_reject_escape() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.contain("/workspace/../etc/passwd", Path::new("/workspace"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::PathTraversal);

        let result = sanitizer.contain("../../../etc/passwd", Path::new("/workspace"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::PathTraversal);
    }

    #[test]
    fn test_inner_parent_dir_stays_inside() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.contain("/workspace/a/../b", Path::new("/workspace"));
        assert_eq!(result.unwrap(), PathBuf::from("/workspace/b"));
    }

    #[test]
    fn test_sibling_prefix_is_outside() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.contain("/workspace-evil/x", Path::new("/workspace"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::PathTraversal);
    }

    #[test]
    fn test_normalize_current_dir() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.contain("/workspace/./subdir/./file.txt", Path::new("/workspace"));
        assert_eq!(result.unwrap(), PathBuf::from("/workspace/subdir/file.txt"));
    }

    #[test]
    fn test_path_too_long() {
        let sanitizer = PathSanitizer::new();
        let long = format!("/{}", "a/".repeat(2100));
        let result = sanitizer.contain(&long, Path::new("/"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidPath);
    }

    #[test]
    fn test_validate_quick_check() {
        let sanitizer = PathSanitizer::new();
        assert!(sanitizer.validate("/workspace/file.txt").is_ok());
        assert!(sanitizer.validate("").is_err());
        assert!(sanitizer.validate("/path\0/with/null").is_err());
    }

    #[test]
    fn test_every_escape_rejected_every_inside_accepted() {
        let sanitizer = PathSanitizer::new();
        let root = Path::new("/srv/apps");
        let inside = ["/srv/apps", "/srv/apps/x", "x/y/..", "x/../y", "./a/b/c/../../d"];
        let outside = ["/srv", "/srv/apps/..", "/srv/other", "..", "a/../../b", "/srv/apps/x/../../y"];

        for path in inside {
            let resolved = sanitizer.contain(path, root).unwrap();
            assert!(resolved.starts_with(root), "{path} should stay inside");
        }
        for path in outside {
            assert!(sanitizer.contain(path, root).is_err(), "{path} should be rejected");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_rejected() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();
        let sanitizer = PathSanitizer::new();

        for path in ["link", "link/escaped", "link/a/b/out.qvf"] {
            let err = sanitizer.contain(path, root.path()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PathTraversal, "{path} should be rejected");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_within_root_allowed() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("real")).unwrap();
        std::os::unix::fs::symlink(root.path().join("real"), root.path().join("alias")).unwrap();
        let sanitizer = PathSanitizer::new();

        let resolved = sanitizer.contain("alias/new/app.qvf", root.path()).unwrap();
        assert_eq!(resolved, root.path().join("alias/new/app.qvf"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_rejected() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("missing.qvf"), root.path().join("out.qvf")).unwrap();
        let sanitizer = PathSanitizer::new();

        let err = sanitizer.contain("out.qvf", root.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_root_is_resolved() {
        let base = tempfile::tempdir().unwrap();
        std::fs::create_dir(base.path().join("real")).unwrap();
        std::os::unix::fs::symlink(base.path().join("real"), base.path().join("root")).unwrap();
        let sanitizer = PathSanitizer::new();

        let root = base.path().join("root");
        assert!(sanitizer.contain("apps/sales", &root).is_ok());
    }
}
