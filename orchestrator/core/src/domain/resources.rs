// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Local resource checks run before a lifecycle operation writes to disk.

use std::path::Path;

use crate::domain::errors::{OrchestratorError, OrchestratorResult};

/// Reports free space on the filesystem holding a path.
pub trait DiskSpaceProbe: Send + Sync {
    fn available_bytes(&self, path: &Path) -> std::io::Result<u64>;
}

/// Fail with `InsufficientSpace` unless `path` has at least `required`
/// bytes free. Returns the free byte count, or `None` when the probe cannot
/// answer; an unknown amount does not block the operation.
pub fn ensure_free_space(
    probe: &dyn DiskSpaceProbe,
    path: &Path,
    required: u64,
) -> OrchestratorResult<Option<u64>> {
    let available = match probe.available_bytes(path) {
        Ok(available) => available,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot determine free space");
            return Ok(None);
        }
    };

    if available < required {
        return Err(OrchestratorError::InsufficientSpace {
            path: path.to_path_buf(),
            available,
            required,
        });
    }
    Ok(Some(available))
}
