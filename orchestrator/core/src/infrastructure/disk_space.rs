// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::path::Path;

use crate::domain::resources::DiskSpaceProbe;

/// Free-space probe backed by `statvfs`/`GetDiskFreeSpaceEx` via `fs2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fs2DiskSpaceProbe;

impl DiskSpaceProbe for Fs2DiskSpaceProbe {
    fn available_bytes(&self, path: &Path) -> std::io::Result<u64> {
        // The target may not exist yet; measure the nearest existing ancestor.
        let existing = path
            .ancestors()
            .find(|p| p.exists())
            .unwrap_or(path);
        fs2::available_space(existing)
    }
}
