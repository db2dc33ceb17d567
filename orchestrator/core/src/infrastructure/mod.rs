// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod content_reader;
pub mod disk_space;
pub mod qlik_cli;

pub use content_reader::ContentReader;
pub use disk_space::Fs2DiskSpaceProbe;
pub use qlik_cli::ProcessToolInvoker;
