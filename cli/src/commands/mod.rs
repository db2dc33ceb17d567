// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the qlikctl CLI

pub mod app;
pub mod config;
pub mod context;
pub mod space;

pub use self::app::AppCommand;
pub use self::config::ConfigCommand;
pub use self::context::ContextCommand;
pub use self::space::SpaceCommand;

use anyhow::{Context, Result};
use serde::Serialize;
use std::process::ExitCode;

use qlik_orchestrator_core::application::StructuredResult;

/// Print a structured result as JSON; failed results exit non-zero.
pub fn emit(result: &StructuredResult) -> Result<ExitCode> {
    print_json(result)?;
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON output")?;
    println!("{rendered}");
    Ok(())
}
