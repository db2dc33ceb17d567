// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use qlik_orchestrator_core::domain::catalog::SpaceType;

use super::print_json;
use crate::services::Services;

#[derive(Subcommand)]
pub enum SpaceCommand {
    /// List spaces
    Ls {
        /// personal, shared or managed
        #[arg(long = "type", value_name = "TYPE")]
        space_type: Option<SpaceType>,

        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: SpaceCommand, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let services = Services::load(config_path)?;

    match command {
        SpaceCommand::Ls { space_type, json } => {
            let spaces = services.catalog.list_spaces(space_type).await?;
            if json {
                print_json(&spaces)?;
                return Ok(ExitCode::SUCCESS);
            }
            if spaces.is_empty() {
                println!("{}", "No spaces found".yellow());
                return Ok(ExitCode::SUCCESS);
            }

            println!("{:<26} {:<32} {}", "ID", "NAME", "TYPE");
            for space in spaces {
                let kind = if space.is_managed() {
                    space.space_type.as_str().green()
                } else {
                    space.space_type.as_str().normal()
                };
                println!("{:<26} {:<32} {}", space.id, space.name.bold(), kind);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
