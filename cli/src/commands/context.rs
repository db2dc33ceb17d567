// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! qlik-cli context and connectivity commands

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use super::print_json;
use crate::services::Services;

#[derive(Subcommand)]
pub enum ContextCommand {
    /// Create a context after checking the API key
    Create {
        #[arg(value_name = "NAME")]
        name: String,

        /// Tenant URL (https://<tenant>.<region>.qlikcloud.com)
        #[arg(long)]
        server: String,

        #[arg(long, env = "QLIK_API_KEY", hide_env_values = true)]
        api_key: String,
    },

    /// List contexts
    Ls {
        #[arg(long)]
        json: bool,
    },

    /// Show the active context
    Current,

    /// Switch the active context
    Use {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Remove a context
    Rm {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Show the qlik-cli version
    Version,

    /// Check the configured credentials against the tenant
    Validate,
}

pub async fn handle_command(command: ContextCommand, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let services = Services::load(config_path)?;
    let contexts = &services.contexts;

    match command {
        ContextCommand::Create {
            name,
            server,
            api_key,
        } => {
            contexts.create(&name, &server, &api_key).await?;
            println!("{}", format!("✓ Context '{name}' created").green());
        }
        ContextCommand::Ls { json } => {
            let list = contexts.list().await?;
            if json {
                print_json(&list)?;
            } else if list.contexts.is_empty() {
                println!("{}", "No contexts configured".yellow());
            } else {
                for context in &list.contexts {
                    if context.is_current {
                        println!("* {}", context.name.bold());
                    } else {
                        println!("  {}", context.name);
                    }
                }
            }
        }
        ContextCommand::Current => match contexts.current().await? {
            Some(context) => println!("{}", context.name),
            None => println!("{}", "No active context".yellow()),
        },
        ContextCommand::Use { name } => {
            contexts.use_context(&name).await?;
            println!("{}", format!("✓ Switched to context '{name}'").green());
        }
        ContextCommand::Rm { name } => {
            contexts.remove(&name).await?;
            println!("{}", format!("✓ Context '{name}' removed").green());
        }
        ContextCommand::Version => println!("{}", contexts.version().await?),
        ContextCommand::Validate => {
            if !contexts.validate_connection().await? {
                println!("{}", "✗ Connection failed: credentials were rejected".red());
                return Ok(ExitCode::FAILURE);
            }
            println!("{}", "✓ Connection OK".green());
        }
    }

    Ok(ExitCode::SUCCESS)
}
