// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # qlikctl
//!
//! Command-line front end for the Qlik app lifecycle orchestrator. Every
//! command runs the orchestrator in-process and drives `qlik` (qlik-cli)
//! as a subprocess.
//!
//! ## Commands
//!
//! - `qlikctl app ls|get|search` - Discovery
//! - `qlikctl app unbuild|read|build` - Decomposition and recomposition
//! - `qlikctl app export|import|copy|publish|run` - Lifecycle operations
//! - `qlikctl space ls` - Spaces
//! - `qlikctl context create|ls|current|use|rm|version|validate` - qlik-cli contexts
//! - `qlikctl config show|validate|generate` - Configuration management
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use qlik_orchestrator::commands::{self, AppCommand, ConfigCommand, ContextCommand, SpaceCommand};

/// Qlik app lifecycle orchestrator
#[derive(Parser)]
#[command(name = "qlikctl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "QLIK_ORCHESTRATOR_CONFIG",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "QLIK_ORCHESTRATOR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// App discovery, decomposition and lifecycle operations
    #[command(name = "app")]
    App {
        #[command(subcommand)]
        command: AppCommand,
    },

    /// Space listing
    #[command(name = "space")]
    Space {
        #[command(subcommand)]
        command: SpaceCommand,
    },

    /// qlik-cli contexts and connectivity
    #[command(name = "context")]
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::App { command } => commands::app::handle_command(command, cli.config).await,
        Commands::Space { command } => commands::space::handle_command(command, cli.config).await,
        Commands::Context { command } => commands::context::handle_command(command, cli.config).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
