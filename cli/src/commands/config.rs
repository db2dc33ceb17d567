// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use qlik_orchestrator_core::domain::config::{OrchestratorConfig, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./qlik-orchestrator.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<ExitCode> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(output, examples),
    }?;
    Ok(ExitCode::SUCCESS)
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = OrchestratorConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  --config flag: {}", path.display()),
            None => println!("  --config flag: {}", "(not set)".dimmed()),
        }
        if std::env::var(CONFIG_PATH_ENV).is_err() {
            println!("  {}: {}", CONFIG_PATH_ENV, "(not set)".dimmed());
        }
        for path in OrchestratorConfig::discovery_paths() {
            let marker = if path.exists() { "found".green() } else { "missing".dimmed() };
            println!("  {} ({})", path.display(), marker);
        }
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    let cli = &config.spec.cli;
    println!("{}", "qlik-cli:".bold());
    println!("  Executable: {}", cli.path);
    println!("  Server: {}", cli.server.as_deref().unwrap_or("(context default)"));
    println!("  Context: {}", cli.context.as_deref().unwrap_or("(current)"));
    println!("  Timeout: {}s", cli.command_timeout_seconds);
    if cli.insecure {
        println!("  {}", "TLS verification disabled".yellow());
    }
    println!();

    let workspace = &config.spec.workspace;
    println!("{}", "Workspace:".bold());
    println!("  Allowed root: {}", workspace.allowed_root.display());
    if let Some(dir) = &workspace.default_unbuild_directory {
        println!("  Default unbuild directory: {}", dir.display());
    }
    if let Some(dir) = &workspace.default_export_directory {
        println!("  Default export directory: {}", dir.display());
    }
    println!("  Include file contents: {}", workspace.include_file_contents);
    println!("  Max file bytes: {}", workspace.max_file_bytes);
    println!();

    let lifecycle = &config.spec.lifecycle;
    println!("{}", "Lifecycle:".bold());
    println!("  Min free space: {} bytes", lifecycle.min_free_space_bytes);
    println!("  Max import size: {} bytes", lifecycle.max_import_bytes);
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OrchestratorConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_templates_parse() {
        for template in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let config = qlik_orchestrator_core::domain::config::OrchestratorConfig::from_yaml_str(template)
                .expect("template should parse");
            config.validate().expect("template should validate");
        }
    }
}
