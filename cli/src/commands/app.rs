// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! App commands
//!
//! Commands: ls, get, search, unbuild, read, build, export, import, copy,
//! publish, run

use anyhow::{Context, Result};
use clap::{ArgAction, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use qlik_orchestrator_core::{
    application::{
        assemble_failure, assemble_outcome, AppListQuery, BuildFromDirectoryRequest, BuildOptions,
        BuildRequest, LifecycleResult, UnbuildRequest,
    },
    domain::{
        catalog::SearchFilters,
        lifecycle::{
            ConflictPolicy, CopyRequest, ExportFormat, ExportRequest, ImportRequest,
            LifecycleOperation, PublishRequest,
        },
    },
};

use super::{emit, print_json};
use crate::services::Services;

#[derive(Subcommand)]
pub enum AppCommand {
    /// List apps
    Ls {
        #[arg(long)]
        space: Option<String>,

        #[arg(long)]
        collection: Option<String>,

        #[arg(long)]
        owner: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one app
    Get {
        #[arg(value_name = "APP_ID")]
        app_id: String,
    },

    /// Rank apps by relevance to a query
    Search {
        #[arg(value_name = "QUERY")]
        query: String,

        #[arg(long)]
        space: Option<String>,

        #[arg(long)]
        owner: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Decompose an app into a directory and read it back
    Unbuild {
        #[arg(long)]
        app: String,

        /// Target directory (default: spec.workspace.default_unbuild_directory)
        #[arg(long)]
        dir: Option<String>,

        #[arg(long)]
        no_data: bool,
    },

    /// Read an existing decomposition directory
    Read {
        #[arg(value_name = "DIR")]
        dir: String,
    },

    /// Build an app from component files or a decomposition directory
    Build {
        #[arg(long)]
        app: String,

        /// Decomposition directory; replaces the individual file flags
        #[arg(
            long,
            conflicts_with_all = [
                "connections", "script", "dimensions", "measures",
                "objects", "variables", "bookmarks", "app_properties",
            ]
        )]
        dir: Option<String>,

        #[arg(long)]
        connections: Option<String>,

        #[arg(long)]
        script: Option<String>,

        #[arg(long)]
        dimensions: Vec<String>,

        #[arg(long)]
        measures: Vec<String>,

        #[arg(long)]
        objects: Vec<String>,

        #[arg(long)]
        variables: Vec<String>,

        #[arg(long)]
        bookmarks: Vec<String>,

        #[arg(long)]
        app_properties: Option<String>,

        /// Row limit for the reload
        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        no_data: bool,

        #[arg(long)]
        no_reload: bool,

        #[arg(long)]
        no_save: bool,

        #[arg(long)]
        silent: bool,
    },

    /// Export an app to a local file
    Export {
        #[arg(long)]
        app: String,

        #[arg(short, long)]
        output: String,

        /// qvf, json or xlsx
        #[arg(long, default_value = "qvf")]
        format: ExportFormat,

        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        include_data: bool,

        #[arg(long)]
        no_data: bool,

        /// Overwrite an existing output file
        #[arg(long)]
        replace: bool,
    },

    /// Import an app from a .qvf or .json file
    Import {
        #[arg(long)]
        file: String,

        /// App name (default: file stem)
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        space: Option<String>,

        #[arg(long)]
        replace: bool,
    },

    /// Copy an app
    Copy {
        #[arg(long)]
        app: String,

        #[arg(long)]
        name: String,

        /// Target space (default: the source app's space)
        #[arg(long)]
        space: Option<String>,

        #[arg(long)]
        no_data: bool,

        #[arg(long)]
        copy_permissions: bool,
    },

    /// Publish an app to a managed space
    Publish {
        #[arg(long)]
        app: String,

        #[arg(long)]
        space: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        replace: bool,
    },

    /// Run a lifecycle request described in a JSON file
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

pub async fn handle_command(command: AppCommand, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let services = Services::load(config_path)?;

    match command {
        AppCommand::Ls {
            space,
            collection,
            owner,
            limit,
            offset,
            json,
        } => {
            let query = AppListQuery {
                space_id: space,
                collection_id: collection,
                owner,
                limit: Some(limit),
                offset: Some(offset),
            };
            list_apps(&services, query, json).await
        }
        AppCommand::Get { app_id } => {
            print_json(&services.catalog.get_app(&app_id).await?)?;
            Ok(ExitCode::SUCCESS)
        }
        AppCommand::Search {
            query,
            space,
            owner,
            limit,
        } => {
            let filters = SearchFilters {
                space_id: space,
                owner,
            };
            print_json(&services.catalog.search_apps(&query, filters, limit).await?)?;
            Ok(ExitCode::SUCCESS)
        }
        AppCommand::Unbuild { app, dir, no_data } => {
            let output = services
                .decomposition
                .unbuild(UnbuildRequest {
                    app,
                    directory: dir,
                    no_data,
                })
                .await?;
            emit(&output.assemble())
        }
        AppCommand::Read { dir } => {
            let output = services.decomposition.read_directory(&dir).await?;
            emit(&output.assemble())
        }
        AppCommand::Build {
            app,
            dir,
            connections,
            script,
            dimensions,
            measures,
            objects,
            variables,
            bookmarks,
            app_properties,
            limit,
            no_data,
            no_reload,
            no_save,
            silent,
        } => {
            let options = BuildOptions {
                limit,
                no_data,
                no_reload,
                no_save,
                silent,
            };
            let report = match dir {
                Some(directory) => {
                    services
                        .decomposition
                        .build_from_directory(BuildFromDirectoryRequest {
                            app,
                            directory,
                            options,
                        })
                        .await?
                }
                None => {
                    services
                        .decomposition
                        .build(BuildRequest {
                            app,
                            connections,
                            script,
                            dimensions,
                            measures,
                            objects,
                            variables,
                            bookmarks,
                            app_properties,
                            options,
                        })
                        .await?
                }
            };
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        AppCommand::Export {
            app,
            output,
            format,
            include_data,
            no_data,
            replace,
        } => {
            let request = ExportRequest {
                app_identifier: app,
                output_path: output,
                format,
                include_data,
                no_data,
                on_conflict: ConflictPolicy::from_replace_flag(replace),
            };
            report(services.lifecycle.export(request).await)
        }
        AppCommand::Import {
            file,
            name,
            space,
            replace,
        } => {
            let request = ImportRequest {
                file_path: file,
                app_name: name,
                space_id: space,
                on_conflict: ConflictPolicy::from_replace_flag(replace),
            };
            report(services.lifecycle.import(request).await)
        }
        AppCommand::Copy {
            app,
            name,
            space,
            no_data,
            copy_permissions,
        } => {
            let request = CopyRequest {
                source_app_id: app,
                target_name: name,
                target_space_id: space,
                include_data: !no_data,
                copy_permissions,
            };
            report(services.lifecycle.copy(request).await)
        }
        AppCommand::Publish {
            app,
            space,
            name,
            replace,
        } => {
            let request = PublishRequest {
                app_id: app,
                target_space_id: space,
                publish_name: name,
                on_conflict: ConflictPolicy::from_replace_flag(replace),
            };
            report(services.lifecycle.publish(request).await)
        }
        AppCommand::Run { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let operation: LifecycleOperation = serde_json::from_str(&content)
                .with_context(|| format!("Invalid lifecycle request in {}", file.display()))?;
            report(services.lifecycle.execute(operation).await)
        }
    }
}

fn report(result: LifecycleResult) -> Result<ExitCode> {
    match result {
        Ok(outcome) => emit(&assemble_outcome(&outcome)),
        Err(failure) => emit(&assemble_failure(&failure)),
    }
}

async fn list_apps(services: &Services, query: AppListQuery, json: bool) -> Result<ExitCode> {
    let apps = services.catalog.list_apps(query).await?;
    if json {
        print_json(&apps)?;
        return Ok(ExitCode::SUCCESS);
    }

    if apps.is_empty() {
        println!("{}", "No apps found".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} apps found:", apps.len());
    println!("{:<38} {:<32} {:<26} {}", "ID", "NAME", "SPACE", "PUBLISHED");
    for app in apps {
        println!(
            "{:<38} {:<32} {:<26} {}",
            app.id,
            app.name.bold(),
            app.space_name.or(app.space_id).unwrap_or_else(|| "personal".to_string()),
            if app.published { "yes".green() } else { "no".dimmed() }
        );
    }
    Ok(ExitCode::SUCCESS)
}
