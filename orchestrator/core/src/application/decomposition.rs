// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decomposition Service
//!
//! `app unbuild` followed by reading the resulting tree back, and the
//! reverse: `app build` from explicit component files or from a
//! decomposition directory.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Decomposition and recomposition use cases

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::directory_resolver::DirectoryResolver;
use crate::application::gateway::QlikGateway;
use crate::application::partial_artifact::PartialArtifacts;
use crate::application::result_assembler::{assemble_decomposition, DecompositionContext, StructuredResult};
use crate::domain::artifact::{Category, DecompositionResult};
use crate::domain::catalog::extract_app_id;
use crate::domain::config::WorkspaceSettings;
use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::infrastructure::content_reader::ContentReader;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbuildRequest {
    /// App id or name
    pub app: String,
    /// Falls back to `spec.workspace.default_unbuild_directory`
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub no_data: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnbuildOutput {
    pub result: DecompositionResult,
    pub context: DecompositionContext,
}

impl UnbuildOutput {
    pub fn assemble(&self) -> StructuredResult {
        assemble_decomposition(&self.result, &self.context)
    }
}

/// Inputs for `qlik app build`. Every path must name an existing file
/// inside the allowed root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub app: String,
    #[serde(default)]
    pub connections: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub objects: Vec<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub bookmarks: Vec<String>,
    #[serde(default)]
    pub app_properties: Option<String>,
    #[serde(default)]
    pub options: BuildOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Row limit for the reload
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub no_data: bool,
    #[serde(default)]
    pub no_reload: bool,
    #[serde(default)]
    pub no_save: bool,
    #[serde(default)]
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFromDirectoryRequest {
    pub app: String,
    pub directory: String,
    #[serde(default)]
    pub options: BuildOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub app: String,
    /// Id printed by the CLI, when it printed one
    pub app_id: Option<String>,
    /// Component files passed to the build, by category
    pub components: BTreeMap<Category, usize>,
    pub warnings: Vec<String>,
}

pub struct DecompositionService {
    gateway: QlikGateway,
    resolver: Arc<DirectoryResolver>,
    workspace: WorkspaceSettings,
}

impl DecompositionService {
    pub fn new(gateway: QlikGateway, resolver: Arc<DirectoryResolver>, workspace: WorkspaceSettings) -> Self {
        Self {
            gateway,
            resolver,
            workspace,
        }
    }

    fn reader(&self) -> ContentReader {
        ContentReader::with_limits(self.workspace.max_file_bytes, self.workspace.include_file_contents)
    }

    pub async fn unbuild(&self, request: UnbuildRequest) -> OrchestratorResult<UnbuildOutput> {
        if request.app.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("App identifier cannot be empty"));
        }

        let resolved = self.resolver.resolve(
            request.directory.as_deref(),
            self.workspace.default_unbuild_directory.as_deref(),
            true,
        )?;

        tracing::info!(
            app = %request.app,
            path = %resolved.path.display(),
            used_default = resolved.used_default,
            no_data = request.no_data,
            "Unbuilding app"
        );

        let mut partial = PartialArtifacts::new();
        if let Some(dir) = &resolved.created_root {
            partial.register(dir);
        }

        let command = self
            .gateway
            .command(["app", "unbuild"])
            .flag("--app", request.app.as_str())
            .flag("--dir", resolved.path.to_string_lossy())
            .switch("--no-data", request.no_data);

        let mut warnings = Vec::new();
        if let Err(e) = self.gateway.run(command).await {
            let report = partial.rollback();
            for warning in &report.warnings {
                tracing::warn!("{}", warning);
            }
            return Err(e);
        }
        partial.commit();

        let result = read_tree_blocking(self.reader(), resolved.path.clone())
            .await?
            .with_default_directory(resolved.used_default)
            .with_no_data_mode(request.no_data);

        if !self.workspace.include_file_contents {
            warnings.push("File contents omitted by configuration".to_string());
        }

        tracing::info!(
            app = %request.app,
            files = result.files.len(),
            unreadable = result.unreadable_files().count(),
            "Unbuild complete"
        );

        Ok(UnbuildOutput {
            result,
            context: DecompositionContext {
                app_id: Some(request.app),
                warnings,
            },
        })
    }

    /// Read an existing decomposition directory without invoking the CLI.
    pub async fn read_directory(&self, directory: &str) -> OrchestratorResult<UnbuildOutput> {
        let root = self.resolver.contain(directory)?;
        let result = read_tree_blocking(self.reader(), root).await?;
        Ok(UnbuildOutput {
            result,
            context: DecompositionContext {
                app_id: None,
                warnings: Vec::new(),
            },
        })
    }

    pub async fn build(&self, request: BuildRequest) -> OrchestratorResult<BuildReport> {
        if request.app.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("App name cannot be empty"));
        }

        let mut components = BTreeMap::new();
        let mut command = self
            .gateway
            .command(["app", "build"])
            .flag("--app", request.app.as_str());

        let singles = [
            ("--connections", Category::Connection, &request.connections),
            ("--script", Category::Script, &request.script),
            ("--app-properties", Category::AppProperties, &request.app_properties),
        ];
        for (flag, category, path) in singles {
            if let Some(path) = path {
                let file = self.existing_file(path, category)?;
                command = command.flag(flag, file.to_string_lossy());
                *components.entry(category).or_insert(0) += 1;
            }
        }

        let lists = [
            ("--dimensions", Category::Dimension, &request.dimensions),
            ("--measures", Category::Measure, &request.measures),
            ("--objects", Category::Object, &request.objects),
            ("--variables", Category::Variable, &request.variables),
            ("--bookmarks", Category::Bookmark, &request.bookmarks),
        ];
        for (flag, category, paths) in lists {
            for path in paths {
                let file = self.existing_file(path, category)?;
                command = command.flag(flag, file.to_string_lossy());
                *components.entry(category).or_insert(0) += 1;
            }
        }

        let options = &request.options;
        command = command
            .flag_opt("--limit", options.limit.map(|l| l.to_string()))
            .switch("--no-data", options.no_data)
            .switch("--no-reload", options.no_reload)
            .switch("--no-save", options.no_save)
            .switch("--silent", options.silent);

        tracing::info!(app = %request.app, components = components.values().sum::<usize>(), "Building app");
        let invocation = self.gateway.run(command).await?;

        Ok(BuildReport {
            app_id: extract_app_id(&invocation.stdout, invocation.parsed_json.as_ref()),
            app: request.app,
            components,
            warnings: Vec::new(),
        })
    }

    /// Recompose an app from a decomposition directory: every file is fed to
    /// the build flag matching its category.
    pub async fn build_from_directory(&self, request: BuildFromDirectoryRequest) -> OrchestratorResult<BuildReport> {
        let root = self.resolver.contain(&request.directory)?;
        let reader = ContentReader::with_limits(self.workspace.max_file_bytes, false);
        let tree = read_tree_blocking(reader, root.clone()).await?;

        let mut build = BuildRequest {
            app: request.app,
            options: request.options,
            ..Default::default()
        };
        let mut warnings = Vec::new();

        for file in &tree.files {
            let path = root.join(&file.relative_path).to_string_lossy().into_owned();
            let single = match file.category {
                Category::Script => Some(&mut build.script),
                Category::Connection => Some(&mut build.connections),
                Category::AppProperties => Some(&mut build.app_properties),
                _ => None,
            };
            if let Some(slot) = single {
                if slot.is_some() {
                    warnings.push(format!(
                        "Ignoring additional {} file {}",
                        file.category, file.relative_path
                    ));
                } else {
                    *slot = Some(path);
                }
                continue;
            }

            match file.category {
                Category::Dimension => build.dimensions.push(path),
                Category::Measure => build.measures.push(path),
                Category::Object => build.objects.push(path),
                Category::Variable => build.variables.push(path),
                Category::Bookmark => build.bookmarks.push(path),
                _ => warnings.push(format!("Skipping unrecognised file {}", file.relative_path)),
            }
        }

        if build.script.is_none() {
            warnings.push("No load script found in the directory".to_string());
        }

        let mut report = self.build(build).await?;
        report.warnings.extend(warnings);
        Ok(report)
    }

    fn existing_file(&self, path: &str, category: Category) -> OrchestratorResult<PathBuf> {
        let file = self.resolver.contain(path)?;
        if !file.is_file() {
            return Err(OrchestratorError::invalid_request(format!(
                "{} file not found: {}",
                category,
                file.display()
            )));
        }
        Ok(file)
    }
}

/// Run the content reader off the async runtime.
async fn read_tree_blocking(reader: ContentReader, root: PathBuf) -> OrchestratorResult<DecompositionResult> {
    let display = root.display().to_string();
    tokio::task::spawn_blocking(move || reader.read_tree(Path::new(&root)))
        .await
        .map_err(|e| OrchestratorError::UnreadableFile {
            path: display,
            reason: e.to_string(),
        })?
}
