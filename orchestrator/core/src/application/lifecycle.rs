// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lifecycle Orchestrator
//!
//! Export, import, copy and publish as validate → execute → verify
//! pipelines over qlik-cli. The CLI is not transactional, so each pipeline
//! does its own conflict detection and resource checks up front and cleans
//! up local partial artifacts when a later step fails.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Lifecycle use cases and their state machine
//!
//! # State Machine
//!
//! ```text
//! Validating ──► Executing ──► Verifying ──► Completed
//!     │              │             │
//!     └──────────────┴─────────────┴──► Failed
//!                    └─────────────┴──► RolledBack
//! ```
//!
//! `RolledBack` means the tool failed after leaving a local partial
//! artifact and that artifact was removed. Remote apps are never deleted.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::directory_resolver::DirectoryResolver;
use crate::application::gateway::{AppListQuery, QlikGateway};
use crate::application::partial_artifact::PartialArtifacts;
use crate::domain::catalog::{extract_app_id, find_by_name, AppRecord};
use crate::domain::config::{LifecycleSettings, WorkspaceSettings};
use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::invocation::ToolInvocation;
use crate::domain::lifecycle::{
    CopyRequest, ExportFormat, ExportRequest, ExportedFile, ImportRequest, LifecycleOperation,
    OperationFailure, OperationKind, OperationOutcome, OperationRun, OperationState,
    PublishRequest,
};
use crate::domain::resources::{ensure_free_space, DiskSpaceProbe};

pub type LifecycleResult = Result<OperationOutcome, OperationFailure>;

const ACCEPTED_IMPORT_EXTENSIONS: &[&str] = &["qvf", "json"];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

pub struct LifecycleOrchestrator {
    gateway: QlikGateway,
    resolver: Arc<DirectoryResolver>,
    disk: Arc<dyn DiskSpaceProbe>,
    workspace: WorkspaceSettings,
    limits: LifecycleSettings,
}

impl LifecycleOrchestrator {
    pub fn new(
        gateway: QlikGateway,
        resolver: Arc<DirectoryResolver>,
        disk: Arc<dyn DiskSpaceProbe>,
        workspace: WorkspaceSettings,
        limits: LifecycleSettings,
    ) -> Self {
        Self {
            gateway,
            resolver,
            disk,
            workspace,
            limits,
        }
    }

    pub async fn execute(&self, operation: LifecycleOperation) -> LifecycleResult {
        match operation {
            LifecycleOperation::Export(request) => self.export(request).await,
            LifecycleOperation::Import(request) => self.import(request).await,
            LifecycleOperation::Copy(request) => self.copy(request).await,
            LifecycleOperation::Publish(request) => self.publish(request).await,
        }
    }

    // ========================================================================
    // Export
    // ========================================================================

    pub async fn export(&self, request: ExportRequest) -> LifecycleResult {
        let mut run = OperationRun::start(OperationKind::Export);
        tracing::info!(
            operation_id = %run.id,
            app = %request.app_identifier,
            output = %request.output_path,
            format = request.format.as_str(),
            "Starting export"
        );

        let (target, created_dir) = match self.validate_export(&request, &mut run).await {
            Ok(validated) => validated,
            Err(e) => return finish(Err(run.fail(e))),
        };

        let exclude_data = request.no_data || !request.include_data;
        let existed = target.exists();
        let mut partial = PartialArtifacts::new();
        match &created_dir {
            Some(dir) => partial.register(dir),
            None if !existed => partial.register(&target),
            None => {}
        }

        run.transition(OperationState::Executing);
        let command = self
            .gateway
            .command(["app", "export"])
            .flag("--app", request.app_identifier.as_str())
            .flag("--output", target.to_string_lossy())
            .flag_opt(
                "--format",
                (request.format != ExportFormat::Qvf).then_some(request.format.as_str()),
            )
            .switch("--no-data", exclude_data);

        if let Err(e) = self.gateway.run(command).await {
            return finish(Err(abort(run, partial, e)));
        }

        run.transition(OperationState::Verifying);
        match verify_export(target.clone(), request.format).await {
            Ok(exported) => {
                partial.commit();
                tracing::debug!(
                    operation_id = %run.id,
                    size_bytes = exported.size_bytes,
                    "Export verified"
                );
                finish(Ok(run.complete(exported.path.to_string_lossy().into_owned())))
            }
            Err(e) => {
                if existed {
                    // The tool rewrote the file; what is on disk now is its output.
                    partial.register(&target);
                }
                let report = partial.rollback();
                for warning in report.warnings {
                    run.warn(warning);
                }
                finish(Err(run.fail(e)))
            }
        }
    }

    /// Every check runs before the output directory is created, so a
    /// rejected export leaves the filesystem as it found it. Returns the
    /// target file and the topmost directory created for it.
    async fn validate_export(
        &self,
        request: &ExportRequest,
        run: &mut OperationRun,
    ) -> OrchestratorResult<(PathBuf, Option<PathBuf>)> {
        if request.app_identifier.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("App identifier cannot be empty"));
        }
        if request.output_path.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("Output path cannot be empty"));
        }
        if request.no_data && request.include_data {
            tracing::warn!(operation_id = %run.id, "Both no_data and include_data set; exporting without data");
            run.warn("Both no_data and include_data were set; exported without data");
        }

        let target = self.export_target(&request.output_path)?;
        let file_name = target.file_name().map(|n| n.to_string_lossy().into_owned());
        let (Some(file_name), Some(parent)) = (file_name, target.parent()) else {
            return Err(OrchestratorError::InvalidPath(format!(
                "'{}' does not name a file",
                request.output_path
            )));
        };
        let parent = parent.to_string_lossy().into_owned();

        let directory = self.resolver.resolve(Some(&parent), None, false)?;

        if target.is_dir() {
            return Err(OrchestratorError::InvalidPath(format!(
                "'{}' is a directory",
                target.display()
            )));
        }
        if target.exists() && !request.on_conflict.replaces() {
            return Err(OrchestratorError::ConflictError {
                name: file_name,
                location: format!("directory '{}'", directory.path.display()),
            });
        }

        match ensure_free_space(self.disk.as_ref(), &directory.path, self.limits.min_free_space_bytes)? {
            Some(available) => tracing::debug!(operation_id = %run.id, available, "Free space checked"),
            None => run.warn(format!(
                "Free space at '{}' could not be determined; export attempted anyway",
                directory.path.display()
            )),
        }

        self.gateway.get_app(&request.app_identifier).await?;

        let directory = self.resolver.resolve(Some(&parent), None, true)?;
        Ok((target, directory.created_root))
    }

    /// Relative output paths land in the default export directory when one is
    /// configured, otherwise under the allowed root.
    fn export_target(&self, output_path: &str) -> OrchestratorResult<PathBuf> {
        let raw = Path::new(output_path);
        match &self.workspace.default_export_directory {
            Some(dir) if !raw.is_absolute() => self.resolver.contain(&dir.join(raw).to_string_lossy()),
            _ => self.resolver.contain(output_path),
        }
    }

    // ========================================================================
    // Import
    // ========================================================================

    pub async fn import(&self, request: ImportRequest) -> LifecycleResult {
        let mut run = OperationRun::start(OperationKind::Import);
        tracing::info!(
            operation_id = %run.id,
            file = %request.file_path,
            space = ?request.space_id,
            "Starting import"
        );

        let (file, app_name) = match self.validate_import(&request, &mut run).await {
            Ok(validated) => validated,
            Err(e) => return finish(Err(run.fail(e))),
        };
        let location = space_location(request.space_id.as_deref());

        run.transition(OperationState::Executing);
        let command = self
            .gateway
            .command(["app", "import"])
            .flag("--file", file.to_string_lossy())
            .flag("--name", app_name.as_str())
            .flag_opt("--space", request.space_id.as_deref())
            .switch("--replace", request.on_conflict.replaces());

        let invocation = match self.gateway.run(command).await {
            Ok(invocation) => invocation,
            Err(e) => return finish(Err(run.fail(e.relay_conflict(&app_name, &location)))),
        };

        run.transition(OperationState::Verifying);
        match self
            .verify_created(&invocation, &app_name, request.space_id.as_deref())
            .await
        {
            Ok(app) => finish(Ok(run.complete(app.id))),
            Err(e) => {
                run.warn(format!("'{app_name}' may exist in {location} without passing verification"));
                finish(Err(run.fail(e)))
            }
        }
    }

    async fn validate_import(
        &self,
        request: &ImportRequest,
        run: &mut OperationRun,
    ) -> OrchestratorResult<(PathBuf, String)> {
        if request.file_path.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("File path cannot be empty"));
        }
        let file = self.resolver.contain(&request.file_path)?;

        let metadata = std::fs::metadata(&file).map_err(|_| {
            OrchestratorError::invalid_request(format!("Import file not found: {}", file.display()))
        })?;
        if !metadata.is_file() {
            return Err(OrchestratorError::invalid_request(format!(
                "Import path is not a file: {}",
                file.display()
            )));
        }
        if metadata.len() == 0 {
            return Err(OrchestratorError::invalid_request("Import file is empty"));
        }
        if metadata.len() > self.limits.max_import_bytes {
            return Err(OrchestratorError::invalid_request(format!(
                "Import file is {} bytes; the limit is {} bytes",
                metadata.len(),
                self.limits.max_import_bytes
            )));
        }

        let extension = file
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !ACCEPTED_IMPORT_EXTENSIONS.contains(&extension.as_str()) {
            return Err(OrchestratorError::invalid_request(format!(
                "Unsupported import file type '.{extension}'. Accepted: .qvf, .json"
            )));
        }

        let app_name = request
            .app_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| file.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| OrchestratorError::invalid_request("App name cannot be empty"))?;

        if !request.on_conflict.replaces() {
            self.ensure_name_free(&app_name, request.space_id.as_deref(), run)
                .await?;
        }

        Ok((file, app_name))
    }

    // ========================================================================
    // Copy
    // ========================================================================

    pub async fn copy(&self, request: CopyRequest) -> LifecycleResult {
        let mut run = OperationRun::start(OperationKind::Copy);
        tracing::info!(
            operation_id = %run.id,
            app = %request.source_app_id,
            target_name = %request.target_name,
            "Starting copy"
        );

        let target_space = match self.validate_copy(&request, &mut run).await {
            Ok(space) => space,
            Err(e) => return finish(Err(run.fail(e))),
        };
        let location = space_location(target_space.as_deref());

        run.transition(OperationState::Executing);
        let command = self
            .gateway
            .command(["app", "copy"])
            .flag("--app", request.source_app_id.as_str())
            .flag("--name", request.target_name.as_str())
            .flag_opt("--space", target_space.as_deref())
            .switch("--no-data", !request.include_data)
            .switch("--copy-permissions", request.copy_permissions);

        let invocation = match self.gateway.run(command).await {
            Ok(invocation) => invocation,
            Err(e) => {
                return finish(Err(
                    run.fail(e.relay_conflict(&request.target_name, &location))
                ))
            }
        };

        run.transition(OperationState::Verifying);
        match self
            .verify_created(&invocation, &request.target_name, target_space.as_deref())
            .await
        {
            Ok(app) => finish(Ok(run.complete(app.id))),
            Err(e) => finish(Err(run.fail(e))),
        }
    }

    /// Returns the effective target space.
    async fn validate_copy(
        &self,
        request: &CopyRequest,
        run: &mut OperationRun,
    ) -> OrchestratorResult<Option<String>> {
        if request.target_name.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("Target app name cannot be empty"));
        }

        let source = self.gateway.get_app(&request.source_app_id).await?;
        let explicit_space = request
            .target_space_id
            .clone()
            .filter(|s| !s.trim().is_empty());

        // The source's own space is known to exist; an explicit one is checked.
        if let Some(space_id) = &explicit_space {
            if self.gateway.find_space(space_id).await?.is_none() {
                return Err(OrchestratorError::invalid_request(format!(
                    "Target space '{space_id}' not found or not accessible"
                )));
            }
        }
        let target_space = explicit_space.or(source.space_id);

        self.ensure_name_free(&request.target_name, target_space.as_deref(), run)
            .await?;
        Ok(target_space)
    }

    // ========================================================================
    // Publish
    // ========================================================================

    pub async fn publish(&self, request: PublishRequest) -> LifecycleResult {
        let mut run = OperationRun::start(OperationKind::Publish);
        tracing::info!(
            operation_id = %run.id,
            app = %request.app_id,
            space = %request.target_space_id,
            "Starting publish"
        );

        let publish_name = match self.validate_publish(&request, &mut run).await {
            Ok(name) => name,
            Err(e) => return finish(Err(run.fail(e))),
        };
        let location = space_location(Some(&request.target_space_id));

        run.transition(OperationState::Executing);
        let command = self
            .gateway
            .command(["app", "publish"])
            .flag("--app", request.app_id.as_str())
            .flag("--space", request.target_space_id.as_str())
            .flag_opt("--name", request.publish_name.as_deref().filter(|n| !n.trim().is_empty()))
            .switch("--replace", request.on_conflict.replaces());

        let invocation = match self.gateway.run(command).await {
            Ok(invocation) => invocation,
            Err(e) => return finish(Err(run.fail(e.relay_conflict(&publish_name, &location)))),
        };

        run.transition(OperationState::Verifying);
        match self
            .verify_created(&invocation, &publish_name, Some(&request.target_space_id))
            .await
        {
            Ok(app) => finish(Ok(run.complete(app.id))),
            Err(e) => finish(Err(run.fail(e))),
        }
    }

    /// Returns the name the app is published under.
    async fn validate_publish(
        &self,
        request: &PublishRequest,
        run: &mut OperationRun,
    ) -> OrchestratorResult<String> {
        if request.target_space_id.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("Target space ID cannot be empty"));
        }

        let source = self.gateway.get_app(&request.app_id).await?;

        let space = self
            .gateway
            .find_space(&request.target_space_id)
            .await?
            .ok_or_else(|| {
                OrchestratorError::invalid_request(format!(
                    "Target space '{}' not found",
                    request.target_space_id
                ))
            })?;
        if !space.is_managed() {
            return Err(OrchestratorError::invalid_request(format!(
                "Target space '{}' is a {} space; apps can only be published to managed spaces",
                space.name,
                space.space_type.as_str()
            )));
        }

        let publish_name = request
            .publish_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(source.name);

        if !request.on_conflict.replaces() {
            self.ensure_name_free(&publish_name, Some(&space.id), run).await?;
        }
        Ok(publish_name)
    }

    // ========================================================================
    // Shared steps
    // ========================================================================

    /// Fail with `ConflictError` if an app named `name` exists in the space.
    /// A probe the tool rejects is downgraded to a warning; the tool still
    /// has the final word when the mutating call runs.
    async fn ensure_name_free(
        &self,
        name: &str,
        space_id: Option<&str>,
        run: &mut OperationRun,
    ) -> OrchestratorResult<()> {
        let apps = match self.gateway.list_apps(&AppListQuery::in_space(space_id)).await {
            Ok(apps) => apps,
            Err(e @ OrchestratorError::ToolReportedError { .. }) => {
                tracing::warn!(operation_id = %run.id, error = %e, "Could not check for existing apps");
                run.warn(format!("Could not check for existing apps named '{name}': {e}"));
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if find_by_name(&apps, name, space_id).next().is_some() {
            return Err(OrchestratorError::ConflictError {
                name: name.to_string(),
                location: space_location(space_id),
            });
        }
        Ok(())
    }

    /// Confirm the app a mutating call created is retrievable: by the id the
    /// CLI printed, or else by name in the target space.
    async fn verify_created(
        &self,
        invocation: &ToolInvocation,
        name: &str,
        space_id: Option<&str>,
    ) -> OrchestratorResult<AppRecord> {
        if let Some(id) = extract_app_id(&invocation.stdout, invocation.parsed_json.as_ref()) {
            return match self.gateway.get_app(&id).await {
                Ok(app) if space_id.is_some() && app.space_id.is_some() && app.space_id.as_deref() != space_id => {
                    Err(OrchestratorError::VerificationFailed(format!(
                        "app {} is in space '{}', not {}",
                        id,
                        app.space_id.unwrap_or_default(),
                        space_location(space_id)
                    )))
                }
                Ok(app) => Ok(app),
                Err(OrchestratorError::ArtifactNotFound(_)) => Err(OrchestratorError::VerificationFailed(
                    format!("app {id} reported by qlik-cli is not retrievable"),
                )),
                Err(e) => Err(e),
            };
        }

        let apps = self
            .gateway
            .list_apps(&AppListQuery::in_space(space_id))
            .await
            .map_err(|e| match e {
                OrchestratorError::ToolReportedError { stderr, .. } => {
                    OrchestratorError::VerificationFailed(format!("could not list apps: {stderr}"))
                }
                other => other,
            })?;

        let found = find_by_name(&apps, name, space_id).next().cloned();
        found.ok_or_else(|| {
            OrchestratorError::VerificationFailed(format!(
                "no app named '{}' found in {}",
                name,
                space_location(space_id)
            ))
        })
    }
}

/// Clean up after a failed tool call. A tool-reported failure that left a
/// partial file behind ends `RolledBack`; everything else ends `Failed`.
fn abort(mut run: OperationRun, partial: PartialArtifacts, error: OrchestratorError) -> OperationFailure {
    let report = partial.rollback();
    for warning in report.warnings.iter().cloned() {
        run.warn(warning);
    }
    if report.removed_any() && !error.kind().is_infrastructure() {
        run.roll_back(error)
    } else {
        run.fail(error)
    }
}

fn finish(result: LifecycleResult) -> LifecycleResult {
    match &result {
        Ok(outcome) => tracing::info!(
            operation_id = %outcome.operation_id,
            kind = %outcome.kind,
            artifact = %outcome.artifact_locator,
            duration_ms = outcome.duration_ms,
            "Operation completed"
        ),
        Err(failure) => tracing::error!(
            operation_id = %failure.operation_id,
            kind = %failure.kind,
            error_kind = %failure.error_kind,
            final_state = ?failure.final_state,
            error = %failure.error,
            "Operation failed"
        ),
    }
    result
}

fn space_location(space_id: Option<&str>) -> String {
    match space_id {
        Some(space) => format!("space '{space}'"),
        None => "personal space".to_string(),
    }
}

/// Check the exported file exists, is non-empty and looks like `format`.
async fn verify_export(path: PathBuf, format: ExportFormat) -> OrchestratorResult<ExportedFile> {
    tokio::task::spawn_blocking(move || check_export_file(&path, format))
        .await
        .map_err(|e| OrchestratorError::VerificationFailed(e.to_string()))?
}

fn check_export_file(path: &Path, format: ExportFormat) -> OrchestratorResult<ExportedFile> {
    let metadata = std::fs::metadata(path).map_err(|_| {
        OrchestratorError::VerificationFailed(format!(
            "export completed but output file not found: {}",
            path.display()
        ))
    })?;
    if !metadata.is_file() {
        return Err(OrchestratorError::VerificationFailed(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(OrchestratorError::VerificationFailed(format!(
            "{} is empty",
            path.display()
        )));
    }

    let open = || {
        std::fs::File::open(path).map_err(|e| {
            OrchestratorError::VerificationFailed(format!("cannot open {}: {}", path.display(), e))
        })
    };
    match format {
        ExportFormat::Qvf => {}
        ExportFormat::Json => {
            serde_json::from_reader::<_, serde::de::IgnoredAny>(BufReader::new(open()?)).map_err(|e| {
                OrchestratorError::VerificationFailed(format!("{} is not valid JSON: {}", path.display(), e))
            })?;
        }
        ExportFormat::Xlsx => {
            let mut magic = [0u8; 4];
            let is_zip = open()?.read_exact(&mut magic).is_ok() && magic == ZIP_MAGIC;
            if !is_zip {
                return Err(OrchestratorError::VerificationFailed(format!(
                    "{} is not an xlsx archive",
                    path.display()
                )));
            }
        }
    }

    Ok(ExportedFile {
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
    })
}
