// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lifecycle Operations
//!
//! Request types for export/import/copy/publish, the per-operation state
//! machine, and the success/failure records the orchestrator returns.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Lifecycle operation model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

use crate::domain::errors::{ErrorKind, OrchestratorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Export,
    Import,
    Copy,
    Publish,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Export => "export",
            Self::Import => "import",
            Self::Copy => "copy",
            Self::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// What to do when the target name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Fail,
    Replace,
}

impl ConflictPolicy {
    pub fn from_replace_flag(replace: bool) -> Self {
        if replace {
            Self::Replace
        } else {
            Self::Fail
        }
    }

    pub fn replaces(&self) -> bool {
        matches!(self, Self::Replace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Qvf,
    Json,
    Xlsx,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qvf => "qvf",
            Self::Json => "json",
            Self::Xlsx => "xlsx",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qvf" => Ok(Self::Qvf),
            "json" => Ok(Self::Json),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(OrchestratorError::invalid_request(format!(
                "Invalid export format: {other}. Valid formats: qvf, json, xlsx"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub app_identifier: String,
    /// Target file. Relative paths resolve against the default export
    /// directory, or the allowed root when none is configured.
    pub output_path: String,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default = "default_true")]
    pub include_data: bool,
    #[serde(default)]
    pub no_data: bool,
    /// Replace an existing output file.
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub file_path: String,
    /// Defaults to the file stem.
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRequest {
    pub source_app_id: String,
    pub target_name: String,
    /// Defaults to the source app's space.
    #[serde(default)]
    pub target_space_id: Option<String>,
    #[serde(default = "default_true")]
    pub include_data: bool,
    #[serde(default)]
    pub copy_permissions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub app_id: String,
    pub target_space_id: String,
    /// Defaults to the source app's name.
    #[serde(default)]
    pub publish_name: Option<String>,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

fn default_true() -> bool {
    true
}

/// One lifecycle request, discriminated by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum LifecycleOperation {
    Export(ExportRequest),
    Import(ImportRequest),
    Copy(CopyRequest),
    Publish(PublishRequest),
}

impl LifecycleOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Export(_) => OperationKind::Export,
            Self::Import(_) => OperationKind::Import,
            Self::Copy(_) => OperationKind::Copy,
            Self::Publish(_) => OperationKind::Publish,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Validating,
    Executing,
    Verifying,
    Completed,
    RolledBack,
    Failed,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::RolledBack | Self::Failed)
    }

    fn can_transition_to(&self, next: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, next),
            (Validating, Executing)
                | (Executing, Verifying)
                | (Verifying, Completed)
                | (Validating | Executing | Verifying, Failed)
                | (Executing | Verifying, RolledBack)
        )
    }
}

/// Mutable tracker for one operation's trip through the state machine.
#[derive(Debug)]
pub struct OperationRun {
    pub id: OperationId,
    pub kind: OperationKind,
    pub started_at: DateTime<Utc>,
    state: OperationState,
    history: Vec<OperationState>,
    executing_since: Option<Instant>,
    duration_ms: u64,
    warnings: Vec<String>,
}

impl OperationRun {
    pub fn start(kind: OperationKind) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            started_at: Utc::now(),
            state: OperationState::Validating,
            history: vec![OperationState::Validating],
            executing_since: None,
            duration_ms: 0,
            warnings: Vec::new(),
        }
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn history(&self) -> &[OperationState] {
        &self.history
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Move to `next`. Illegal transitions are ignored and logged; the state
    /// machine is driven only by the orchestrator so this indicates a bug,
    /// not bad input.
    pub fn transition(&mut self, next: OperationState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                operation_id = %self.id,
                from = ?self.state,
                to = ?next,
                "Ignoring illegal operation state transition"
            );
            return;
        }

        if next == OperationState::Executing {
            self.executing_since = Some(Instant::now());
        } else if self.state == OperationState::Executing {
            self.stop_clock();
        }

        self.state = next;
        self.history.push(next);
    }

    fn stop_clock(&mut self) {
        if let Some(started) = self.executing_since.take() {
            self.duration_ms = started.elapsed().as_millis() as u64;
        }
    }

    pub fn complete(mut self, artifact_locator: String) -> OperationOutcome {
        self.transition(OperationState::Completed);
        OperationOutcome {
            operation_id: self.id,
            kind: self.kind,
            started_at: self.started_at,
            success: true,
            duration_ms: self.duration_ms,
            artifact_locator,
            verification_passed: true,
            warnings: self.warnings,
        }
    }

    pub fn fail(mut self, error: OrchestratorError) -> OperationFailure {
        self.transition(OperationState::Failed);
        self.into_failure(error)
    }

    pub fn roll_back(mut self, error: OrchestratorError) -> OperationFailure {
        self.transition(OperationState::RolledBack);
        self.into_failure(error)
    }

    fn into_failure(self, error: OrchestratorError) -> OperationFailure {
        OperationFailure {
            operation_id: self.id,
            kind: self.kind,
            started_at: self.started_at,
            error_kind: error.kind(),
            error,
            final_state: self.state,
            duration_ms: self.duration_ms,
            warnings: self.warnings,
        }
    }
}

/// Successful lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: u64,
    /// Local path for exports, remote app id otherwise.
    pub artifact_locator: String,
    pub verification_passed: bool,
    pub warnings: Vec<String>,
}

/// Failed lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} operation {operation_id} failed: {error}")]
pub struct OperationFailure {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub started_at: DateTime<Utc>,
    pub error_kind: ErrorKind,
    pub error: OrchestratorError,
    pub final_state: OperationState,
    pub duration_ms: u64,
    pub warnings: Vec<String>,
}

/// Local file produced by an export, as seen by verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}
