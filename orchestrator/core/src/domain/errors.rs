// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Orchestrator Errors
//!
//! Typed failure vocabulary shared by the resolver, the tool invoker and the
//! lifecycle orchestrator. Every variant maps onto a stable [`ErrorKind`] so
//! callers can branch on the category without parsing messages.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Error taxonomy for decomposition and lifecycle operations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Stable, serializable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPath,
    PathTraversal,
    MissingDirectory,
    DirectoryNotWritable,
    ToolTimeout,
    ToolNotFound,
    ToolIo,
    ToolReportedError,
    ConflictError,
    VerificationFailed,
    UnreadableFile,
    InsufficientSpace,
    InvalidRequest,
    ArtifactNotFound,
}

impl ErrorKind {
    /// Infrastructure failures are fatal to the current operation and are
    /// never retried or verified past.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::ToolTimeout | Self::ToolNotFound | Self::ToolIo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPath => "invalid_path",
            Self::PathTraversal => "path_traversal",
            Self::MissingDirectory => "missing_directory",
            Self::DirectoryNotWritable => "directory_not_writable",
            Self::ToolTimeout => "tool_timeout",
            Self::ToolNotFound => "tool_not_found",
            Self::ToolIo => "tool_io",
            Self::ToolReportedError => "tool_reported_error",
            Self::ConflictError => "conflict_error",
            Self::VerificationFailed => "verification_failed",
            Self::UnreadableFile => "unreadable_file",
            Self::InsufficientSpace => "insufficient_space",
            Self::InvalidRequest => "invalid_request",
            Self::ArtifactNotFound => "artifact_not_found",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the orchestration core.
///
/// Messages never contain raw credentials: command lines and stderr are
/// masked before they are stored in a variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path '{path}' escapes the allowed root '{root}'")]
    PathTraversal { path: String, root: PathBuf },

    #[error("No directory was supplied and no default directory is configured")]
    MissingDirectory,

    #[error("Directory '{path}' is not writable: {reason}")]
    DirectoryNotWritable { path: PathBuf, reason: String },

    #[error("qlik-cli command timed out after {seconds} seconds: {command}")]
    ToolTimeout { seconds: u64, command: String },

    #[error("qlik-cli executable not found: {executable}")]
    ToolNotFound { executable: String },

    #[error("Failed to run qlik-cli command '{command}': {reason}")]
    ToolIo { command: String, reason: String },

    #[error("qlik-cli command failed with exit code {exit_code}: {stderr}")]
    ToolReportedError {
        exit_code: i32,
        stderr: String,
        command: String,
    },

    #[error("'{name}' already exists in {location}")]
    ConflictError { name: String, location: String },

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Unreadable file '{path}': {reason}")]
    UnreadableFile { path: String, reason: String },

    #[error("Insufficient disk space at '{path}': {available} bytes available, {required} bytes required")]
    InsufficientSpace {
        path: PathBuf,
        available: u64,
        required: u64,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("App '{0}' not found or not accessible")]
    ArtifactNotFound(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::PathTraversal { .. } => ErrorKind::PathTraversal,
            Self::MissingDirectory => ErrorKind::MissingDirectory,
            Self::DirectoryNotWritable { .. } => ErrorKind::DirectoryNotWritable,
            Self::ToolTimeout { .. } => ErrorKind::ToolTimeout,
            Self::ToolNotFound { .. } => ErrorKind::ToolNotFound,
            Self::ToolIo { .. } => ErrorKind::ToolIo,
            Self::ToolReportedError { .. } => ErrorKind::ToolReportedError,
            Self::ConflictError { .. } => ErrorKind::ConflictError,
            Self::VerificationFailed(_) => ErrorKind::VerificationFailed,
            Self::UnreadableFile { .. } => ErrorKind::UnreadableFile,
            Self::InsufficientSpace { .. } => ErrorKind::InsufficientSpace,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::ArtifactNotFound(_) => ErrorKind::ArtifactNotFound,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// The colliding name, for conflict errors.
    pub fn conflicting_name(&self) -> Option<&str> {
        match self {
            Self::ConflictError { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Reinterpret a tool-reported failure whose stderr says the target
    /// already exists. The tool is authoritative for races the core's own
    /// probes cannot see.
    pub fn relay_conflict(self, name: &str, location: &str) -> Self {
        match self {
            Self::ToolReportedError { ref stderr, .. }
                if stderr.to_ascii_lowercase().contains("already exists") =>
            {
                Self::ConflictError {
                    name: name.to_string(),
                    location: location.to_string(),
                }
            }
            other => other,
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = OrchestratorError::ConflictError {
            name: "Sales".to_string(),
            location: "space 'finance'".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ConflictError);
        assert_eq!(err.conflicting_name(), Some("Sales"));
        assert!(err.to_string().contains("Sales"));
    }

    #[test]
    fn test_infrastructure_kinds() {
        assert!(ErrorKind::ToolTimeout.is_infrastructure());
        assert!(ErrorKind::ToolNotFound.is_infrastructure());
        assert!(!ErrorKind::ToolReportedError.is_infrastructure());
        assert!(!ErrorKind::ConflictError.is_infrastructure());
    }

    #[test]
    fn test_relay_conflict_from_stderr() {
        let err = OrchestratorError::ToolReportedError {
            exit_code: 1,
            stderr: "Error: app Sales Already Exists".to_string(),
            command: "qlik app import".to_string(),
        };
        let relayed = err.relay_conflict("Sales", "personal space");
        assert_eq!(relayed.kind(), ErrorKind::ConflictError);

        let other = OrchestratorError::ToolReportedError {
            exit_code: 2,
            stderr: "unauthorized".to_string(),
            command: "qlik app import".to_string(),
        };
        assert_eq!(
            other.relay_conflict("Sales", "personal space").kind(),
            ErrorKind::ToolReportedError
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::VerificationFailed).unwrap();
        assert_eq!(json, "\"verification_failed\"");
    }
}
