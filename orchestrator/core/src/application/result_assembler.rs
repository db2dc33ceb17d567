// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Result Assembler
//!
//! Turns decomposition results and lifecycle outcomes into the single
//! payload returned to callers: a summary line, category counts, warnings,
//! recommendations and next steps, plus the raw data. Assembly is a fixed
//! set of rules over its input and cannot fail.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Caller-facing result shaping

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::domain::artifact::{Category, ContentEncoding, DecompositionResult};
use crate::domain::errors::ErrorKind;
use crate::domain::lifecycle::{OperationFailure, OperationKind, OperationOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResult {
    pub success: bool,
    pub summary: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub category_counts: BTreeMap<Category, usize>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub data: Value,
}

/// What produced a decomposition result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompositionContext {
    pub app_id: Option<String>,
    /// Extra warnings gathered before the tree was read.
    pub warnings: Vec<String>,
}

pub fn assemble_decomposition(
    result: &DecompositionResult,
    context: &DecompositionContext,
) -> StructuredResult {
    let source = context
        .app_id
        .as_deref()
        .map(|id| format!("app '{id}'"))
        .unwrap_or_else(|| "directory".to_string());

    let summary = format!(
        "Read {} files ({} bytes) from {} at {}",
        result.files.len(),
        result.total_bytes(),
        source,
        result.root_directory.display()
    );

    let mut warnings = context.warnings.clone();
    warnings.extend(
        result
            .unreadable_files()
            .map(|f| format!("{}: {}", f.relative_path, f.read_error.as_deref().unwrap_or("unreadable"))),
    );
    if result.files.is_empty() {
        warnings.push("No files found under the decomposition root".to_string());
    }

    let mut recommendations = Vec::new();
    if !result.files.is_empty() && result.count(Category::Script) == 0 {
        recommendations.push("No load script was found; confirm the unbuild completed".to_string());
    }
    if result.no_data_mode {
        recommendations.push("Data was excluded; a rebuilt app needs a reload before use".to_string());
    }
    if result.unreadable_files().next().is_some() {
        recommendations.push(
            "Some files were not read; raise max_file_bytes or open them directly".to_string(),
        );
    }
    if result
        .files
        .iter()
        .any(|f| f.is_readable() && f.encoding == ContentEncoding::BinaryBase64)
    {
        recommendations.push("Binary files are base64-encoded; decode before editing".to_string());
    }
    if result.used_default_directory {
        recommendations.push("Pass an explicit directory to keep decompositions apart".to_string());
    }

    let mut next_steps = Vec::new();
    if result.count(Category::Script) > 0 {
        next_steps.push("Review the load script".to_string());
    }
    if result.count(Category::Dimension) + result.count(Category::Measure) > 0 {
        next_steps.push("Review master dimensions and measures".to_string());
    }
    if !result.files.is_empty() {
        next_steps.push(format!(
            "Rebuild with `app build` from {}",
            result.root_directory.display()
        ));
    }

    StructuredResult {
        success: true,
        summary,
        category_counts: result.category_counts.clone(),
        warnings,
        recommendations,
        next_steps,
        data: serde_json::to_value(result).unwrap_or(Value::Null),
    }
}

pub fn assemble_outcome(outcome: &OperationOutcome) -> StructuredResult {
    let locator = &outcome.artifact_locator;
    let (summary, next_steps) = match outcome.kind {
        OperationKind::Export => (
            format!("Exported app to {locator}"),
            vec![
                "Store the export with your backups".to_string(),
                format!("Import it elsewhere with `app import --file {locator}`"),
            ],
        ),
        OperationKind::Import => (
            format!("Imported app as {locator}"),
            vec![
                "Reload the app to refresh its data".to_string(),
                "Publish it to a managed space when ready".to_string(),
            ],
        ),
        OperationKind::Copy => (
            format!("Copied app to {locator}"),
            vec!["Review the copy before sharing it".to_string()],
        ),
        OperationKind::Publish => (
            format!("Published app as {locator}"),
            vec!["Check access rules on the managed space".to_string()],
        ),
    };

    let mut recommendations = Vec::new();
    if !outcome.warnings.is_empty() {
        recommendations.push("Review the warnings before relying on the result".to_string());
    }

    StructuredResult {
        success: true,
        summary,
        category_counts: BTreeMap::new(),
        warnings: outcome.warnings.clone(),
        recommendations,
        next_steps,
        data: serde_json::to_value(outcome).unwrap_or(Value::Null),
    }
}

pub fn assemble_failure(failure: &OperationFailure) -> StructuredResult {
    let summary = format!("{} failed: {}", capitalize(&failure.kind.to_string()), failure.error);

    let recommendations = match failure.error_kind {
        ErrorKind::ConflictError => vec![
            "Choose a different name or retry with replace".to_string(),
        ],
        ErrorKind::InsufficientSpace => vec!["Free disk space or export elsewhere".to_string()],
        ErrorKind::ToolNotFound => vec!["Install qlik-cli or set spec.cli.path".to_string()],
        ErrorKind::ToolTimeout => vec!["Raise spec.cli.command_timeout_seconds".to_string()],
        ErrorKind::ArtifactNotFound => vec!["Check the app id with `app ls`".to_string()],
        ErrorKind::PathTraversal | ErrorKind::InvalidPath => {
            vec!["Use a path inside the configured allowed root".to_string()]
        }
        ErrorKind::VerificationFailed => {
            vec!["Check the tenant for a partially completed operation".to_string()]
        }
        ErrorKind::ToolReportedError => {
            vec!["Check qlik-cli authentication with `context ls`".to_string()]
        }
        _ => Vec::new(),
    };

    StructuredResult {
        success: false,
        summary,
        category_counts: BTreeMap::new(),
        warnings: failure.warnings.clone(),
        recommendations,
        next_steps: Vec::new(),
        data: json!({
            "operation_id": failure.operation_id,
            "kind": failure.kind,
            "started_at": failure.started_at,
            "error_kind": failure.error_kind,
            "error": failure.error.to_string(),
            "conflicting_name": failure.error.conflicting_name(),
            "final_state": failure.final_state,
            "duration_ms": failure.duration_ms,
        }),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::DecomposedFile;
    use crate::domain::errors::OrchestratorError;
    use crate::domain::lifecycle::{OperationRun, OperationState};
    use std::path::PathBuf;

    fn file(path: &str, category: Category, encoding: ContentEncoding) -> DecomposedFile {
        DecomposedFile {
            relative_path: path.to_string(),
            category,
            size_bytes: 10,
            encoding,
            content: String::new(),
            read_error: None,
        }
    }

    fn context() -> DecompositionContext {
        DecompositionContext {
            app_id: Some("a1".to_string()),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_decomposition_summary_and_counts() {
        let result = DecompositionResult::from_files(
            PathBuf::from("/srv/apps/a1"),
            vec![
                file("script.qvs", Category::Script, ContentEncoding::Utf8),
                file("dimensions/d1.json", Category::Dimension, ContentEncoding::Utf8),
                file("objects/o1.bin", Category::Object, ContentEncoding::BinaryBase64),
            ],
        );
        let assembled = assemble_decomposition(&result, &context());

        assert!(assembled.success);
        assert_eq!(assembled.summary, "Read 3 files (30 bytes) from app 'a1' at /srv/apps/a1");
        assert_eq!(assembled.category_counts, result.category_counts);
        assert!(assembled.warnings.is_empty());
        assert_eq!(
            assembled.recommendations,
            vec!["Binary files are base64-encoded; decode before editing"]
        );
        assert_eq!(assembled.next_steps.len(), 3);
    }

    #[test]
    fn test_read_errors_surface_as_warnings() {
        let mut result = DecompositionResult::from_files(
            PathBuf::from("/srv/apps/a1"),
            vec![DecomposedFile::unreadable(
                "objects/big.json".to_string(),
                Category::Object,
                99,
                "file too large",
            )],
        );
        result.no_data_mode = true;
        let assembled = assemble_decomposition(&result, &context());

        assert_eq!(assembled.warnings, vec!["objects/big.json: file too large"]);
        assert!(assembled.recommendations.iter().any(|r| r.contains("reload")));
        assert!(assembled.recommendations.iter().any(|r| r.contains("load script")));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let result = DecompositionResult::from_files(PathBuf::from("/srv/x"), Vec::new());
        assert_eq!(
            assemble_decomposition(&result, &context()),
            assemble_decomposition(&result, &context())
        );
    }

    #[test]
    fn test_outcome_and_failure() {
        let mut run = OperationRun::start(OperationKind::Import);
        run.transition(OperationState::Executing);
        run.transition(OperationState::Verifying);
        let outcome = run.complete("a2".to_string());
        let assembled = assemble_outcome(&outcome);
        assert!(assembled.success);
        assert_eq!(assembled.summary, "Imported app as a2");

        let failure = OperationRun::start(OperationKind::Import).fail(OrchestratorError::ConflictError {
            name: "Sales".to_string(),
            location: "personal space".to_string(),
        });
        let assembled = assemble_failure(&failure);
        assert!(!assembled.success);
        assert!(assembled.summary.starts_with("Import failed"));
        assert_eq!(assembled.data["conflicting_name"], "Sales");
        assert_eq!(assembled.data["error_kind"], "conflict_error");
    }
}
