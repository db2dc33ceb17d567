// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decomposed App Artifacts
//!
//! Value objects describing the file tree produced by `qlik app unbuild`
//! after it has been read back from disk.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Data model for decomposition results

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Semantic role of a file inside an unbuilt app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Script,
    Dimension,
    Measure,
    Object,
    Variable,
    Bookmark,
    AppProperties,
    Connection,
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Script,
        Category::Dimension,
        Category::Measure,
        Category::Object,
        Category::Variable,
        Category::Bookmark,
        Category::AppProperties,
        Category::Connection,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Dimension => "dimension",
            Self::Measure => "measure",
            Self::Object => "object",
            Self::Variable => "variable",
            Self::Bookmark => "bookmark",
            Self::AppProperties => "app_properties",
            Self::Connection => "connection",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `DecomposedFile::content` represents the bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentEncoding {
    #[serde(rename = "utf8")]
    Utf8,
    #[serde(rename = "latin1")]
    Latin1,
    #[serde(rename = "cp1252")]
    Cp1252,
    /// Standard base64 of the raw bytes.
    #[serde(rename = "binary-base64")]
    BinaryBase64,
}

impl ContentEncoding {
    pub fn is_text(&self) -> bool {
        !matches!(self, Self::BinaryBase64)
    }
}

/// One file discovered under a decomposition root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecomposedFile {
    /// Path relative to the decomposition root, `/`-separated.
    pub relative_path: String,
    pub category: Category,
    pub size_bytes: u64,
    pub encoding: ContentEncoding,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
}

impl DecomposedFile {
    /// A file that could not be read. Content stays empty.
    pub fn unreadable(
        relative_path: String,
        category: Category,
        size_bytes: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            relative_path,
            category,
            size_bytes,
            encoding: ContentEncoding::Utf8,
            content: String::new(),
            read_error: Some(reason.into()),
        }
    }

    pub fn is_readable(&self) -> bool {
        self.read_error.is_none()
    }
}

/// Everything read back from one decomposition root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompositionResult {
    pub root_directory: PathBuf,
    pub used_default_directory: bool,
    pub files: Vec<DecomposedFile>,
    pub category_counts: BTreeMap<Category, usize>,
    pub no_data_mode: bool,
}

impl DecompositionResult {
    /// Build a result from raw file records.
    ///
    /// Files are ordered by relative path, duplicate paths keep the first
    /// record, and `category_counts` is derived from the surviving files.
    pub fn from_files(root_directory: PathBuf, mut files: Vec<DecomposedFile>) -> Self {
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        let mut seen = BTreeSet::new();
        files.retain(|f| seen.insert(f.relative_path.clone()));

        let category_counts = tally(&files);
        Self {
            root_directory,
            used_default_directory: false,
            files,
            category_counts,
            no_data_mode: false,
        }
    }

    pub fn with_default_directory(mut self, used_default: bool) -> Self {
        self.used_default_directory = used_default;
        self
    }

    pub fn with_no_data_mode(mut self, no_data: bool) -> Self {
        self.no_data_mode = no_data;
        self
    }

    pub fn count(&self, category: Category) -> usize {
        self.category_counts.get(&category).copied().unwrap_or(0)
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    pub fn unreadable_files(&self) -> impl Iterator<Item = &DecomposedFile> {
        self.files.iter().filter(|f| !f.is_readable())
    }

    pub fn files_in(&self, category: Category) -> impl Iterator<Item = &DecomposedFile> {
        self.files.iter().filter(move |f| f.category == category)
    }
}

fn tally(files: &[DecomposedFile]) -> BTreeMap<Category, usize> {
    let mut counts = BTreeMap::new();
    for file in files {
        *counts.entry(file.category).or_insert(0) += 1;
    }
    counts
}
