// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Category Classifier
//!
//! Maps a path relative to an unbuild root onto its [`Category`]. The
//! mapping is an ordered rule table evaluated first-match-wins: directory
//! rules come before file-name rules, which come before extension rules.
//! Classification never touches the filesystem.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure path → category mapping

use crate::domain::artifact::Category;

/// Lower-cased view of a relative path split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathShape {
    pub directories: Vec<String>,
    pub file_name: String,
    pub stem: String,
    pub extension: Option<String>,
}

impl PathShape {
    pub fn parse(relative_path: &str) -> Self {
        let mut segments: Vec<String> = relative_path
            .split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != ".")
            .map(|s| s.to_ascii_lowercase())
            .collect();

        let file_name = segments.pop().unwrap_or_default();
        let (stem, extension) = match file_name.rfind('.') {
            Some(idx) if idx > 0 => (
                file_name[..idx].to_string(),
                Some(file_name[idx + 1..].to_string()),
            ),
            _ => (file_name.clone(), None),
        };

        Self {
            directories: segments,
            file_name,
            stem,
            extension,
        }
    }

    fn in_directory(&self, names: &[&str]) -> bool {
        self.directories.iter().any(|d| names.contains(&d.as_str()))
    }

    fn named(&self, names: &[&str]) -> bool {
        names.contains(&self.file_name.as_str())
    }

    fn stem_is(&self, names: &[&str]) -> bool {
        names.contains(&self.stem.as_str())
    }

    fn extension_is(&self, extensions: &[&str]) -> bool {
        self.extension
            .as_deref()
            .is_some_and(|ext| extensions.contains(&ext))
    }
}

/// One entry of the classification table.
pub struct ClassificationRule {
    pub name: &'static str,
    pub category: Category,
    pub matches: fn(&PathShape) -> bool,
}

/// Ordered classification table. First match wins.
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "dimensions-directory",
        category: Category::Dimension,
        matches: |p| p.in_directory(&["dimensions"]),
    },
    ClassificationRule {
        name: "measures-directory",
        category: Category::Measure,
        matches: |p| p.in_directory(&["measures"]),
    },
    ClassificationRule {
        name: "objects-directory",
        category: Category::Object,
        matches: |p| p.in_directory(&["objects"]),
    },
    ClassificationRule {
        name: "variables-directory",
        category: Category::Variable,
        matches: |p| p.in_directory(&["variables"]),
    },
    ClassificationRule {
        name: "bookmarks-directory",
        category: Category::Bookmark,
        matches: |p| p.in_directory(&["bookmarks"]),
    },
    ClassificationRule {
        name: "connections-directory",
        category: Category::Connection,
        matches: |p| p.in_directory(&["connections"]),
    },
    ClassificationRule {
        name: "script-directory",
        category: Category::Script,
        matches: |p| p.in_directory(&["script", "scripts"]),
    },
    ClassificationRule {
        name: "app-properties-file",
        category: Category::AppProperties,
        matches: |p| {
            p.named(&[
                "app-properties.json",
                "app_properties.json",
                "appproperties.json",
                "properties.json",
            ])
        },
    },
    ClassificationRule {
        name: "connections-file",
        category: Category::Connection,
        matches: |p| p.stem_is(&["connections"]) && p.extension_is(&["yml", "yaml", "json"]),
    },
    ClassificationRule {
        name: "dimensions-file",
        category: Category::Dimension,
        matches: |p| p.stem_is(&["dimensions"]) && p.extension_is(&["json"]),
    },
    ClassificationRule {
        name: "measures-file",
        category: Category::Measure,
        matches: |p| p.stem_is(&["measures"]) && p.extension_is(&["json"]),
    },
    ClassificationRule {
        name: "variables-file",
        category: Category::Variable,
        matches: |p| p.stem_is(&["variables"]) && p.extension_is(&["json"]),
    },
    ClassificationRule {
        name: "bookmarks-file",
        category: Category::Bookmark,
        matches: |p| p.stem_is(&["bookmarks"]) && p.extension_is(&["json"]),
    },
    ClassificationRule {
        name: "script-extension",
        category: Category::Script,
        matches: |p| p.extension_is(&["qvs"]) || p.stem_is(&["script"]),
    },
];

/// Classify a relative path. Total: unmatched paths are [`Category::Other`].
pub fn classify(relative_path: &str) -> Category {
    let shape = PathShape::parse(relative_path);
    matching_rule(&shape)
        .map(|rule| rule.category)
        .unwrap_or(Category::Other)
}

/// The first rule matching `shape`, if any.
pub fn matching_rule(shape: &PathShape) -> Option<&'static ClassificationRule> {
    RULES.iter().find(|rule| (rule.matches)(shape))
}
