// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tenant Catalog
//!
//! Typed views over what `qlik app ls`, `qlik app get`, `qlik space ls` and
//! `qlik context ls` print, plus the pure helpers the orchestrator builds its
//! probes on: relevance search, name matching and new-app id extraction.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Catalog records and pure catalog queries

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use crate::domain::errors::OrchestratorError;

/// An app as listed by the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<String>,
}

impl AppRecord {
    /// Read an app from `--json` output. Fields are looked up at the top
    /// level first and then under `attributes`, which is where newer CLI
    /// versions nest them. Returns `None` when no id can be found.
    pub fn from_json(value: &Value) -> Option<Self> {
        let text = |key: &str| lookup(value, key).and_then(Value::as_str).map(str::to_string);
        let nested = |outer: &str, inner: &str| {
            lookup(value, outer)
                .and_then(|o| o.get(inner))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let id = text("id")
            .or_else(|| text("resourceId"))
            .filter(|id| !id.is_empty())?;

        let tags = lookup(value, "tags")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|t| t.as_str().or_else(|| t.get("name").and_then(Value::as_str)))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id,
            name: text("name").unwrap_or_default(),
            description: text("description").unwrap_or_default(),
            space_id: text("spaceId")
                .filter(|s| !s.is_empty())
                .or_else(|| nested("space", "id")),
            space_name: nested("space", "name"),
            owner: nested("owner", "name").or_else(|| text("owner")),
            owner_id: nested("owner", "id").or_else(|| text("ownerId")),
            published: lookup(value, "published").and_then(Value::as_bool).unwrap_or(false),
            tags,
            created_date: text("createdDate"),
            modified_date: text("modifiedDate"),
        })
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }

    pub fn in_space(&self, space_id: Option<&str>) -> bool {
        match space_id {
            Some(space) => self.space_id.as_deref() == Some(space),
            None => true,
        }
    }
}

fn lookup<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value
        .get(key)
        .filter(|v| !v.is_null())
        .or_else(|| value.get("attributes")?.get(key).filter(|v| !v.is_null()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceType {
    Personal,
    Shared,
    Managed,
    Data,
    #[serde(other)]
    Unknown,
}

impl SpaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Shared => "shared",
            Self::Managed => "managed",
            Self::Data => "data",
            Self::Unknown => "unknown",
        }
    }

    fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "personal" => Self::Personal,
            "shared" => Self::Shared,
            "managed" => Self::Managed,
            "data" => Self::Data,
            _ => Self::Unknown,
        }
    }
}

impl std::str::FromStr for SpaceType {
    type Err = OrchestratorError;

    /// Only the filterable types are accepted here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from_label(s.trim()) {
            t @ (Self::Personal | Self::Shared | Self::Managed) => Ok(t),
            _ => Err(OrchestratorError::invalid_request(format!(
                "Invalid space type filter: {s}. Valid types: personal, shared, managed"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub space_type: SpaceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl SpaceRecord {
    pub fn from_json(value: &Value) -> Option<Self> {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let id = text("id").filter(|id| !id.is_empty())?;
        Some(Self {
            id,
            name: text("name").unwrap_or_default(),
            description: text("description").unwrap_or_default(),
            space_type: text("type")
                .map(|t| SpaceType::from_label(&t))
                .unwrap_or(SpaceType::Unknown),
            owner_id: text("ownerId"),
        })
    }

    pub fn is_managed(&self) -> bool {
        self.space_type == SpaceType::Managed
    }
}

/// Entry of `qlik context ls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub name: String,
    pub is_current: bool,
}

/// Parse the table printed by `qlik context ls`. The header row is skipped
/// and the active context is marked with `*` or the word "current".
pub fn parse_context_list(stdout: &str) -> Vec<ContextRecord> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("NAME"))
        .filter_map(|line| {
            let is_current = line.contains('*') || line.to_ascii_lowercase().contains("current");
            let name = line
                .split_whitespace()
                .find(|part| *part != "*")?
                .trim_start_matches('*')
                .to_string();
            (!name.is_empty()).then_some(ContextRecord { name, is_current })
        })
        .collect()
}

/// Why an app matched a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchReason {
    Name,
    Description,
    Tags,
}

impl MatchReason {
    pub fn weight(&self) -> u32 {
        match self {
            Self::Name => 10,
            Self::Description => 5,
            Self::Tags => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub app: AppRecord,
    pub relevance_score: u32,
    pub match_reasons: Vec<MatchReason>,
}

/// Optional post-match filters for [`search_apps`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub space_id: Option<String>,
    /// Case-insensitive substring of the owner name.
    #[serde(default)]
    pub owner: Option<String>,
}

/// Client-side relevance search over `apps`.
///
/// Substring matches (case-insensitive) score name 10, description 5 and
/// tags 3. Hits are sorted by score descending; ties keep listing order.
pub fn search_apps(
    apps: &[AppRecord],
    query: &str,
    filters: &SearchFilters,
    limit: usize,
) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = apps
        .iter()
        .filter(|app| app.in_space(filters.space_id.as_deref()))
        .filter(|app| match &filters.owner {
            Some(owner) => app
                .owner
                .as_deref()
                .is_some_and(|o| o.to_lowercase().contains(&owner.to_lowercase())),
            None => true,
        })
        .filter_map(|app| {
            let mut reasons = Vec::new();
            if app.name.to_lowercase().contains(&needle) {
                reasons.push(MatchReason::Name);
            }
            if app.description.to_lowercase().contains(&needle) {
                reasons.push(MatchReason::Description);
            }
            if app.tags.iter().any(|t| t.to_lowercase().contains(&needle)) {
                reasons.push(MatchReason::Tags);
            }
            (!reasons.is_empty()).then(|| SearchHit {
                app: app.clone(),
                relevance_score: reasons.iter().map(MatchReason::weight).sum(),
                match_reasons: reasons,
            })
        })
        .collect();

    hits.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    hits.truncate(limit);
    hits
}

/// Apps named exactly `name` (case-insensitive), optionally restricted to a
/// space.
pub fn find_by_name<'a>(
    apps: &'a [AppRecord],
    name: &'a str,
    space_id: Option<&'a str>,
) -> impl Iterator<Item = &'a AppRecord> + 'a {
    apps.iter()
        .filter(move |app| app.name_matches(name) && app.in_space(space_id))
}

fn id_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"App ID:\s*([a-fA-F0-9-]{8,})",
            r"Created app:\s*([a-fA-F0-9-]{8,})",
            r"Copied to:\s*([a-fA-F0-9-]{8,})",
            r"Published app ID:\s*([a-fA-F0-9-]{8,})",
            r"Published to:\s*([a-fA-F0-9-]{8,})",
            r"(?i)app\s+([a-f0-9-]{8,})\s+(?:created|published|copied)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Id of a newly created app, from command output.
///
/// Structured output wins: an `id` field of the parsed JSON (or of its first
/// record). Otherwise the textual patterns the CLI prints are tried in order.
pub fn extract_app_id(stdout: &str, parsed_json: Option<&Value>) -> Option<String> {
    let from_json = parsed_json.and_then(|value| match value {
        Value::Array(items) => items.first().and_then(|v| v.get("id")),
        other => other.get("id"),
    });
    if let Some(id) = from_json.and_then(Value::as_str).filter(|s| !s.is_empty()) {
        return Some(id.to_string());
    }

    if let Some(id) = id_patterns()
        .iter()
        .find_map(|re| re.captures(stdout).and_then(|c| c.get(1)))
    {
        return Some(id.as_str().to_string());
    }

    // JSON embedded in otherwise textual output
    static EMBEDDED: OnceLock<Option<Regex>> = OnceLock::new();
    EMBEDDED
        .get_or_init(|| Regex::new(r#""id"\s*:\s*"([a-fA-F0-9-]{8,})""#).ok())
        .as_ref()
        .and_then(|re| re.captures(stdout))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app(id: &str, name: &str, description: &str, tags: &[&str]) -> AppRecord {
        AppRecord {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_app_from_flat_json() {
        let value = json!({
            "id": "a1",
            "name": "Sales",
            "spaceId": "s1",
            "owner": {"id": "u1", "name": "Ada"},
            "tags": ["finance", {"name": "q3"}],
            "published": true
        });
        let record = AppRecord::from_json(&value).unwrap();
        assert_eq!(record.space_id.as_deref(), Some("s1"));
        assert_eq!(record.owner.as_deref(), Some("Ada"));
        assert_eq!(record.tags, vec!["finance", "q3"]);
        assert!(record.published);
    }

    #[test]
    fn test_app_from_nested_attributes() {
        let value = json!({
            "resourceId": "r9",
            "attributes": {"name": "Budget", "description": "FY plan", "spaceId": "s2"}
        });
        let record = AppRecord::from_json(&value).unwrap();
        assert_eq!(record.id, "r9");
        assert_eq!(record.name, "Budget");
        assert_eq!(record.space_id.as_deref(), Some("s2"));
    }

    #[test]
    fn test_app_without_id_is_skipped() {
        assert!(AppRecord::from_json(&json!({"name": "x"})).is_none());
    }

    #[test]
    fn test_search_scoring_and_order() {
        let apps = vec![
            app("1", "Quarterly", "sales by region", &[]),
            app("2", "Sales", "sales overview", &["sales"]),
            app("3", "HR", "", &["Sales-adjacent"]),
            app("4", "Ops", "", &[]),
        ];
        let hits = search_apps(&apps, "SALES", &SearchFilters::default(), 10);

        let ids: Vec<_> = hits.iter().map(|h| h.app.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
        assert_eq!(hits[0].relevance_score, 18);
        assert_eq!(
            hits[0].match_reasons,
            vec![MatchReason::Name, MatchReason::Description, MatchReason::Tags]
        );
        assert_eq!(hits[2].relevance_score, 3);
    }

    #[test]
    fn test_search_filters_and_limit() {
        let mut a = app("1", "Sales EU", "", &[]);
        a.space_id = Some("eu".to_string());
        let mut b = app("2", "Sales US", "", &[]);
        b.space_id = Some("us".to_string());
        let apps = vec![a, b];

        let filters = SearchFilters {
            space_id: Some("us".to_string()),
            owner: None,
        };
        let hits = search_apps(&apps, "sales", &filters, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].app.id, "2");

        assert_eq!(search_apps(&apps, "sales", &SearchFilters::default(), 1).len(), 1);
        assert!(search_apps(&apps, "  ", &SearchFilters::default(), 10).is_empty());
    }

    #[test]
    fn test_find_by_name_is_case_insensitive_and_scoped() {
        let mut a = app("1", "Sales", "", &[]);
        a.space_id = Some("s1".to_string());
        let apps = vec![a];

        assert_eq!(find_by_name(&apps, "sales", None).count(), 1);
        assert_eq!(find_by_name(&apps, " SALES ", Some("s1")).count(), 1);
        assert_eq!(find_by_name(&apps, "sales", Some("s2")).count(), 0);
        assert_eq!(find_by_name(&apps, "sales 2", None).count(), 0);
    }

    #[test]
    fn test_space_record() {
        let space = SpaceRecord::from_json(&json!({"id": "s1", "name": "Prod", "type": "managed"})).unwrap();
        assert!(space.is_managed());
        let space = SpaceRecord::from_json(&json!({"id": "s2", "name": "Team", "type": "shared"})).unwrap();
        assert!(!space.is_managed());
        assert_eq!("Managed".parse::<SpaceType>().unwrap(), SpaceType::Managed);
        assert!("data".parse::<SpaceType>().is_err());
    }

    #[test]
    fn test_parse_context_list() {
        let stdout = "NAME      SERVER\nstaging   https://a.eu.qlikcloud.com\n*prod     https://b.eu.qlikcloud.com\n";
        let contexts = parse_context_list(stdout);
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0], ContextRecord { name: "staging".into(), is_current: false });
        assert_eq!(contexts[1], ContextRecord { name: "prod".into(), is_current: true });
    }

    #[test]
    fn test_extract_app_id() {
        let id = "3f2b8c1e-0d7a-4c55-9e1a-1b2c3d4e5f60";

        assert_eq!(
            extract_app_id("", Some(&json!({"id": id}))).as_deref(),
            Some(id)
        );
        assert_eq!(
            extract_app_id(&format!("Import complete.\nApp ID: {id}\n"), None).as_deref(),
            Some(id)
        );
        assert_eq!(
            extract_app_id(&format!("Copied to: {id}"), None).as_deref(),
            Some(id)
        );
        assert_eq!(
            extract_app_id(&format!("app {id} published"), None).as_deref(),
            Some(id)
        );
        assert_eq!(
            extract_app_id(&format!("log line\n{{\"id\": \"{id}\"}} trailing"), None).as_deref(),
            Some(id)
        );
        assert_eq!(extract_app_id("nothing here", None), None);
    }
}
