// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Qlik Gateway
//!
//! Typed wrapper around a [`ToolInvoker`] for the read-only catalog calls
//! every service probes with (`app ls`, `app get`, `space ls`), plus the
//! generic `run` used for mutating verbs.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Command construction and catalog probes over qlik-cli

use std::sync::Arc;

use crate::domain::catalog::{AppRecord, SpaceRecord, SpaceType};
use crate::domain::config::CliSettings;
use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::invocation::{CliCommand, ToolInvocation, ToolInvoker};

/// Page size used when listing apps to probe for name conflicts.
pub const PROBE_LIMIT: u32 = 1000;

/// Filters for `qlik app ls`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppListQuery {
    pub space_id: Option<String>,
    pub collection_id: Option<String>,
    pub owner: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AppListQuery {
    pub fn in_space(space_id: Option<&str>) -> Self {
        Self {
            space_id: space_id.map(str::to_string),
            limit: Some(PROBE_LIMIT),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct QlikGateway {
    invoker: Arc<dyn ToolInvoker>,
    cli: CliSettings,
}

impl QlikGateway {
    pub fn new(invoker: Arc<dyn ToolInvoker>, cli: CliSettings) -> Self {
        Self { invoker, cli }
    }

    pub fn settings(&self) -> &CliSettings {
        &self.cli
    }

    /// Command carrying the configured global flags.
    pub fn command<I, S>(&self, verb: I) -> CliCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CliCommand::new(&self.cli, verb)
    }

    /// Command without tenant flags, for local verbs (`version`, `context`).
    pub fn bare<I, S>(&self, verb: I) -> CliCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CliCommand::bare(&self.cli, verb)
    }

    pub async fn run(&self, command: CliCommand) -> OrchestratorResult<ToolInvocation> {
        let request = command.into_request();
        let command_line = request.display_command();
        tracing::debug!(command = %command_line, "Invoking qlik-cli");

        let invocation = self.invoker.invoke(request).await?;
        tracing::debug!(
            command = %command_line,
            exit_code = invocation.exit_code,
            duration_ms = invocation.duration_ms,
            stdout = %invocation.stdout,
            "qlik-cli finished"
        );
        Ok(invocation)
    }

    pub async fn list_apps(&self, query: &AppListQuery) -> OrchestratorResult<Vec<AppRecord>> {
        let command = self
            .command(["app", "ls"])
            .flag_opt("--space", query.space_id.clone())
            .flag_opt("--collection", query.collection_id.clone())
            .flag_opt("--owner", query.owner.clone())
            .flag_opt("--limit", query.limit.map(|l| l.to_string()))
            .flag_opt("--offset", query.offset.filter(|o| *o > 0).map(|o| o.to_string()))
            .json();

        let invocation = self.run(command).await?;
        if invocation.parsed_json.is_none() && !invocation.stdout.trim().is_empty() {
            tracing::warn!("qlik app ls produced output that is not JSON");
        }
        Ok(invocation
            .json_records()
            .iter()
            .filter_map(AppRecord::from_json)
            .collect())
    }

    /// Fetch one app. A tool-reported failure means the app does not exist
    /// or is not visible to the current credentials.
    pub async fn get_app(&self, app_id: &str) -> OrchestratorResult<AppRecord> {
        if app_id.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("App identifier cannot be empty"));
        }

        let command = self.command(["app", "get"]).arg(app_id).json();
        let invocation = match self.run(command).await {
            Ok(invocation) => invocation,
            Err(OrchestratorError::ToolReportedError { .. }) => {
                return Err(OrchestratorError::ArtifactNotFound(app_id.to_string()))
            }
            Err(e) => return Err(e),
        };

        invocation
            .json_records()
            .first()
            .and_then(AppRecord::from_json)
            .ok_or_else(|| OrchestratorError::ArtifactNotFound(app_id.to_string()))
    }

    pub async fn list_spaces(&self, space_type: Option<SpaceType>) -> OrchestratorResult<Vec<SpaceRecord>> {
        let command = self
            .command(["space", "ls"])
            .flag_opt("--type", space_type.map(|t| t.as_str()))
            .json();

        let invocation = self.run(command).await?;
        Ok(invocation
            .json_records()
            .iter()
            .filter_map(SpaceRecord::from_json)
            .collect())
    }

    pub async fn find_space(&self, space_id: &str) -> OrchestratorResult<Option<SpaceRecord>> {
        Ok(self
            .list_spaces(None)
            .await?
            .into_iter()
            .find(|space| space.id == space_id))
    }
}
