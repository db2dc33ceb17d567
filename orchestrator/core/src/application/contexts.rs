// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Context Service
//!
//! Manages qlik-cli contexts (named tenant URL + API key pairs) and the
//! tool health checks. API keys are only ever passed to the invoker, which
//! masks them in every log line and error.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Context management and connectivity checks

use serde::Serialize;

use crate::application::gateway::QlikGateway;
use crate::domain::catalog::{parse_context_list, ContextRecord};
use crate::domain::errors::{OrchestratorError, OrchestratorResult};

const MIN_API_KEY_LEN: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct ContextList {
    pub contexts: Vec<ContextRecord>,
    pub current: Option<String>,
}

impl ContextList {
    pub fn contains(&self, name: &str) -> bool {
        self.contexts.iter().any(|c| c.name == name)
    }

    fn names(&self) -> String {
        self.contexts
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub struct ContextService {
    gateway: QlikGateway,
}

impl ContextService {
    pub fn new(gateway: QlikGateway) -> Self {
        Self { gateway }
    }

    /// Create a context after checking the key authenticates against the
    /// tenant.
    pub async fn create(&self, name: &str, tenant_url: &str, api_key: &str) -> OrchestratorResult<()> {
        if name.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("Context name cannot be empty"));
        }
        validate_tenant_url(tenant_url)?;
        if api_key.trim().len() < MIN_API_KEY_LEN {
            return Err(OrchestratorError::invalid_request(
                "API key appears to be invalid (too short)",
            ));
        }

        if !self.validate_api_key(tenant_url, api_key).await? {
            return Err(OrchestratorError::invalid_request(
                "API key validation failed: unable to authenticate with the provided credentials",
            ));
        }

        let command = self
            .gateway
            .bare(["context", "create"])
            .flag("--name", name)
            .flag("--server", tenant_url)
            .flag("--api-key", api_key);
        self.gateway.run(command).await?;

        tracing::info!(context = %name, server = %tenant_url, "Created qlik-cli context");
        Ok(())
    }

    pub async fn list(&self) -> OrchestratorResult<ContextList> {
        let invocation = self.gateway.run(self.gateway.bare(["context", "ls"])).await?;
        let contexts = parse_context_list(&invocation.stdout);
        let current = contexts
            .iter()
            .find(|c| c.is_current)
            .map(|c| c.name.clone());
        Ok(ContextList { contexts, current })
    }

    pub async fn current(&self) -> OrchestratorResult<Option<ContextRecord>> {
        let list = self.list().await?;
        Ok(list.contexts.into_iter().find(|c| c.is_current))
    }

    pub async fn use_context(&self, name: &str) -> OrchestratorResult<()> {
        self.require_context(name).await?;
        self.gateway
            .run(self.gateway.bare(["context", "use"]).arg(name))
            .await?;
        tracing::info!(context = %name, "Switched qlik-cli context");
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> OrchestratorResult<()> {
        let list = self.require_context(name).await?;
        if list.current.as_deref() == Some(name) {
            return Err(OrchestratorError::invalid_request(format!(
                "Cannot remove currently active context '{name}'. Switch to another context first."
            )));
        }
        self.gateway
            .run(self.gateway.bare(["context", "rm"]).arg(name))
            .await?;
        tracing::info!(context = %name, "Removed qlik-cli context");
        Ok(())
    }

    /// `qlik version` output.
    pub async fn version(&self) -> OrchestratorResult<String> {
        let invocation = self.gateway.run(self.gateway.bare(["version"])).await?;
        Ok(invocation.stdout.trim().to_string())
    }

    /// Whether the configured tenant accepts the current credentials.
    /// Infrastructure failures (missing CLI, timeout) are still errors.
    pub async fn validate_connection(&self) -> OrchestratorResult<bool> {
        authenticated(self.gateway.run(self.gateway.command(["user", "me"])).await)
    }

    async fn validate_api_key(&self, tenant_url: &str, api_key: &str) -> OrchestratorResult<bool> {
        let command = self
            .gateway
            .bare(std::iter::empty::<String>())
            .flag("--server", tenant_url)
            .flag("--api-key", api_key)
            .arg("user")
            .arg("me");
        authenticated(self.gateway.run(command).await)
    }

    async fn require_context(&self, name: &str) -> OrchestratorResult<ContextList> {
        if name.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("Context name cannot be empty"));
        }
        let list = self.list().await?;
        if !list.contains(name) {
            return Err(OrchestratorError::invalid_request(format!(
                "Context '{}' not found. Available contexts: {}",
                name,
                list.names()
            )));
        }
        Ok(list)
    }
}

fn authenticated<T>(result: OrchestratorResult<T>) -> OrchestratorResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(OrchestratorError::ToolReportedError { stderr, .. }) => {
            tracing::warn!(stderr = %stderr, "Authentication check failed");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Tenant URLs must be https and on a Qlik Cloud domain.
pub fn validate_tenant_url(tenant_url: &str) -> OrchestratorResult<()> {
    let invalid = || OrchestratorError::invalid_request(format!("Invalid tenant URL format: {tenant_url}"));
    let parsed = url::Url::parse(tenant_url).map_err(|_| invalid())?;
    if parsed.scheme() != "https" {
        return Err(invalid());
    }
    let host = parsed.host_str().ok_or_else(invalid)?;
    if !host.ends_with(".qlikcloud.com") {
        return Err(invalid());
    }
    Ok(())
}
