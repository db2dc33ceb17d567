// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process service wiring
//!
//! Loads configuration and builds every application service over a single
//! `qlik` subprocess invoker.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use qlik_orchestrator_core::{
    application::{
        CatalogService, ContextService, DecompositionService, DirectoryResolver, LifecycleOrchestrator,
        QlikGateway,
    },
    domain::config::OrchestratorConfig,
    infrastructure::{Fs2DiskSpaceProbe, ProcessToolInvoker},
};

pub struct Services {
    pub config: OrchestratorConfig,
    pub catalog: CatalogService,
    pub contexts: ContextService,
    pub decomposition: DecompositionService,
    pub lifecycle: LifecycleOrchestrator,
}

impl Services {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = OrchestratorConfig::load_or_default(config_path)
            .context("Failed to load configuration")?;
        config
            .validate()
            .context("Configuration validation failed")?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: OrchestratorConfig) -> Self {
        let spec = &config.spec;
        let gateway = QlikGateway::new(Arc::new(ProcessToolInvoker::new()), spec.cli.clone());
        let resolver = Arc::new(DirectoryResolver::new(spec.workspace.allowed_root.clone()));

        tracing::debug!(
            executable = %spec.cli.path,
            allowed_root = %spec.workspace.allowed_root.display(),
            "Services initialized"
        );

        Self {
            catalog: CatalogService::new(gateway.clone()),
            contexts: ContextService::new(gateway.clone()),
            decomposition: DecompositionService::new(
                gateway.clone(),
                resolver.clone(),
                spec.workspace.clone(),
            ),
            lifecycle: LifecycleOrchestrator::new(
                gateway,
                resolver,
                Arc::new(Fs2DiskSpaceProbe),
                spec.workspace.clone(),
                spec.lifecycle.clone(),
            ),
            config,
        }
    }
}
