// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared harness: a scripted qlik-cli stand-in and a fixed disk probe.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

use qlik_orchestrator_core::application::{
    DecompositionService, DirectoryResolver, LifecycleOrchestrator, QlikGateway,
};
use qlik_orchestrator_core::domain::config::{CliSettings, LifecycleSettings, WorkspaceSettings};
use qlik_orchestrator_core::domain::errors::{OrchestratorError, OrchestratorResult};
use qlik_orchestrator_core::domain::invocation::{InvocationRequest, ToolInvocation, ToolInvoker};
use qlik_orchestrator_core::domain::resources::DiskSpaceProbe;

type Handler = Box<dyn Fn(&[String]) -> OrchestratorResult<ToolInvocation> + Send + Sync>;

/// Records every argv and answers with a caller-supplied handler.
pub struct ScriptedInvoker {
    calls: Mutex<Vec<Vec<String>>>,
    handler: Handler,
}

impl ScriptedInvoker {
    pub fn new(handler: impl Fn(&[String]) -> OrchestratorResult<ToolInvocation> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// `app ls`, `app export`, ... for each recorded call.
    pub fn verbs(&self) -> Vec<String> {
        self.calls().iter().map(|argv| verb(argv)).collect()
    }
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    async fn invoke(&self, request: InvocationRequest) -> OrchestratorResult<ToolInvocation> {
        self.calls.lock().unwrap().push(request.argv.clone());
        (self.handler)(&request.argv)
    }
}

pub struct FixedDisk(pub u64);

impl DiskSpaceProbe for FixedDisk {
    fn available_bytes(&self, _path: &Path) -> std::io::Result<u64> {
        Ok(self.0)
    }
}

/// A probe that can never answer.
pub struct UnknownDisk;

impl DiskSpaceProbe for UnknownDisk {
    fn available_bytes(&self, _path: &Path) -> std::io::Result<u64> {
        Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "no statvfs"))
    }
}

pub fn verb(argv: &[String]) -> String {
    argv.iter().skip(1).take(2).cloned().collect::<Vec<_>>().join(" ")
}

/// Value following `flag` in the argv.
pub fn flag_value<'a>(argv: &'a [String], flag: &str) -> Option<&'a str> {
    argv.iter()
        .position(|a| a == flag)
        .and_then(|i| argv.get(i + 1))
        .map(String::as_str)
}

pub fn has_flag(argv: &[String], flag: &str) -> bool {
    argv.iter().any(|a| a == flag)
}

pub fn ok(stdout: &str) -> OrchestratorResult<ToolInvocation> {
    Ok(invocation(stdout, None))
}

pub fn ok_json(value: Value) -> OrchestratorResult<ToolInvocation> {
    Ok(invocation(&value.to_string(), Some(value)))
}

pub fn reported(stderr: &str) -> OrchestratorResult<ToolInvocation> {
    Err(OrchestratorError::ToolReportedError {
        exit_code: 1,
        stderr: stderr.to_string(),
        command: "qlik".to_string(),
    })
}

fn invocation(stdout: &str, parsed_json: Option<Value>) -> ToolInvocation {
    ToolInvocation {
        argv: Vec::new(),
        timeout_seconds: 300,
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
        parsed_json,
        duration_ms: 1,
    }
}

pub fn workspace(root: &Path) -> WorkspaceSettings {
    WorkspaceSettings {
        allowed_root: root.to_path_buf(),
        ..Default::default()
    }
}

pub fn orchestrator(invoker: Arc<ScriptedInvoker>, root: &Path, free_bytes: u64) -> LifecycleOrchestrator {
    orchestrator_with_disk(invoker, root, Arc::new(FixedDisk(free_bytes)))
}

pub fn orchestrator_with_disk(
    invoker: Arc<ScriptedInvoker>,
    root: &Path,
    disk: Arc<dyn DiskSpaceProbe>,
) -> LifecycleOrchestrator {
    LifecycleOrchestrator::new(
        QlikGateway::new(invoker, CliSettings::default()),
        Arc::new(DirectoryResolver::new(root)),
        disk,
        workspace(root),
        LifecycleSettings::default(),
    )
}

pub fn decomposition(invoker: Arc<ScriptedInvoker>, workspace: WorkspaceSettings) -> DecompositionService {
    DecompositionService::new(
        QlikGateway::new(invoker, CliSettings::default()),
        Arc::new(DirectoryResolver::new(workspace.allowed_root.clone())),
        workspace,
    )
}
