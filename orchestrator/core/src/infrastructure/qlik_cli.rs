// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! qlik-cli Process Invoker
//!
//! [`ToolInvoker`] backed by a child process per call.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Spawn, time out and capture `qlik` runs

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};

use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::invocation::{
    masked_argv, parse_json_output, redact, InvocationRequest, ToolInvocation, ToolInvoker,
};

#[derive(Debug, Clone, Default)]
pub struct ProcessToolInvoker;

impl ProcessToolInvoker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolInvoker for ProcessToolInvoker {
    async fn invoke(&self, request: InvocationRequest) -> OrchestratorResult<ToolInvocation> {
        let command_line = request.display_command();
        let Some((program, args)) = request.argv.split_first() else {
            return Err(OrchestratorError::invalid_request("empty command line"));
        };

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start_time = Instant::now();
        let timeout = Duration::from_secs(request.timeout_seconds);

        // Dropping the output future on expiry kills the child.
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::error!(executable = %program, "qlik-cli executable not found");
                return Err(OrchestratorError::ToolNotFound {
                    executable: program.clone(),
                });
            }
            Ok(Err(e)) => {
                return Err(OrchestratorError::ToolIo {
                    command: command_line,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                tracing::error!(
                    command = %command_line,
                    timeout_seconds = request.timeout_seconds,
                    "qlik-cli command timed out"
                );
                return Err(OrchestratorError::ToolTimeout {
                    seconds: request.timeout_seconds,
                    command: command_line,
                });
            }
        };

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let secrets = request.secrets();
        let stdout = redact(&String::from_utf8_lossy(&output.stdout), &secrets);
        let stderr = redact(&String::from_utf8_lossy(&output.stderr), &secrets);
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            tracing::warn!(
                command = %command_line,
                exit_code,
                stderr = %stderr.trim(),
                "qlik-cli command failed"
            );
            let stderr = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(OrchestratorError::ToolReportedError {
                exit_code,
                stderr,
                command: command_line,
            });
        }

        let parsed_json = if request.expect_json {
            let parsed = parse_json_output(&stdout);
            if parsed.is_none() && !stdout.trim().is_empty() {
                tracing::warn!(command = %command_line, "Expected JSON output but could not parse it");
            }
            parsed
        } else {
            None
        };

        Ok(ToolInvocation {
            argv: masked_argv(&request.argv),
            timeout_seconds: request.timeout_seconds,
            exit_code,
            stdout,
            stderr,
            parsed_json,
            duration_ms,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;

    fn sh(script: &str, timeout_seconds: u64, expect_json: bool) -> InvocationRequest {
        InvocationRequest {
            argv: vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()],
            timeout_seconds,
            expect_json,
        }
    }

    #[tokio::test]
    async fn test_captures_and_parses_json() {
        let invocation = ProcessToolInvoker::new()
            .invoke(sh(r#"echo '[{"id":"a1","name":"Sales"}]'; echo warn >&2"#, 5, true))
            .await
            .unwrap();

        assert_eq!(invocation.exit_code, 0);
        assert_eq!(invocation.stderr.trim(), "warn");
        assert_eq!(invocation.json_records().len(), 1);
    }

    #[tokio::test]
    async fn test_unparsable_json_is_not_fatal() {
        let invocation = ProcessToolInvoker::new()
            .invoke(sh("echo plain text", 5, true))
            .await
            .unwrap();
        assert!(invocation.parsed_json.is_none());
        assert_eq!(invocation.stdout.trim(), "plain text");
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let err = ProcessToolInvoker::new()
            .invoke(sh("echo 'app already exists' >&2; exit 3", 5, false))
            .await
            .unwrap_err();

        match err {
            OrchestratorError::ToolReportedError { exit_code, stderr, .. } => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "app already exists");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let started = Instant::now();
        let err = ProcessToolInvoker::new()
            .invoke(sh("sleep 30", 1, false))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ToolTimeout);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let request = InvocationRequest {
            argv: vec!["/nonexistent/qlik-cli-binary".to_string(), "version".to_string()],
            timeout_seconds: 5,
            expect_json: false,
        };
        let err = ProcessToolInvoker::new().invoke(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolNotFound);
    }

    #[tokio::test]
    async fn test_secrets_masked_in_stderr_and_argv() {
        let secret = "eyJhbGciOiJFUzM4NCJ9.payload";
        let request = InvocationRequest {
            argv: vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "echo \"bad key $1\" >&2; exit 1".to_string(),
                "--api-key".to_string(),
                secret.to_string(),
            ],
            timeout_seconds: 5,
            expect_json: false,
        };

        let err = ProcessToolInvoker::new().invoke(request).await.unwrap_err();
        let message = err.to_string();
        assert!(!message.contains(secret), "{message}");
        if let OrchestratorError::ToolReportedError { command, .. } = err {
            assert!(command.contains("eyJh...load"));
        }
    }
}
