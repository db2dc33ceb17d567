// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! External Tool Invocation
//!
//! The narrow seam between orchestration logic and the `qlik` executable.
//! The orchestrator builds a [`CliCommand`], hands the resulting
//! [`InvocationRequest`] to a [`ToolInvoker`] and receives a
//! [`ToolInvocation`] record. Process management lives entirely behind the
//! trait, so a different backend can replace the subprocess without touching
//! the lifecycle pipelines.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Invocation contract, command construction, credential masking

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::config::CliSettings;
use crate::domain::errors::OrchestratorResult;

/// Flags whose following argument carries a credential.
const SECRET_FLAGS: &[&str] = &["--api-key", "--apikey", "--token", "--password", "--secret"];

/// Fully constructed request for one tool run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// `argv[0]` is the executable.
    pub argv: Vec<String>,
    pub timeout_seconds: u64,
    /// Parse stdout as JSON on success.
    pub expect_json: bool,
}

impl InvocationRequest {
    pub fn executable(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Command line safe for logs and error messages.
    pub fn display_command(&self) -> String {
        masked_argv(&self.argv).join(" ")
    }

    /// Raw credential values present in the argv.
    pub fn secrets(&self) -> Vec<&str> {
        secret_values(&self.argv)
    }
}

/// Record of a completed tool run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Masked argv.
    pub argv: Vec<String>,
    pub timeout_seconds: u64,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_json: Option<Value>,
    pub duration_ms: u64,
}

impl ToolInvocation {
    /// JSON output flattened to a list of records. A single object becomes a
    /// one-element list; anything else yields an empty list.
    pub fn json_records(&self) -> Vec<Value> {
        match &self.parsed_json {
            Some(Value::Array(items)) => items.clone(),
            Some(value @ Value::Object(_)) => vec![value.clone()],
            _ => Vec::new(),
        }
    }
}

/// Backend that runs `qlik` commands.
///
/// Implementations must:
/// - return `Ok` only for exit code 0,
/// - map a non-zero exit to `ToolReportedError` carrying masked stderr,
/// - map an expired timeout to `ToolTimeout` after killing the process,
/// - map a missing executable to `ToolNotFound`.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, request: InvocationRequest) -> OrchestratorResult<ToolInvocation>;
}

/// Builder for `qlik` command lines.
///
/// Global flags from [`CliSettings`] go first, then the verb path, then the
/// verb-specific flags, then `--json` when structured output is requested.
#[derive(Debug, Clone)]
pub struct CliCommand {
    globals: Vec<String>,
    verb: Vec<String>,
    args: Vec<String>,
    json: bool,
    timeout_seconds: u64,
}

impl CliCommand {
    pub fn new<I, S>(settings: &CliSettings, verb: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut globals = vec![settings.path.clone()];
        if let Some(server) = &settings.server {
            globals.push("--server".to_string());
            globals.push(server.clone());
        }
        if let Some(context) = &settings.context {
            globals.push("--context".to_string());
            globals.push(context.clone());
        }
        if settings.insecure {
            globals.push("--insecure".to_string());
        }
        if settings.verbose {
            globals.push("--verbose".to_string());
        }

        Self {
            globals,
            verb: verb.into_iter().map(Into::into).collect(),
            args: Vec::new(),
            json: false,
            timeout_seconds: settings.command_timeout_seconds,
        }
    }

    /// Bare command with no global flags (`qlik version`, context verbs).
    pub fn bare<I, S>(settings: &CliSettings, verb: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            globals: vec![settings.path.clone()],
            verb: verb.into_iter().map(Into::into).collect(),
            args: Vec::new(),
            json: false,
            timeout_seconds: settings.command_timeout_seconds,
        }
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn flag(mut self, name: &str, value: impl Into<String>) -> Self {
        self.args.push(name.to_string());
        self.args.push(value.into());
        self
    }

    pub fn flag_opt(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.flag(name, v),
            None => self,
        }
    }

    pub fn switch(mut self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.args.push(name.to_string());
        }
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn into_request(self) -> InvocationRequest {
        let mut argv = self.globals;
        argv.extend(self.verb);
        argv.extend(self.args);
        if self.json {
            argv.push("--json".to_string());
        }
        InvocationRequest {
            argv,
            timeout_seconds: self.timeout_seconds,
            expect_json: self.json,
        }
    }
}

/// Mask a credential, keeping the first and last four characters when the
/// value is long enough for that to be meaningless to an attacker.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

fn is_secret_flag(arg: &str) -> bool {
    SECRET_FLAGS.contains(&arg)
}

fn split_inline_secret(arg: &str) -> Option<(&str, &str)> {
    let (flag, value) = arg.split_once('=')?;
    is_secret_flag(flag).then_some((flag, value))
}

/// Copy of `argv` with credential values masked.
pub fn masked_argv(argv: &[String]) -> Vec<String> {
    let mut masked = Vec::with_capacity(argv.len());
    let mut mask_next = false;
    for arg in argv {
        if mask_next {
            masked.push(mask_secret(arg));
            mask_next = false;
        } else if let Some((flag, value)) = split_inline_secret(arg) {
            masked.push(format!("{flag}={}", mask_secret(value)));
        } else {
            mask_next = is_secret_flag(arg);
            masked.push(arg.clone());
        }
    }
    masked
}

/// Credential values present in `argv`.
pub fn secret_values(argv: &[String]) -> Vec<&str> {
    let mut secrets = Vec::new();
    let mut iter = argv.iter().peekable();
    while let Some(arg) = iter.next() {
        if is_secret_flag(arg) {
            if let Some(value) = iter.next() {
                secrets.push(value.as_str());
            }
        } else if let Some((_, value)) = split_inline_secret(arg) {
            secrets.push(value);
        }
    }
    secrets.retain(|s| !s.is_empty());
    secrets
}

/// Replace every occurrence of each secret in `text` with its masked form.
pub fn redact(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .fold(text.to_string(), |acc, secret| acc.replace(secret, &mask_secret(secret)))
}

/// Parse `qlik --json` output.
///
/// Accepts a single JSON document, or one document per line (collected into
/// an array, skipping lines that do not parse). Empty output and output with
/// no parsable line yield `None`.
pub fn parse_json_output(stdout: &str) -> Option<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let records: Vec<Value> = trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    if records.is_empty() {
        None
    } else {
        Some(Value::Array(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CliSettings {
        CliSettings {
            path: "qlik".to_string(),
            server: Some("https://acme.eu.qlikcloud.com".to_string()),
            context: Some("acme".to_string()),
            insecure: true,
            verbose: false,
            command_timeout_seconds: 120,
        }
    }

    #[test]
    fn test_command_layout() {
        let request = CliCommand::new(&settings(), ["app", "get"])
            .arg("abc-123")
            .flag_opt("--space", None::<String>)
            .switch("--no-data", true)
            .json()
            .into_request();

        assert_eq!(
            request.argv,
            vec![
                "qlik", "--server", "https://acme.eu.qlikcloud.com", "--context", "acme",
                "--insecure", "app", "get", "abc-123", "--no-data", "--json"
            ]
        );
        assert!(request.expect_json);
        assert_eq!(request.timeout_seconds, 120);
        assert_eq!(request.executable(), "qlik");
    }

    #[test]
    fn test_bare_command_skips_globals() {
        let request = CliCommand::bare(&settings(), ["version"]).into_request();
        assert_eq!(request.argv, vec!["qlik", "version"]);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), "****");
        assert_eq!(mask_secret("eyJhbGciOiJFUzM4NCJ9.payload"), "eyJh...load");
    }

    #[test]
    fn test_masked_argv() {
        let argv: Vec<String> = [
            "qlik", "context", "create", "--api-key", "eyJhbGciOiJFUzM4NCJ9.payload",
            "--token=abcdefghijklmnopqrstuvwxyz", "--name", "prod",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let masked = masked_argv(&argv);
        assert_eq!(masked[4], "eyJh...load");
        assert_eq!(masked[5], "--token=abcd...wxyz");
        assert_eq!(masked[7], "prod");
        let joined = masked.join(" ");
        assert!(!joined.contains("eyJhbGciOiJFUzM4NCJ9.payload"));
        assert!(!joined.contains("ghij"));

        let secrets = secret_values(&argv);
        assert_eq!(secrets, vec!["eyJhbGciOiJFUzM4NCJ9.payload", "abcdefghijklmnopqrstuvwxyz"]);
    }

    #[test]
    fn test_redact_text() {
        let text = "401: key eyJhbGciOiJFUzM4NCJ9.payload rejected";
        let redacted = redact(text, &["eyJhbGciOiJFUzM4NCJ9.payload"]);
        assert_eq!(redacted, "401: key eyJh...load rejected");
    }

    #[test]
    fn test_parse_json_output() {
        assert_eq!(parse_json_output(""), None);
        assert_eq!(parse_json_output("not json"), None);

        let single = parse_json_output(r#"{"id": "a"}"#).unwrap();
        assert_eq!(single["id"], "a");

        let lines = parse_json_output("{\"id\": \"a\"}\nnoise\n{\"id\": \"b\"}\n").unwrap();
        assert_eq!(lines.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_json_records() {
        let invocation = ToolInvocation {
            argv: vec![],
            timeout_seconds: 1,
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            parsed_json: Some(serde_json::json!({"id": "x"})),
            duration_ms: 0,
        };
        assert_eq!(invocation.json_records().len(), 1);
    }
}
