// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration Types
//
// Defines the configuration schema for the orchestrator, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - qlik-cli invocation settings (executable, tenant, context, timeout)
// - Workspace settings (allowed root, default directories, content toggle)
// - Lifecycle limits (free-space floor, import size cap)
// - Logging settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "qlik-orchestrator/v1";
pub const KIND: &str = "OrchestratorConfig";
pub const CONFIG_PATH_ENV: &str = "QLIK_ORCHESTRATOR_CONFIG";

/// Top-level Kubernetes-style configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// API version (must be "qlik-orchestrator/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "OrchestratorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: OrchestratorConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Manifest body (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfigSpec {
    #[serde(default)]
    pub cli: CliSettings,

    #[serde(default)]
    pub workspace: WorkspaceSettings,

    #[serde(default)]
    pub lifecycle: LifecycleSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// How to reach the qlik-cli executable and which tenant it talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliSettings {
    /// Path to the qlik-cli executable
    #[serde(default = "default_cli_path")]
    pub path: String,

    /// Tenant URL passed as `--server`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Stored context passed as `--context`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Pass `--insecure` (skip TLS verification)
    #[serde(default)]
    pub insecure: bool,

    /// Pass `--verbose`
    #[serde(default)]
    pub verbose: bool,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Every directory the orchestrator reads or writes must live below this root.
    #[serde(default = "default_allowed_root")]
    pub allowed_root: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_unbuild_directory: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_export_directory: Option<PathBuf>,

    /// Return file contents in decomposition results
    #[serde(default = "default_true")]
    pub include_file_contents: bool,

    /// Files above this size are listed but not read
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSettings {
    /// Minimum free space required before an export starts
    #[serde(default = "default_min_free_space")]
    pub min_free_space_bytes: u64,

    /// Largest file accepted for import
    #[serde(default = "default_max_import_bytes")]
    pub max_import_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_cli_path() -> String {
    "qlik".to_string()
}

fn default_command_timeout() -> u64 {
    300
}

fn default_allowed_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_min_free_space() -> u64 {
    100 * 1024 * 1024
}

fn default_max_import_bytes() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            path: default_cli_path(),
            server: None,
            context: None,
            insecure: false,
            verbose: false,
            command_timeout_seconds: default_command_timeout(),
        }
    }
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            allowed_root: default_allowed_root(),
            default_unbuild_directory: None,
            default_export_directory: None,
            include_file_contents: true,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            min_free_space_bytes: default_min_free_space(),
            max_import_bytes: default_max_import_bytes(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "qlik-orchestrator".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: OrchestratorConfigSpec::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Candidate locations, in precedence order.
    /// 1. QLIK_ORCHESTRATOR_CONFIG environment variable
    /// 2. ./qlik-orchestrator.yaml (working directory)
    /// 3. ~/.qlik-orchestrator/config.yaml (user home)
    /// 4. /etc/qlik-orchestrator/config.yaml (system, Unix)
    pub fn discovery_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from("./qlik-orchestrator.yaml"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".qlik-orchestrator").join("config.yaml"));
        }
        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/qlik-orchestrator/config.yaml"));
        #[cfg(windows)]
        paths.push(PathBuf::from("C:\\ProgramData\\QlikOrchestrator\\config.yaml"));
        paths
    }

    /// Discover configuration file using precedence order
    pub fn discover_config() -> Option<PathBuf> {
        Self::discovery_paths().into_iter().find(|p| p.exists())
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (environment in production,
    /// a map in tests).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let cli = &mut self.spec.cli;
        if let Some(val) = lookup("QLIK_CLI_PATH") {
            cli.path = val;
        }
        if let Some(val) = lookup("QLIK_TENANT_URL") {
            cli.server = Some(val);
        }
        if let Some(val) = lookup("QLIK_CONTEXT") {
            cli.context = Some(val);
        }
        if let Some(val) = lookup("QLIK_COMMAND_TIMEOUT") {
            match val.parse::<u64>() {
                Ok(seconds) => {
                    tracing::info!("Environment override: QLIK_COMMAND_TIMEOUT={}", seconds);
                    cli.command_timeout_seconds = seconds;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for QLIK_COMMAND_TIMEOUT: '{}'. Expected seconds. Ignoring.",
                    val
                ),
            }
        }

        let workspace = &mut self.spec.workspace;
        if let Some(val) = lookup("QLIK_ALLOWED_ROOT") {
            workspace.allowed_root = PathBuf::from(val);
        }
        if let Some(val) = lookup("QLIK_DEFAULT_UNBUILD_DIRECTORY") {
            workspace.default_unbuild_directory = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("QLIK_DEFAULT_EXPORT_DIRECTORY") {
            workspace.default_export_directory = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("QLIK_INCLUDE_FILE_CONTENTS") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => workspace.include_file_contents = true,
                "false" | "0" | "no" | "off" => workspace.include_file_contents = false,
                _ => tracing::warn!(
                    "Invalid value for QLIK_INCLUDE_FILE_CONTENTS: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let cli = &self.spec.cli;
        if cli.path.trim().is_empty() {
            anyhow::bail!("spec.cli.path cannot be empty");
        }
        if cli.command_timeout_seconds == 0 {
            anyhow::bail!("spec.cli.command_timeout_seconds must be greater than zero");
        }
        if let Some(server) = &cli.server {
            let parsed = url::Url::parse(server)
                .map_err(|e| anyhow::anyhow!("spec.cli.server '{}' is not a URL: {}", server, e))?;
            if parsed.scheme() != "https" {
                anyhow::bail!("spec.cli.server must use https: '{}'", server);
            }
        }

        let workspace = &self.spec.workspace;
        if !workspace.allowed_root.is_absolute() {
            anyhow::bail!(
                "spec.workspace.allowed_root must be absolute: {:?}",
                workspace.allowed_root
            );
        }
        for (field, dir) in [
            ("default_unbuild_directory", &workspace.default_unbuild_directory),
            ("default_export_directory", &workspace.default_export_directory),
        ] {
            if let Some(dir) = dir {
                if dir.is_absolute() && !dir.starts_with(&workspace.allowed_root) {
                    anyhow::bail!(
                        "spec.workspace.{} {:?} is outside allowed_root {:?}",
                        field,
                        dir,
                        workspace.allowed_root
                    );
                }
            }
        }
        if workspace.max_file_bytes == 0 {
            anyhow::bail!("spec.workspace.max_file_bytes must be greater than zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.api_version, API_VERSION);
        assert_eq!(config.kind, KIND);
        assert_eq!(config.spec.cli.path, "qlik");
        assert_eq!(config.spec.cli.command_timeout_seconds, 300);
        assert_eq!(config.spec.workspace.max_file_bytes, 10 * 1024 * 1024);
        assert!(config.spec.workspace.include_file_contents);
    }

    #[test]
    fn test_yaml_partial_spec_uses_defaults() {
        let yaml = r#"
apiVersion: qlik-orchestrator/v1
kind: OrchestratorConfig
metadata:
  name: finance-tenant
spec:
  cli:
    server: https://finance.eu.qlikcloud.com
    command_timeout_seconds: 60
  workspace:
    allowed_root: /srv/qlik
    default_unbuild_directory: /srv/qlik/unbuild
    include_file_contents: false
"#;
        let config = OrchestratorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.metadata.name, "finance-tenant");
        assert_eq!(config.spec.cli.path, "qlik");
        assert_eq!(config.spec.cli.command_timeout_seconds, 60);
        assert_eq!(config.spec.workspace.allowed_root, PathBuf::from("/srv/qlik"));
        assert!(!config.spec.workspace.include_file_contents);
        assert_eq!(config.spec.lifecycle.min_free_space_bytes, 100 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = OrchestratorConfig::default();
        config.spec.workspace.allowed_root = PathBuf::from("/srv/qlik");
        config.spec.cli.context = Some("prod".to_string());

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = OrchestratorConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec.cli, config.spec.cli);
        assert_eq!(parsed.spec.workspace, config.spec.workspace);
    }

    #[test]
    fn test_overrides() {
        let mut config = OrchestratorConfig::default();
        let env: HashMap<&str, &str> = HashMap::from([
            ("QLIK_CLI_PATH", "/opt/qlik/bin/qlik"),
            ("QLIK_COMMAND_TIMEOUT", "45"),
            ("QLIK_INCLUDE_FILE_CONTENTS", "off"),
            ("QLIK_DEFAULT_UNBUILD_DIRECTORY", "/srv/qlik/unbuild"),
        ]);
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.spec.cli.path, "/opt/qlik/bin/qlik");
        assert_eq!(config.spec.cli.command_timeout_seconds, 45);
        assert!(!config.spec.workspace.include_file_contents);
        assert_eq!(
            config.spec.workspace.default_unbuild_directory,
            Some(PathBuf::from("/srv/qlik/unbuild"))
        );
    }

    #[test]
    fn test_invalid_timeout_override_is_ignored() {
        let mut config = OrchestratorConfig::default();
        config.apply_overrides(|key| (key == "QLIK_COMMAND_TIMEOUT").then(|| "soon".to_string()));
        assert_eq!(config.spec.cli.command_timeout_seconds, 300);
    }

    #[test]
    fn test_validation() {
        let mut config = OrchestratorConfig::default();
        config.spec.workspace.allowed_root = PathBuf::from("/srv/qlik");
        assert!(config.validate().is_ok());

        config.api_version = "wrong/v1".to_string();
        assert!(config.validate().is_err());
        config.api_version = API_VERSION.to_string();

        config.spec.cli.command_timeout_seconds = 0;
        assert!(config.validate().is_err());
        config.spec.cli.command_timeout_seconds = 30;

        config.spec.cli.server = Some("http://acme.qlikcloud.com".to_string());
        assert!(config.validate().is_err());
        config.spec.cli.server = Some("https://acme.qlikcloud.com".to_string());
        assert!(config.validate().is_ok());

        config.spec.workspace.default_export_directory = Some(PathBuf::from("/tmp/exports"));
        assert!(config.validate().is_err());
        config.spec.workspace.default_export_directory = Some(PathBuf::from("/srv/qlik/exports"));
        assert!(config.validate().is_ok());

        config.spec.workspace.allowed_root = PathBuf::from("relative/root");
        config.spec.workspace.default_export_directory = None;
        assert!(config.validate().is_err());
    }
}
