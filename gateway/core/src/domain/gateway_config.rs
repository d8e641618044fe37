// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration schema for a verification gateway host:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Application identity sent verbatim as `appName`
// - Verifier endpoint and connect timeout
// - Logging settings for the host binary

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "vsa.dev/v1";
pub const KIND: &str = "GatewayConfig";

/// Top-level gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    /// API version (must be "vsa.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: GatewayConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigSpec {
    pub app: AppIdentity,

    #[serde(default)]
    pub verifier: VerifierEndpoint,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppIdentity {
    /// Opaque application identifier (e.g. a package name)
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierEndpoint {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on establishing the TCP connection
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl VerifierEndpoint {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("compact" or "json")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7070
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for VerifierEndpoint {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "vsa-gateway".to_string(),
                version: None,
            },
            spec: GatewayConfigSpec {
                app: AppIdentity {
                    id: "com.example.app".to_string(),
                },
                verifier: VerifierEndpoint::default(),
                observability: ObservabilityConfig::default(),
            },
        }
    }
}

impl GatewayConfigManifest {
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

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. VSA_CONFIG_PATH environment variable
    /// 2. ./vsa-config.yaml (working directory)
    /// 3. ~/.vsa/config.yaml (user home)
    /// 4. /etc/vsa/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("VSA_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./vsa-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".vsa").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/vsa/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("VSA_VERIFIER_HOST") {
            tracing::info!("Environment override: VSA_VERIFIER_HOST={}", host);
            self.spec.verifier.host = host;
        }

        if let Ok(val) = std::env::var("VSA_VERIFIER_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: VSA_VERIFIER_PORT={}", port);
                    self.spec.verifier.port = port;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for VSA_VERIFIER_PORT: '{}'. Expected a port number. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(app_id) = std::env::var("VSA_APP_ID") {
            tracing::info!("Environment override: VSA_APP_ID={}", app_id);
            self.spec.app.id = app_id;
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

        if self.spec.app.id.trim().is_empty() {
            anyhow::bail!("spec.app.id cannot be empty");
        }

        if self.spec.verifier.host.trim().is_empty() {
            anyhow::bail!("spec.verifier.host cannot be empty");
        }

        if self.spec.verifier.port == 0 {
            anyhow::bail!("spec.verifier.port must be non-zero");
        }

        match self.spec.observability.logging.format.as_str() {
            "compact" | "json" => {}
            other => anyhow::bail!(
                "Invalid logging format: '{}'. Must be 'compact' or 'json'",
                other
            ),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = GatewayConfigManifest::default();
        assert_eq!(manifest.api_version, "vsa.dev/v1");
        assert_eq!(manifest.kind, "GatewayConfig");
        assert_eq!(manifest.spec.verifier.port, 7070);
        assert_eq!(manifest.spec.verifier.connect_timeout(), Duration::from_secs(5));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: vsa.dev/v1
kind: GatewayConfig
metadata:
  name: blog-app
spec:
  app:
    id: com.example.blog
"#;
        let manifest = GatewayConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.app.id, "com.example.blog");
        assert_eq!(manifest.spec.verifier.address(), "127.0.0.1:7070");
        assert_eq!(manifest.spec.observability.logging.level, "info");
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vsa-config.yaml");

        let mut manifest = GatewayConfigManifest::default();
        manifest.spec.verifier.host = "verifier.local".to_string();
        manifest.spec.verifier.port = 9100;
        manifest.to_yaml_file(&path).unwrap();

        let parsed = GatewayConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(parsed.spec.verifier.host, "verifier.local");
        assert_eq!(parsed.spec.verifier.port, 9100);
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(GatewayConfigManifest::load_or_default(Some(missing)).is_err());
    }

    #[test]
    fn test_validation() {
        let mut manifest = GatewayConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.app.id = "  ".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.app.id = "com.example.app".to_string();

        manifest.spec.verifier.port = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.verifier.port = 7070;

        manifest.spec.observability.logging.format = "xml".to_string();
        assert!(manifest.validate().is_err());
    }
}
