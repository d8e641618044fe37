// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the gateway CLI

pub mod config;
pub mod define;
pub mod trigger;
pub mod update;
pub mod watch;

pub use self::config::ConfigCommand;
pub use self::define::DefineArgs;
pub use self::trigger::TriggerArgs;
pub use self::update::UpdateArgs;
pub use self::watch::WatchArgs;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use vsa_core::domain::gateway_config::GatewayConfigManifest;
use vsa_core::{StateManager, StateUpdate};

/// Flags overriding the verifier endpoint and application identity.
#[derive(Args, Debug, Default, Clone)]
pub struct SessionArgs {
    /// Verifier host (default: from config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Verifier port (default: from config)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Application identifier sent as `appName`
    #[arg(long, global = true)]
    pub app_id: Option<String>,
}

impl SessionArgs {
    /// Flags win over the config file and its environment overrides.
    pub fn apply(&self, config: &mut GatewayConfigManifest) {
        if let Some(host) = &self.host {
            config.spec.verifier.host = host.clone();
        }
        if let Some(port) = self.port {
            config.spec.verifier.port = port;
        }
        if let Some(app_id) = &self.app_id {
            config.spec.app.id = app_id.clone();
        }
    }
}

/// Connect a fresh manager to the configured verifier.
pub async fn open_session(config: &GatewayConfigManifest) -> Result<Arc<StateManager>> {
    let verifier = &config.spec.verifier;
    let manager = Arc::new(StateManager::from_config(config));

    manager
        .connect(&verifier.host, verifier.port)
        .await
        .with_context(|| format!("Failed to connect to verifier at {}", verifier.address()))?;

    println!(
        "{} {} as {}",
        "Connected to".green(),
        verifier.address().bold(),
        config.spec.app.id.bold()
    );
    Ok(manager)
}

/// Parse `name=value`. The value is read as JSON when it parses (numbers,
/// booleans, quoted strings) and as plain text otherwise.
pub fn parse_field(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid field '{}': expected name=value", raw))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Invalid field '{}': name is empty", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

/// Build one update from `--state` and repeated `--field` flags.
pub fn build_update(state: &str, fields: &[String]) -> Result<StateUpdate> {
    fields
        .iter()
        .try_fold(StateUpdate::new(state), |update, raw| {
            let (name, value) = parse_field(raw)?;
            Ok(update.with_field(name, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_field_types() {
        assert_eq!(parse_field("id=1").unwrap(), ("id".to_string(), json!(1)));
        assert_eq!(parse_field("draft=false").unwrap().1, json!(false));
        assert_eq!(parse_field("title=Hello world").unwrap().1, json!("Hello world"));
        assert_eq!(parse_field("id=\"1\"").unwrap().1, json!("1"));
        assert_eq!(parse_field("url=a=b").unwrap().1, json!("a=b"));
        assert_eq!(parse_field("empty=").unwrap().1, json!(""));
    }

    #[test]
    fn test_parse_field_rejects_missing_separator() {
        assert!(parse_field("id").is_err());
        assert!(parse_field("=1").is_err());
    }

    #[test]
    fn test_build_update() {
        let update = build_update("Post", &["id=\"1\"".to_string(), "likes=3".to_string()]).unwrap();
        assert_eq!(update.state_name, "Post");
        assert_eq!(update.field("id"), Some(&json!("1")));
        assert_eq!(update.field("likes"), Some(&json!(3)));
    }

    #[test]
    fn test_session_args_override_config() {
        let mut config = GatewayConfigManifest::default();
        let args = SessionArgs {
            host: Some("verifier.local".to_string()),
            port: None,
            app_id: Some("com.example.notes".to_string()),
        };
        args.apply(&mut config);

        assert_eq!(config.spec.verifier.host, "verifier.local");
        assert_eq!(config.spec.verifier.port, 7070);
        assert_eq!(config.spec.app.id, "com.example.notes");
    }
}
