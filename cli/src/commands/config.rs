// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use vsa_core::domain::gateway_config::GatewayConfigManifest;

use super::SessionArgs;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./vsa-config.yaml)
        #[arg(short, long, default_value = "./vsa-config.yaml")]
        output: PathBuf,

        /// Include comments describing every field
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
    session: &SessionArgs,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, session, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override), session).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

/// The configuration session commands would run with: file, then
/// environment, then command line flags.
fn load_effective(
    config_path: Option<PathBuf>,
    session: &SessionArgs,
) -> Result<GatewayConfigManifest> {
    let mut config = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    session.apply(&mut config);
    Ok(config)
}

async fn show(
    config_override: Option<PathBuf>,
    session: &SessionArgs,
    show_paths: bool,
) -> Result<()> {
    let config = load_effective(config_override.clone(), session)?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. VSA_CONFIG_PATH: {}",
            std::env::var("VSA_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./vsa-config.yaml");
        println!("  4. ~/.vsa/config.yaml");
        println!("  5. /etc/vsa/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Application:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  ID (appName): {}", config.spec.app.id);
    println!();

    let verifier = &config.spec.verifier;
    println!("{}", "Verifier:".bold());
    println!("  Address: {}", verifier.address());
    println!("  Connect timeout: {:?}", verifier.connect_timeout());
    println!();

    let logging = &config.spec.observability.logging;
    println!("{}", "Logging:".bold());
    println!("  Level: {}", logging.level);
    println!("  Format: {}", logging.format);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>, session: &SessionArgs) -> Result<()> {
    println!("Validating configuration...");

    let config = load_effective(config_path, session)?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = sample_config(with_examples);

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn sample_config(with_examples: bool) -> &'static str {
    if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_valid_manifests() {
        for with_examples in [false, true] {
            let manifest = GatewayConfigManifest::from_yaml_str(sample_config(with_examples))
                .unwrap();
            manifest.validate().unwrap();
        }
    }

    #[tokio::test]
    async fn test_generate_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("vsa-config.yaml");

        generate(output.clone(), false).await.unwrap();

        let manifest = GatewayConfigManifest::from_yaml_file(&output).unwrap();
        assert_eq!(manifest.kind, "GatewayConfig");
    }

    #[tokio::test]
    async fn test_flags_apply_to_shown_and_validated_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vsa-config.yaml");
        std::fs::write(&path, sample_config(false)).unwrap();

        let session = SessionArgs {
            host: Some("verifier.local".to_string()),
            port: Some(9100),
            app_id: Some("com.example.notes".to_string()),
        };
        let config = load_effective(Some(path.clone()), &session).unwrap();
        assert_eq!(config.spec.verifier.address(), "verifier.local:9100");
        assert_eq!(config.spec.app.id, "com.example.notes");

        let bad_port = SessionArgs {
            port: Some(0),
            ..SessionArgs::default()
        };
        assert!(validate(Some(path), &bad_port).await.is_err());
    }
}
