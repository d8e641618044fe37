// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Verification Gateway CLI
//!
//! The `vsa` binary hosts one gateway session against a verification
//! server. It is useful for authoring predicates and for exercising a
//! verifier by hand.
//!
//! ## Commands
//!
//! - `vsa config show|validate|generate` - Configuration management
//! - `vsa define <FILE>` - Send predicate definitions
//! - `vsa update --state NAME --field k=v` - Report one state update
//! - `vsa watch` - Stream gateway events until Ctrl+C
//! - `vsa trigger` - Fire a gated demo action

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use vsa_cli::commands::{
    self, ConfigCommand, DefineArgs, SessionArgs, TriggerArgs, UpdateArgs, WatchArgs,
};
use vsa_core::domain::gateway_config::GatewayConfigManifest;

/// Verification gateway host
#[derive(Parser)]
#[command(name = "vsa")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "VSA_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(flatten)]
    session: SessionArgs,

    /// Log level (trace, debug, info, warn, error). Defaults to the config value.
    #[arg(long, global = true, env = "VSA_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Send predicate definitions to the verifier
    #[command(name = "define")]
    Define(DefineArgs),

    /// Report one state update
    #[command(name = "update")]
    Update(UpdateArgs),

    /// Stream gateway events until interrupted
    #[command(name = "watch")]
    Watch(WatchArgs),

    /// Fire a gated demo action
    #[command(name = "trigger")]
    Trigger(TriggerArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("{} {}", "Ignoring unreadable .env file:".yellow(), e);
        }
    }

    let cli = Cli::parse();

    // `config` subcommands report load failures themselves
    let config = match &cli.command {
        Some(Commands::Config { .. }) => None,
        _ => Some(
            GatewayConfigManifest::load_or_default(cli.config.clone())
                .context("Failed to load configuration")?,
        ),
    };

    let default_logging = GatewayConfigManifest::default().spec.observability.logging;
    let logging = config
        .as_ref()
        .map(|c| &c.spec.observability.logging)
        .unwrap_or(&default_logging);
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    init_logging(level, &logging.format)?;
    debug!(level = %level, format = %logging.format, "Logging initialized");

    let command = match cli.command {
        Some(command) => command,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    };

    if let Commands::Config { command } = command {
        return commands::config::handle_command(command, cli.config, &cli.session).await;
    }

    let mut config = config.unwrap_or_default();
    cli.session.apply(&mut config);
    config.validate().context("Configuration validation failed")?;

    match command {
        Commands::Define(args) => commands::define::execute(args, &config).await,
        Commands::Update(args) => commands::update::execute(args, &config).await,
        Commands::Watch(args) => commands::watch::execute(args, &config).await,
        Commands::Trigger(args) => commands::trigger::execute(args, &config).await,
        Commands::Config { .. } => Ok(()),
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}
