// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `vsa update` - report one state update

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use vsa_core::domain::gateway_config::GatewayConfigManifest;

use super::{build_update, open_session};

#[derive(Args)]
pub struct UpdateArgs {
    /// Predicate the update refers to (`stateName`)
    #[arg(long, value_name = "NAME")]
    pub state: String,

    /// Field as name=value; repeatable
    #[arg(short, long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,
}

pub async fn execute(args: UpdateArgs, config: &GatewayConfigManifest) -> Result<()> {
    let update = build_update(&args.state, &args.fields)?;
    let rendered = serde_json::to_string(&update)?;

    let manager = open_session(config).await?;
    let result = manager.update_state(vec![update]).await;
    manager.close().await;

    if result.context("Failed to send updateState")?.is_sent() {
        println!("{} {}", "✓ Reported".green(), rendered);
    } else {
        println!("{}", "Nothing was sent; the connection closed early".yellow());
    }

    Ok(())
}
