// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `vsa define` - send predicate definitions
//!
//! The file holds a list of predicate definitions in YAML or JSON (JSON is
//! read through the YAML parser):
//!
//! ```yaml
//! - name: Post
//!   description: A published blog post
//!   variables:
//!     - { name: id, is_key: true, type: Text }
//!     - { name: visibility, type: Enum, enum_values: [public, private] }
//! ```

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

use vsa_core::domain::gateway_config::GatewayConfigManifest;
use vsa_core::PredicateDefinition;

use super::open_session;

#[derive(Args)]
pub struct DefineArgs {
    /// Predicate definition file (YAML or JSON list)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Refuse to send when a definition breaks authoring conventions
    #[arg(long)]
    pub strict: bool,
}

pub async fn execute(args: DefineArgs, config: &GatewayConfigManifest) -> Result<()> {
    let definitions = load_definitions(&args.file)?;
    check_definitions(&definitions, args.strict)?;

    let manager = open_session(config).await?;
    let result = manager.define_state(definitions.clone()).await;
    manager.close().await;

    let status = result.context("Failed to send defineState")?;
    if status.is_sent() {
        println!(
            "{}",
            format!("✓ Defined {} predicate(s)", definitions.len()).green()
        );
        for definition in &definitions {
            println!(
                "  {} ({} variable(s))",
                definition.name.bold(),
                definition.variables.len()
            );
        }
    } else {
        println!("{}", "Nothing was sent; the connection closed early".yellow());
    }

    Ok(())
}

pub fn load_definitions(path: &Path) -> Result<Vec<PredicateDefinition>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read predicate file {:?}", path))?;
    let definitions: Vec<PredicateDefinition> = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse predicate file {:?}", path))?;

    if definitions.is_empty() {
        bail!("Predicate file {:?} contains no definitions", path);
    }
    Ok(definitions)
}

/// Print convention violations. In strict mode any violation is an error.
fn check_definitions(definitions: &[PredicateDefinition], strict: bool) -> Result<()> {
    let mut violations = 0;
    for definition in definitions {
        if let Err(e) = definition.validate() {
            violations += 1;
            println!("{} {}: {}", "⚠".yellow(), definition.name.bold(), e);
        }
    }

    if strict && violations > 0 {
        bail!("{} definition(s) break authoring conventions", violations);
    }
    Ok(())
}
