// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `vsa trigger` - fire a gated demo action
//!
//! Each firing goes through an interceptor: the action prints a confirmation
//! when the gate allows it, otherwise the configured state is reported and
//! the action is withheld. Firings come from `--fires N` or, by default, one
//! per line read from stdin.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use vsa_core::domain::gateway_config::GatewayConfigManifest;
use vsa_core::{Firing, Interceptor, SendStatus, StateManager};

use super::define::load_definitions;
use super::watch::shutdown_signal;
use super::{build_update, open_session};

#[derive(Args)]
pub struct TriggerArgs {
    /// Predicate reported when the action is suppressed (`stateName`)
    #[arg(long, value_name = "NAME")]
    pub state: String,

    /// Field as name=value; repeatable
    #[arg(short, long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,

    /// Fire this many times instead of once per stdin line
    #[arg(long, value_name = "N")]
    pub fires: Option<usize>,

    /// Pause between counted firings
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub interval_ms: u64,

    /// Send these predicate definitions before the first firing
    #[arg(long, value_name = "FILE")]
    pub define: Option<PathBuf>,
}

/// Counters for one trigger session.
#[derive(Debug, Default)]
pub struct TriggerTally {
    pub performed: AtomicUsize,
    pub suppressed: AtomicUsize,
    pub report_failures: AtomicUsize,
}

pub async fn execute(args: TriggerArgs, config: &GatewayConfigManifest) -> Result<()> {
    let update = build_update(&args.state, &args.fields)?;
    let definitions = args.define.as_deref().map(load_definitions).transpose()?;

    let manager = open_session(config).await?;
    if let Some(definitions) = definitions {
        manager
            .define_state(definitions)
            .await
            .context("Failed to send defineState")?;
    }

    let interceptor = manager.interceptor(update);
    let tally = TriggerTally::default();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    match args.fires {
        Some(count) => {
            println!("{}", format!("Firing {} time(s)", count).dimmed());
            for round in 0..count {
                if round > 0 {
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(Duration::from_millis(args.interval_ms)) => {}
                    }
                }
                fire_once(&interceptor, &tally).await;
            }
        }
        None => {
            println!("{}", "Press Enter to fire (Ctrl+D or Ctrl+C to stop)".dimmed());
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    line = lines.next_line() => match line.context("Failed to read stdin")? {
                        Some(_) => fire_once(&interceptor, &tally).await,
                        None => break,
                    }
                }
            }
        }
    }

    manager.close().await;

    println!(
        "{} performed, {} suppressed, {} report failure(s)",
        tally.performed.load(Ordering::Relaxed),
        tally.suppressed.load(Ordering::Relaxed),
        tally.report_failures.load(Ordering::Relaxed)
    );
    Ok(())
}

/// One firing of the demo action.
pub async fn fire_once(interceptor: &Interceptor<StateManager>, tally: &TriggerTally) {
    let firing = interceptor
        .fire(|| {
            let n = tally.performed.fetch_add(1, Ordering::Relaxed) + 1;
            println!("{}", format!("✓ Action performed (#{})", n).green());
        })
        .await;

    match firing {
        Firing::Allowed(()) => {}
        Firing::Suppressed(Ok(status)) => {
            tally.suppressed.fetch_add(1, Ordering::Relaxed);
            println!("{}", suppressed_message(status).yellow());
        }
        Firing::Suppressed(Err(e)) => {
            tally.report_failures.fetch_add(1, Ordering::Relaxed);
            println!("{} {}", "✗ Suppressed; report failed:".red(), e);
        }
    }
}

fn suppressed_message(status: SendStatus) -> &'static str {
    match status {
        SendStatus::Sent => "⏸ Suppressed; state reported for verification",
        SendStatus::Skipped => "⏸ Suppressed; state not written to the verifier",
    }
}
