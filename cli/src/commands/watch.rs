// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `vsa watch` - stream gateway events until Ctrl+C or the verifier hangs up

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tokio::signal;
use tracing::warn;

use vsa_core::domain::events::GatewayEvent;
use vsa_core::domain::gateway_config::GatewayConfigManifest;
use vsa_core::infrastructure::event_bus::EventBusError;

use super::open_session;

#[derive(Args)]
pub struct WatchArgs {
    /// Print each event as one JSON object per line
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: WatchArgs, config: &GatewayConfigManifest) -> Result<()> {
    let manager = open_session(config).await?;
    let mut events = manager.events().subscribe();
    println!("{}", "Watching gateway events (Ctrl+C to stop)".dimmed());

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = events.recv() => match received {
                Ok(event) => {
                    print_event(&event, args.json)?;
                    if matches!(event, GatewayEvent::Disconnected { .. }) {
                        break;
                    }
                }
                Err(EventBusError::Lagged(n)) => {
                    println!("{}", format!("… {} event(s) dropped", n).yellow());
                }
                Err(_) => break,
            }
        }
    }

    manager.close().await;
    Ok(())
}

fn print_event(event: &GatewayEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    println!("{}", render(event));
    Ok(())
}

pub fn render(event: &GatewayEvent) -> String {
    match event {
        GatewayEvent::Connected { host, port, connected_at } => format!(
            "{} {} connected to {}:{}",
            connected_at.format("%H:%M:%S%.3f"),
            "●".green(),
            host,
            port
        ),
        GatewayEvent::Disconnected { reason, disconnected_at } => format!(
            "{} {} disconnected ({:?})",
            disconnected_at.format("%H:%M:%S%.3f"),
            "●".red(),
            reason
        ),
        GatewayEvent::FrameRejected { frame, error, rejected_at } => format!(
            "{} {} rejected frame {:?}: {}",
            rejected_at.format("%H:%M:%S%.3f"),
            "✗".red(),
            frame,
            error
        ),
        GatewayEvent::GateChanged { flag, value, changed_at } => format!(
            "{} {} {} = {}",
            changed_at.format("%H:%M:%S%.3f"),
            "⇄".cyan(),
            flag.to_string().bold(),
            value
        ),
        GatewayEvent::DecisionMade { decision, shape, decided_at } => format!(
            "{} {} {} ({})",
            decided_at.format("%H:%M:%S%.3f"),
            "→".blue(),
            decision,
            shape
        ),
        GatewayEvent::StatesDefined { count, sent_at } => format!(
            "{} {} defineState x{}",
            sent_at.format("%H:%M:%S%.3f"),
            "↑".dimmed(),
            count
        ),
        GatewayEvent::StatesReported { count, sent_at } => format!(
            "{} {} updateState x{}",
            sent_at.format("%H:%M:%S%.3f"),
            "↑".dimmed(),
            count
        ),
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsa_core::domain::events::DisconnectReason;
    use vsa_core::domain::gate::GateFlag;

    #[test]
    fn test_render_mentions_event_details() {
        colored::control::set_override(false);

        let line = render(&GatewayEvent::gate_changed(GateFlag::AgentControl, true));
        assert!(line.ends_with("agent_control = true"), "{}", line);

        let line = render(&GatewayEvent::disconnected(DisconnectReason::RemoteHangup));
        assert!(line.contains("disconnected (RemoteHangup)"), "{}", line);

        let line = render(&GatewayEvent::frame_rejected("not-json", "expected value"));
        assert!(line.contains("\"not-json\""), "{}", line);
    }
}
