// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Verifier Connection
//!
//! Owns the TCP stream to the verifier and its newline framing.
//!
//! # Architecture
//!
//! ```text
//!   event sources ──send_line()──> [tokio Mutex<OwnedWriteHalf>] ──> verifier
//!                                                                       │
//!   GateState <──apply()── receive loop <── OwnedReadHalf <─────────────┘
//! ```
//!
//! - Writers are serialized through one async mutex, so each frame reaches
//!   the wire whole.
//! - Exactly one receive loop runs per connection. It is the only writer of
//!   [`GateState`] and stops when the verifier hangs up, the read fails, or
//!   the connection's `CancellationToken` fires.
//! - A malformed frame is logged, published as `FrameRejected` and dropped;
//!   it never ends the loop.
//! - Lifecycle moves `Connected -> Closed` once and never back.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::events::{DisconnectReason, GatewayEvent};
use crate::domain::gate::{GateState, Lifecycle};
use crate::domain::protocol::decode_frame;
use crate::error::{GatewayError, GatewayResult};
use crate::infrastructure::event_bus::EventBus;

/// Result of a send that did not fail at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The frame was written to the stream
    Sent,
    /// Not connected; nothing was written and a warning was logged
    Skipped,
}

impl SendStatus {
    pub fn is_sent(self) -> bool {
        self == SendStatus::Sent
    }
}

pub struct Connection {
    peer: String,
    lifecycle: Arc<AtomicU8>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    shutdown: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
    events: EventBus,
}

impl Connection {
    /// Open a TCP stream to `host:port` and start the receive loop.
    pub async fn open(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        gate: Arc<GateState>,
        events: EventBus,
    ) -> GatewayResult<Self> {
        let address = format!("{}:{}", host, port);

        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(address.as_str())).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                warn!(address = %address, error = %source, "Failed to connect to verifier");
                return Err(GatewayError::Connect { address, source });
            }
            Err(_) => {
                warn!(address = %address, timeout = ?connect_timeout, "Timed out connecting to verifier");
                return Err(GatewayError::ConnectTimeout {
                    address,
                    timeout: connect_timeout,
                });
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle on verifier stream");
        }

        let (read_half, write_half) = stream.into_split();
        let lifecycle = Arc::new(AtomicU8::new(Lifecycle::Connected.as_u8()));
        let shutdown = CancellationToken::new();

        let reader = tokio::spawn(receive_loop(
            read_half,
            gate,
            lifecycle.clone(),
            shutdown.clone(),
            events.clone(),
        ));

        info!(host = %host, port = port, "Connected to verifier");
        events.publish(GatewayEvent::connected(host, port));

        Ok(Self {
            peer: address,
            lifecycle,
            writer: tokio::sync::Mutex::new(Some(write_half)),
            shutdown,
            reader: Mutex::new(Some(reader)),
            events,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.lifecycle() == Lifecycle::Connected
    }

    /// Write one already-terminated frame.
    ///
    /// Returns `Skipped` without touching the stream once closed. Write
    /// failures are returned to the caller.
    pub async fn send_line(&self, line: &str) -> GatewayResult<SendStatus> {
        if !self.is_connected() {
            warn!(peer = %self.peer, "Connection is closed. Cannot send frame.");
            return Ok(SendStatus::Skipped);
        }

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            warn!(peer = %self.peer, "Connection is closed. Cannot send frame.");
            return Ok(SendStatus::Skipped);
        };

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(GatewayError::Write)?;
        writer.flush().await.map_err(GatewayError::Write)?;

        debug!(peer = %self.peer, bytes = line.len(), "Frame sent");
        Ok(SendStatus::Sent)
    }

    /// Stop the receive loop and release the stream. Idempotent.
    pub async fn close(&self) {
        let previous = Lifecycle::from_u8(
            self.lifecycle
                .swap(Lifecycle::Closed.as_u8(), Ordering::AcqRel),
        );

        self.shutdown.cancel();

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Error shutting down verifier stream");
            }
        }

        let reader = self.reader.lock().take();
        if let Some(handle) = reader {
            if let Err(e) = handle.await {
                warn!(error = %e, "Receive loop ended abnormally");
            }
        }

        if previous == Lifecycle::Connected {
            info!(peer = %self.peer, "Socket connection closed");
            self.events
                .publish(GatewayEvent::disconnected(DisconnectReason::Closed));
        } else {
            debug!(peer = %self.peer, "Connection already closed");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.lifecycle
            .store(Lifecycle::Closed.as_u8(), Ordering::Release);
        self.shutdown.cancel();
    }
}

async fn receive_loop(
    read_half: OwnedReadHalf,
    gate: Arc<GateState>,
    lifecycle: Arc<AtomicU8>,
    shutdown: CancellationToken,
    events: EventBus,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(256);

    let outcome = loop {
        // Partially read bytes stay in `buf` if cancellation wins the race;
        // the loop exits in that case so they are never misparsed.
        tokio::select! {
            _ = shutdown.cancelled() => break None,
            read = reader.read_until(b'\n', &mut buf) => match read {
                Ok(0) => break Some(DisconnectReason::RemoteHangup),
                Ok(_) => {
                    handle_frame(&buf, &gate, &events);
                    buf.clear();
                }
                Err(e) => {
                    warn!(error = %e, "Server connection closed or encountered error");
                    break Some(DisconnectReason::ReadError);
                }
            }
        }
    };

    match outcome {
        None => debug!("Receive loop cancelled"),
        Some(reason) => {
            let previous =
                Lifecycle::from_u8(lifecycle.swap(Lifecycle::Closed.as_u8(), Ordering::AcqRel));
            if previous == Lifecycle::Connected {
                info!(reason = ?reason, "Verifier connection lost");
                events.publish(GatewayEvent::disconnected(reason));
            }
        }
    }
}

fn handle_frame(raw: &[u8], gate: &GateState, events: &EventBus) {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text.trim(),
        Err(e) => {
            let lossy = String::from_utf8_lossy(raw).trim().to_string();
            warn!(frame = %lossy, error = %e, "Discarding non UTF-8 verifier frame");
            events.publish(GatewayEvent::frame_rejected(lossy, e));
            return;
        }
    };

    if text.is_empty() {
        return;
    }

    debug!(frame = %text, "Server -> client");

    match decode_frame(text) {
        Ok(message) => {
            let (flag, value) = gate.apply(message);
            debug!(flag = %flag, value = value, "Gate flag updated");
            events.publish(GatewayEvent::gate_changed(flag, value));
        }
        Err(e) => {
            warn!(frame = %text, error = %e, "Error parsing server message");
            events.publish(GatewayEvent::frame_rejected(text, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gate::GateFlag;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn open_pair() -> (Connection, TcpStream, Arc<GateState>, EventBus) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let gate = Arc::new(GateState::new());
        let events = EventBus::new(64);

        let (conn, accepted) = tokio::join!(
            Connection::open("127.0.0.1", port, Duration::from_secs(2), gate.clone(), events.clone()),
            listener.accept()
        );
        (conn.unwrap(), accepted.unwrap().0, gate, events)
    }

    #[test]
    fn test_handle_frame_applies_and_rejects() {
        let gate = GateState::new();
        let events = EventBus::new(8);
        let mut rx = events.subscribe();

        handle_frame(b"{\"Agent_Control\":true}\n", &gate, &events);
        assert!(gate.agent_control());
        assert!(matches!(
            rx.try_recv().unwrap(),
            GatewayEvent::GateChanged { flag: GateFlag::AgentControl, value: true, .. }
        ));

        handle_frame(b"not-json\n", &gate, &events);
        assert!(matches!(rx.try_recv().unwrap(), GatewayEvent::FrameRejected { .. }));
        assert_eq!(gate.flags(), (true, false));

        handle_frame(&[0xff, 0xfe, b'\n'], &gate, &events);
        assert!(matches!(rx.try_recv().unwrap(), GatewayEvent::FrameRejected { .. }));

        handle_frame(b"   \r\n", &gate, &events);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_line_reaches_peer() {
        let (conn, mut peer, _gate, _events) = open_pair().await;

        let status = conn.send_line("{\"a\":1}\n").await.unwrap();
        assert_eq!(status, SendStatus::Sent);

        let mut buf = [0u8; 8];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"{\"a\":1}\n");
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_skips_later_sends() {
        let (conn, mut peer, _gate, events) = open_pair().await;
        let mut rx = events.subscribe();

        conn.close().await;
        conn.close().await;
        conn.close().await;
        assert_eq!(conn.lifecycle(), Lifecycle::Closed);

        assert_eq!(
            rx.wait_for_disconnect().await.unwrap(),
            DisconnectReason::Closed
        );
        assert!(matches!(rx.try_recv(), Err(_)));

        assert_eq!(conn.send_line("{}\n").await.unwrap(), SendStatus::Skipped);

        // Peer sees EOF once the write half is shut down
        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_remote_hangup_marks_closed() {
        let (conn, peer, _gate, events) = open_pair().await;
        let mut rx = events.subscribe();

        drop(peer);

        assert_eq!(
            rx.wait_for_disconnect().await.unwrap(),
            DisconnectReason::RemoteHangup
        );
        assert_eq!(conn.lifecycle(), Lifecycle::Closed);

        // close() after a hangup still succeeds and publishes nothing new
        conn.close().await;
        assert!(matches!(rx.try_recv(), Err(_)));
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = Connection::open(
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            Arc::new(GateState::new()),
            EventBus::new(4),
        )
        .await;
        assert!(matches!(result, Err(GatewayError::Connect { .. })));
    }
}
