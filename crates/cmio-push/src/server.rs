// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The TCP push server.
//!
//! Serves exactly one automation client at a time over line-delimited JSON:
//! a `welcome` on connect, a `card-update` every 500 ms plus immediately on
//! DI/AI change, and `write-response` replies to `write` batches. When the
//! attached client goes away, all card outputs are driven to the configured
//! safe state exactly once.
//!
//! The manager's state-change callback runs inline on the cycle task, so it
//! only does a non-blocking `try_send` into the writer task's channel; a
//! slow client drops push updates rather than stalling the bus.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use cmio_core::{AoMode, CommandOutcome, SharedGateway, StateChangeCallback, WriteOp};

use crate::message::{ClientCommand, ServerMessage, WriteCommandItem};

/// Default push server port.
pub const DEFAULT_PUSH_PORT: u16 = 9081;

/// Update interval for periodic card snapshots.
const UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// Outbound queue depth per client before pushes are dropped.
const CLIENT_QUEUE_DEPTH: usize = 64;

type ClientSender = mpsc::Sender<ServerMessage>;
type ClientSlot = Arc<Mutex<Option<ClientSender>>>;

// =============================================================================
// Configuration
// =============================================================================

/// Push server configuration.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Listen port.
    pub port: u16,
    /// Bind all interfaces instead of loopback only.
    pub serve_externally: bool,
    /// Version string reported in the welcome message.
    pub version: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PUSH_PORT,
            serve_externally: false,
            version: String::new(),
        }
    }
}

// =============================================================================
// PushHandle
// =============================================================================

/// Cheap handle onto the push server's client state.
///
/// The REST front-end uses it to gate mutating endpoints while a client is
/// attached, and to re-register the state-change callback after rediscover.
#[derive(Clone)]
pub struct PushHandle {
    connected: Arc<AtomicBool>,
    client: ClientSlot,
}

impl PushHandle {
    /// Returns `true` while an automation client is attached.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Builds the manager state-change callback.
    ///
    /// The callback never blocks: it hands the snapshot to the client's
    /// writer task with `try_send` and drops the update when the queue is
    /// full or no client is attached.
    pub fn callback(&self) -> StateChangeCallback {
        let client = self.client.clone();
        Arc::new(move |cards| {
            if cards.is_empty() {
                return;
            }
            let guard = client.lock();
            if let Some(tx) = guard.as_ref() {
                let _ = tx.try_send(ServerMessage::card_update(cards));
            }
        })
    }
}

// =============================================================================
// PushServer
// =============================================================================

/// The TCP push server.
pub struct PushServer {
    core: SharedGateway,
    config: PushConfig,
    connected: Arc<AtomicBool>,
    client: ClientSlot,
}

impl PushServer {
    /// Creates a push server over the shared gateway core.
    pub fn new(core: SharedGateway, config: PushConfig) -> Self {
        Self {
            core,
            config,
            connected: Arc::new(AtomicBool::new(false)),
            client: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns a handle for the REST front-end.
    pub fn handle(&self) -> PushHandle {
        PushHandle {
            connected: self.connected.clone(),
            client: self.client.clone(),
        }
    }

    /// Binds the listening socket (loopback unless `serve_externally`).
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let host = if self.config.serve_externally {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };
        let listener = TcpListener::bind((host, self.config.port)).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            local_only = !self.config.serve_externally,
            "TCP push server listening"
        );
        Ok(listener)
    }

    /// Binds and runs the accept loop until the shutdown future resolves.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send,
    ) -> std::io::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Runs the accept loop on an already-bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send,
    ) -> std::io::Result<()> {
        // Immediate updates on DI/AI changes come through this callback.
        {
            let core = self.core.read().await;
            core.manager.set_state_change_callback(self.handle().callback());
        }

        let ticker = tokio::spawn(update_loop(self.core.clone(), self.client.clone()));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.accept_client(stream, peer),
                    Err(e) => {
                        tracing::warn!(error = %e, "TCP accept error");
                    }
                },
            }
        }

        ticker.abort();
        *self.client.lock() = None;
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!("TCP push server stopped");
        Ok(())
    }

    fn accept_client(&self, stream: TcpStream, peer: SocketAddr) {
        if !self.config.serve_externally && !peer.ip().is_loopback() {
            tracing::warn!(peer = %peer, "TCP connection rejected: non-localhost peer");
            return;
        }

        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_DEPTH);
        {
            let mut slot = self.client.lock();
            if slot.is_some() {
                tracing::warn!(peer = %peer, "TCP connection rejected: client already connected");
                return;
            }
            *slot = Some(tx.clone());
        }
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(peer = %peer, "TCP client connected");

        let _ = tx.try_send(ServerMessage::welcome(&self.config.version));

        tokio::spawn(run_client(
            stream,
            rx,
            tx,
            self.core.clone(),
            self.client.clone(),
            self.connected.clone(),
        ));
    }
}

// =============================================================================
// Client handling
// =============================================================================

async fn run_client(
    stream: TcpStream,
    mut outbox: mpsc::Receiver<ServerMessage>,
    tx: ClientSender,
    core: SharedGateway,
    client: ClientSlot,
    connected: Arc<AtomicBool>,
) {
    let (read_half, mut write_half) = stream.into_split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            let mut line = match serde_json::to_string(&message) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode push message");
                    continue;
                }
            };
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                process_line(&line, &core, &tx).await;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "TCP client read error");
                break;
            }
        }
    }

    // Detach this client; a concurrent replacement keeps its own slot.
    let was_attached = {
        let mut slot = client.lock();
        match slot.as_ref() {
            Some(current) if current.same_channel(&tx) => {
                *slot = None;
                true
            }
            _ => false,
        }
    };
    drop(tx);
    let _ = writer.await;

    tracing::info!("TCP client disconnected");

    if was_attached {
        connected.store(false, Ordering::SeqCst);
        tracing::warn!("automation peer disconnected - writing all outputs to safe state");
        let manager = core.read().await.manager.clone();
        if let Err(e) = manager.write_all_outputs_to_safe_state().await {
            tracing::error!(error = %e, "failed to write outputs to safe state");
        }
    }
}

async fn process_line(line: &str, core: &SharedGateway, tx: &ClientSender) {
    let command: ClientCommand = match serde_json::from_str(line) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse TCP command");
            return;
        }
    };

    if command.kind != "write" {
        tracing::warn!(kind = %command.kind, "unknown TCP message type");
        return;
    }

    let response = process_write_batch(core, command.commands).await;
    let _ = tx.send(response).await;
}

/// Executes one `write` batch: reboots first, then the write operations
/// through the batch writer. Results come back in original command order.
async fn process_write_batch(
    core: &SharedGateway,
    commands: Vec<WriteCommandItem>,
) -> ServerMessage {
    if commands.is_empty() {
        return ServerMessage::write_error("no commands in batch");
    }

    let manager = core.read().await.manager.clone();
    let mut results: Vec<Option<CommandOutcome>> = (0..commands.len()).map(|_| None).collect();

    // Reboots are processed before writes.
    for (i, item) in commands.iter().enumerate() {
        if item.kind == "reboot" {
            results[i] = Some(match manager.reboot_card(&item.card_id).await {
                Ok(()) => CommandOutcome::ok(i),
                Err(e) => CommandOutcome::error(i, e.to_string()),
            });
        }
    }

    let mut ops: Vec<WriteOp> = Vec::new();
    let mut op_origin: Vec<usize> = Vec::new();
    for (i, item) in commands.iter().enumerate() {
        match item.kind.as_str() {
            "reboot" => {}
            "write-do" => {
                ops.push(WriteOp::digital_out(&item.card_id, item.index, item.state));
                op_origin.push(i);
            }
            "write-ao" => {
                ops.push(WriteOp::analog_out(&item.card_id, item.index, item.value));
                op_origin.push(i);
            }
            "write-aotype" => match item.mode.parse::<AoMode>() {
                Ok(mode) => {
                    ops.push(WriteOp::ao_mode(&item.card_id, item.index, mode));
                    op_origin.push(i);
                }
                Err(e) => results[i] = Some(CommandOutcome::error(i, e.to_string())),
            },
            other => {
                results[i] = Some(CommandOutcome::error(
                    i,
                    format!("unknown command type {other:?}"),
                ));
            }
        }
    }

    if !ops.is_empty() {
        let write_results = manager.process_batch_write(ops).await;
        for (outcome, &origin) in write_results.into_iter().zip(&op_origin) {
            results[origin] = Some(CommandOutcome {
                index: origin,
                status: outcome.status,
                message: outcome.message,
            });
        }
    }

    let results: Vec<CommandOutcome> = results
        .into_iter()
        .enumerate()
        .map(|(i, outcome)| outcome.unwrap_or_else(|| CommandOutcome::ok(i)))
        .collect();

    ServerMessage::write_response(results)
}

// =============================================================================
// Periodic updates
// =============================================================================

/// Sends the full card snapshot every 500 ms while a client is attached.
async fn update_loop(core: SharedGateway, client: ClientSlot) {
    let mut ticker = tokio::time::interval(UPDATE_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let tx = client.lock().clone();
        let Some(tx) = tx else {
            continue;
        };

        let cards = core.read().await.manager.get_all_cards();
        if cards.is_empty() {
            continue;
        }
        let _ = tx.try_send(ServerMessage::card_update(cards));
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cmio_core::{GatewayCore, IoConfig, IoManager};

    fn empty_core() -> SharedGateway {
        GatewayCore {
            manager: Arc::new(IoManager::new(IoConfig::default())),
            cycle: None,
        }
        .shared()
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let core = empty_core();
        let response = process_write_batch(&core, Vec::new()).await;
        match response {
            ServerMessage::WriteResponse { status, message, .. } => {
                assert_eq!(status, "error");
                assert_eq!(message.as_deref(), Some("no commands in batch"));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_command_type_is_reported_in_place() {
        let core = empty_core();
        let commands = vec![WriteCommandItem {
            kind: "write-pwm".to_string(),
            card_id: "1".to_string(),
            ..WriteCommandItem::default()
        }];
        match process_write_batch(&core, commands).await {
            ServerMessage::WriteResponse { status, results, failed_index, .. } => {
                assert_eq!(status, "error");
                assert_eq!(results.len(), 1);
                assert_eq!(failed_index, Some(0));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_callback_without_client_is_noop() {
        let server = PushServer::new(empty_core(), PushConfig::default());
        let handle = server.handle();
        assert!(!handle.is_connected());
        // Must not block or panic with no client attached.
        (handle.callback())(Vec::new());
    }
}
