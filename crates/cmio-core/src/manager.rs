// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The I/O manager: card registry, write queue, and safe-state engine.
//!
//! One `IoManager` owns everything behind the bus: the port sessions, the
//! card registry, the pending-write FIFO, and the registered state-change
//! callback. Registry state lives behind a single mutex that is never held
//! across an await; all bus traffic goes through the per-port sessions,
//! which serialize frame-by-frame.
//!
//! The cycle scheduler (see [`crate::cycle`]) is the only task that drains
//! the write queue on a timer; front-ends may also push batches straight
//! through [`IoManager::process_batch_write`], with the port mutex
//! serializing the actual wire traffic.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use cmio_modbus::{
    PortSession, SerialSettings, SerialTransport, SlaveId, Transport, TransportFactory,
    DEFAULT_OPERATION_DELAY, DEFAULT_TIMEOUT,
};

use crate::card::{AoMode, Card, CardState};
use crate::error::{CoreError, CoreResult};
use crate::io;
use crate::model::{spec_for, ModelSpec};
use crate::write::{
    self, CommandOutcome, WriteGroup, WriteKind, WriteOp, WriteRequest,
};

/// Default bus port path on the gateway hardware.
pub const DEFAULT_PORT_PATH: &str = "/dev/ttyS7";

/// Highest slave id probed during discovery.
pub const DEFAULT_MAX_SLAVE: u8 = 5;

/// Default delay between cycle iterations.
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_millis(10);

/// Called with a fresh sorted card snapshot when DI or AI values change.
///
/// The callback runs inline on the cycle task. It must return promptly and
/// must not call back into mutating manager methods synchronously: the push
/// server hands the snapshot to its writer task through a channel.
pub type StateChangeCallback = Arc<dyn Fn(Vec<Card>) + Send + Sync>;

// =============================================================================
// Configuration
// =============================================================================

/// Safe values written to every output when the commanding peer disconnects.
///
/// Analog values are engineering units here and converted to raw device
/// units (×1000) at write time.
#[derive(Debug, Clone, Copy)]
pub struct SafeStateConfig {
    /// Safe state for all digital outputs.
    pub do_state: bool,
    /// Safe value in volts for 0–10 V channels.
    pub ao_voltage_value: f32,
    /// Safe value in milliamps for 4–20 mA channels.
    pub ao_current_value: f32,
}

impl Default for SafeStateConfig {
    fn default() -> Self {
        Self {
            do_state: false,       // outputs open/off
            ao_voltage_value: 0.0, // volts, written as V * 1000
            ao_current_value: 4.0, // mA, written as mA * 1000
        }
    }
}

/// Configuration record for one I/O manager.
///
/// Passed explicitly into the constructor; there is no process-wide mutable
/// state. The transport factory is the test seam: production opens the real
/// serial port, tests inject a scripted transport.
#[derive(Clone)]
pub struct IoConfig {
    /// Bus port path used by discovery.
    pub port_path: String,
    /// Highest slave id swept at discovery.
    pub max_slave: u8,
    /// Serial line settings for newly opened ports.
    pub serial: SerialSettings,
    /// Hard per-request deadline.
    pub timeout: Duration,
    /// Sleep between cycle iterations.
    pub cycle_delay: Duration,
    /// RS-485 inter-frame gap.
    pub operation_delay: Duration,
    /// Safe-state output values.
    pub safe_state: SafeStateConfig,
    /// Minimum AI delta that counts as a state change. 0.0 keeps the
    /// exact-inequality compare.
    pub ai_deadband: f32,
    /// Opens transports for port paths.
    pub transport_factory: TransportFactory,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            port_path: DEFAULT_PORT_PATH.to_string(),
            max_slave: DEFAULT_MAX_SLAVE,
            serial: SerialSettings::default(),
            timeout: DEFAULT_TIMEOUT,
            cycle_delay: DEFAULT_CYCLE_DELAY,
            operation_delay: DEFAULT_OPERATION_DELAY,
            safe_state: SafeStateConfig::default(),
            ai_deadband: 0.0,
            transport_factory: Arc::new(|path, settings| {
                Ok(Box::new(SerialTransport::open(path, settings)?) as Box<dyn Transport>)
            }),
        }
    }
}

impl fmt::Debug for IoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoConfig")
            .field("port_path", &self.port_path)
            .field("max_slave", &self.max_slave)
            .field("serial", &self.serial)
            .field("timeout", &self.timeout)
            .field("cycle_delay", &self.cycle_delay)
            .field("operation_delay", &self.operation_delay)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// IoManager
// =============================================================================

struct CardSlot {
    card: Card,
    /// Set at registration and by reboot; cleared by the next successful
    /// full read.
    needs_full_read: bool,
}

struct Inner {
    cards: HashMap<String, CardSlot>,
    next_id: u64,
    write_queue: Vec<WriteOp>,
    state_change: Option<StateChangeCallback>,
}

/// The card registry and manager facade.
pub struct IoManager {
    config: IoConfig,
    ports: DashMap<String, Arc<PortSession>>,
    inner: Mutex<Inner>,
}

impl IoManager {
    /// Creates a manager with the given configuration.
    pub fn new(config: IoConfig) -> Self {
        Self {
            config,
            ports: DashMap::new(),
            inner: Mutex::new(Inner {
                cards: HashMap::new(),
                next_id: 1,
                write_queue: Vec::new(),
                state_change: None,
            }),
        }
    }

    /// Returns the manager configuration.
    pub fn config(&self) -> &IoConfig {
        &self.config
    }

    /// Returns the session for `path`, opening the port on first use.
    /// Ports live for the process lifetime; a permanently failed port
    /// surfaces as repeated per-card errors.
    fn ensure_port(&self, path: &str) -> CoreResult<Arc<PortSession>> {
        match self.ports.entry(path.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(slot) => {
                let transport = (self.config.transport_factory)(path, &self.config.serial)
                    .map_err(|e| CoreError::port(path, e))?;
                let session = Arc::new(PortSession::new(
                    path,
                    transport,
                    self.config.timeout,
                    self.config.operation_delay,
                ));
                slot.insert(session.clone());
                tracing::info!(port = %path, "opened bus port");
                Ok(session)
            }
        }
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Registers a card, auto-detecting the module when none is given.
    ///
    /// Ensures the port exists, probes the model if needed, assigns the next
    /// monotonic id, inserts the card, then performs one full read to
    /// populate its state. A failed initial read keeps the card registered
    /// with `needs_full_read` set so the next cycle retries the full read.
    pub async fn add_card(
        &self,
        port_path: &str,
        slave: SlaveId,
        module: Option<&str>,
    ) -> CoreResult<Card> {
        if slave == 0 {
            return Err(CoreError::InvalidSlaveId { slave });
        }

        let session = self.ensure_port(port_path)?;

        let spec: &'static ModelSpec = match module {
            Some(name) if !name.is_empty() => {
                spec_for(name).ok_or_else(|| CoreError::unknown_module(name))?
            }
            _ => io::detect_model(&session, slave)
                .await
                .ok_or_else(|| CoreError::DetectionFailed {
                    port: port_path.to_string(),
                    slave,
                })?,
        };

        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id.to_string();
            inner.next_id += 1;
            let card = Card {
                id: id.clone(),
                port_path: port_path.to_string(),
                slave_id: slave,
                module: spec.name.to_string(),
                last: CardState::empty(),
            };
            inner.cards.insert(
                id.clone(),
                CardSlot {
                    card,
                    needs_full_read: true,
                },
            );
            id
        };

        match io::read_card(&session, slave, spec, true).await {
            Ok(state) => {
                let mut inner = self.inner.lock();
                if let Some(slot) = inner.cards.get_mut(&id) {
                    slot.card.last = state;
                    slot.needs_full_read = false;
                }
            }
            Err(e) => {
                tracing::debug!(card = %id, slave, error = %e, "initial card read failed");
            }
        }

        self.get_card(&id).ok_or_else(|| CoreError::card_not_found(&id))
    }

    /// Returns a snapshot of one card.
    pub fn get_card(&self, id: &str) -> Option<Card> {
        self.inner.lock().cards.get(id).map(|slot| slot.card.clone())
    }

    /// Removes a card. Returns `false` when the id is unknown.
    pub fn remove_card(&self, id: &str) -> bool {
        self.inner.lock().cards.remove(id).is_some()
    }

    /// Returns all cards sorted ascending by numeric id, without touching
    /// the bus. The cycle keeps the cached state fresh.
    pub fn get_all_cards(&self) -> Vec<Card> {
        let mut cards: Vec<Card> = {
            let inner = self.inner.lock();
            inner.cards.values().map(|slot| slot.card.clone()).collect()
        };
        cards.sort_by_key(Card::numeric_id);
        cards
    }

    fn sorted_card_ids(&self) -> Vec<String> {
        let mut ids: Vec<(u64, String)> = {
            let inner = self.inner.lock();
            inner
                .cards
                .values()
                .map(|slot| (slot.card.numeric_id(), slot.card.id.clone()))
                .collect()
        };
        ids.sort();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Atomically replaces the state-change callback.
    pub fn set_state_change_callback(&self, callback: StateChangeCallback) {
        self.inner.lock().state_change = Some(callback);
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Reads one card and merges the result into the registry.
    ///
    /// Returns `true` when DI or AI values changed. On a fast read the
    /// previous `ao_type`, `serial_number` and `baud_rate` are spliced into
    /// the new state so observers never see spurious loss of identity. On
    /// error only `last.error` is mutated; a consumed full-read request is
    /// restored so the full read happens on the next successful pass.
    async fn refresh_card(&self, id: &str) -> bool {
        let (port_path, slave, spec, prev, full) = {
            let mut inner = self.inner.lock();
            let Some(slot) = inner.cards.get_mut(id) else {
                return false;
            };
            let Some(spec) = spec_for(&slot.card.module) else {
                return false;
            };
            let full = slot.needs_full_read;
            if full {
                slot.needs_full_read = false;
            }
            (
                slot.card.port_path.clone(),
                slot.card.slave_id,
                spec,
                slot.card.last.clone(),
                full,
            )
        };

        let session = match self.ensure_port(&port_path) {
            Ok(session) => session,
            Err(e) => {
                let mut inner = self.inner.lock();
                if let Some(slot) = inner.cards.get_mut(id) {
                    slot.card.last.error = e.to_string();
                    if full {
                        slot.needs_full_read = true;
                    }
                }
                return false;
            }
        };

        match io::read_card(&session, slave, spec, full).await {
            Ok(mut state) => {
                if !full {
                    state.ao_type = prev.ao_type.clone();
                    state.serial_number = prev.serial_number.clone();
                    state.baud_rate = prev.baud_rate;
                }
                let changed = detect_state_change(&prev, &state, self.config.ai_deadband);
                let mut inner = self.inner.lock();
                if let Some(slot) = inner.cards.get_mut(id) {
                    slot.card.last = state;
                }
                changed
            }
            Err(e) => {
                tracing::warn!(card = %id, slave, error = %e, "card read failed");
                let mut inner = self.inner.lock();
                if let Some(slot) = inner.cards.get_mut(id) {
                    slot.card.last.error = e.to_string();
                    if full {
                        slot.needs_full_read = true;
                    }
                }
                false
            }
        }
    }

    /// Reads every card once and returns the refreshed snapshot. Used by
    /// the rediscover path; the cycle uses
    /// [`read_all_and_process_writes`](Self::read_all_and_process_writes).
    pub async fn refresh_all(&self) -> Vec<Card> {
        for id in self.sorted_card_ids() {
            self.refresh_card(&id).await;
        }
        self.get_all_cards()
    }

    /// The cycle body: reads all cards in id order and drains pending
    /// writes after each card read, minimizing the latency between an
    /// enqueue and its bus frame. Fires the state-change callback at most
    /// once, after all cards are refreshed, with a fresh sorted snapshot.
    pub async fn read_all_and_process_writes(&self) -> Vec<Card> {
        let mut has_state_change = false;

        for id in self.sorted_card_ids() {
            if self.refresh_card(&id).await {
                has_state_change = true;
            }
            self.process_write_queue().await;
        }

        if has_state_change {
            let callback = self.inner.lock().state_change.clone();
            if let Some(callback) = callback {
                callback(self.get_all_cards());
            }
        }

        self.get_all_cards()
    }

    // =========================================================================
    // Write queue
    // =========================================================================

    fn validate_queue_target(
        &self,
        card_id: &str,
        index: usize,
        kind: WriteKind,
    ) -> CoreResult<()> {
        let card = self
            .get_card(card_id)
            .ok_or_else(|| CoreError::card_not_found(card_id))?;
        let spec = card
            .spec()
            .ok_or_else(|| CoreError::unknown_module(&card.module))?;
        let limit = match kind {
            WriteKind::DigitalOut => spec.digital_out,
            WriteKind::AnalogOut | WriteKind::AnalogOutMode => spec.analog_out,
        };
        if index >= limit {
            return Err(CoreError::IndexOutOfRange { index, limit });
        }
        Ok(())
    }

    /// Queues a digital output write.
    pub fn queue_write_do(&self, card_id: &str, index: usize, state: bool) -> CoreResult<()> {
        self.validate_queue_target(card_id, index, WriteKind::DigitalOut)?;
        self.inner
            .lock()
            .write_queue
            .push(WriteOp::digital_out(card_id, index, state));
        Ok(())
    }

    /// Queues an analog output write (raw device units).
    pub fn queue_write_ao(&self, card_id: &str, index: usize, value: f32) -> CoreResult<()> {
        self.validate_queue_target(card_id, index, WriteKind::AnalogOut)?;
        self.inner
            .lock()
            .write_queue
            .push(WriteOp::analog_out(card_id, index, value));
        Ok(())
    }

    /// Queues an AO mode write.
    pub fn queue_write_ao_type(
        &self,
        card_id: &str,
        index: usize,
        mode: AoMode,
    ) -> CoreResult<()> {
        self.validate_queue_target(card_id, index, WriteKind::AnalogOutMode)?;
        self.inner
            .lock()
            .write_queue
            .push(WriteOp::ao_mode(card_id, index, mode));
        Ok(())
    }

    /// Atomically drains the queue and batch-processes the drained slice.
    /// Errors are logged; queued writes are never retried automatically.
    pub async fn process_write_queue(&self) {
        let drained = std::mem::take(&mut self.inner.lock().write_queue);
        if drained.is_empty() {
            return;
        }

        for outcome in self.process_batch_write(drained).await {
            if outcome.is_error() {
                tracing::warn!(
                    index = outcome.index,
                    message = outcome.message.as_deref().unwrap_or(""),
                    "queued write failed"
                );
            }
        }
    }

    /// Processes a batch of writes with no-op elision and frame coalescing.
    ///
    /// The result has one entry per operation with `results[i].index == i`,
    /// regardless of the grouped order the bus saw.
    pub async fn process_batch_write(&self, ops: Vec<WriteOp>) -> Vec<CommandOutcome> {
        let mut results: Vec<Option<CommandOutcome>> = (0..ops.len()).map(|_| None).collect();
        let mut valid: Vec<(usize, WriteOp)> = Vec::new();

        for (i, op) in ops.into_iter().enumerate() {
            let Some(card) = self.get_card(&op.card_id) else {
                results[i] = Some(CommandOutcome::error(i, "card not found"));
                continue;
            };
            let Some(spec) = card.spec() else {
                results[i] = Some(CommandOutcome::error(i, "unknown module"));
                continue;
            };
            let limit = match op.kind() {
                WriteKind::DigitalOut => spec.digital_out,
                WriteKind::AnalogOut | WriteKind::AnalogOutMode => spec.analog_out,
            };
            if op.index >= limit {
                results[i] = Some(CommandOutcome::error(i, "index out of range"));
                continue;
            }
            if write::is_noop(&op, &card.last) {
                results[i] = Some(CommandOutcome::ok_with(i, "value unchanged, skipped"));
                continue;
            }
            valid.push((i, op));
        }

        for group in write::group_ops(valid) {
            for (orig, outcome) in self.process_write_group(&group).await {
                results[orig] = Some(match outcome {
                    Ok(()) => CommandOutcome::ok(orig),
                    Err(message) => CommandOutcome::error(orig, message),
                });
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(i, outcome)| outcome.unwrap_or_else(|| CommandOutcome::ok(i)))
            .collect()
    }

    /// Issues the frames for one `(card, kind)` group. DO and AO groups
    /// collapse into a single multi-write over the index span; AO-mode
    /// registers are written one frame per operation.
    async fn process_write_group(
        &self,
        group: &WriteGroup,
    ) -> Vec<(usize, Result<(), String>)> {
        let Some(card) = self.get_card(&group.card_id) else {
            return group
                .ops
                .iter()
                .map(|(orig, _)| (*orig, Err("card not found".to_string())))
                .collect();
        };

        let session = match self.ensure_port(&card.port_path) {
            Ok(session) => session,
            Err(e) => {
                let message = format!("failed to get port: {e}");
                return group
                    .ops
                    .iter()
                    .map(|(orig, _)| (*orig, Err(message.clone())))
                    .collect();
            }
        };

        match group.kind {
            WriteKind::DigitalOut => {
                let (start, window) = write::coil_window(&group.ops, &card.last.digital_out);
                let result =
                    io::write_digital_outputs(&session, card.slave_id, start, &window).await;
                let shared = result.map_err(|e| e.to_string());
                group
                    .ops
                    .iter()
                    .map(|(orig, _)| (*orig, shared.clone()))
                    .collect()
            }
            WriteKind::AnalogOut => {
                let (start, window) = write::value_window(&group.ops, &card.last.analog_out);
                let result =
                    io::write_analog_outputs(&session, card.slave_id, start, &window).await;
                let shared = result.map_err(|e| e.to_string());
                group
                    .ops
                    .iter()
                    .map(|(orig, _)| (*orig, shared.clone()))
                    .collect()
            }
            WriteKind::AnalogOutMode => {
                let mut outcomes = Vec::with_capacity(group.ops.len());
                for (orig, op) in &group.ops {
                    let WriteRequest::AnalogOutMode { mode } = &op.request else {
                        continue;
                    };
                    let result = io::write_ao_mode(&session, card.slave_id, op.index, *mode)
                        .await
                        .map_err(|e| e.to_string());
                    outcomes.push((*orig, result));
                }
                outcomes
            }
        }
    }

    // =========================================================================
    // Reboot
    // =========================================================================

    /// Sends the reboot command to a card.
    ///
    /// The full-read flag is set before the frame goes out, so even when the
    /// reboot write errors the next cycle re-fetches AO types, serial number
    /// and baud once the device returns. Does not wait for the device to
    /// come back.
    pub async fn reboot_card(&self, card_id: &str) -> CoreResult<()> {
        let (port_path, slave) = {
            let mut inner = self.inner.lock();
            let slot = inner
                .cards
                .get_mut(card_id)
                .ok_or_else(|| CoreError::card_not_found(card_id))?;
            slot.needs_full_read = true;
            (slot.card.port_path.clone(), slot.card.slave_id)
        };

        let session = self.ensure_port(&port_path)?;
        io::reboot(&session, slave).await?;
        tracing::info!(card = %card_id, slave, "reboot command sent");
        Ok(())
    }

    // =========================================================================
    // Safe state
    // =========================================================================

    /// Drives every output of every card to the configured safe values.
    ///
    /// Per card: one WriteMultipleCoils covering all DO channels, then one
    /// WriteMultipleRegisters covering all AO channels with per-channel
    /// values picked by cached AO mode (current-loop channels get the mA
    /// value, everything else the voltage value, both ×1000 raw units).
    /// Partial failure never short-circuits the remaining cards; the first
    /// error is remembered and returned once all cards have been attempted.
    pub async fn write_all_outputs_to_safe_state(&self) -> CoreResult<()> {
        let cards = self.get_all_cards();
        let safe = self.config.safe_state;
        let mut first_error: Option<CoreError> = None;

        for card in cards {
            let Some(spec) = card.spec() else {
                continue;
            };

            let session = match self.ensure_port(&card.port_path) {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(card = %card.id, error = %e, "safe state: port unavailable");
                    first_error.get_or_insert(e);
                    continue;
                }
            };

            if spec.digital_out > 0 {
                let states = vec![safe.do_state; spec.digital_out];
                match io::write_digital_outputs(&session, card.slave_id, 0, &states).await {
                    Ok(()) => tracing::info!(
                        card = %card.id,
                        channels = spec.digital_out,
                        state = safe.do_state,
                        "safe state: digital outputs written"
                    ),
                    Err(e) => {
                        tracing::warn!(card = %card.id, error = %e, "safe state: DO write failed");
                        first_error.get_or_insert(e.into());
                    }
                }
            }

            if spec.analog_out > 0 {
                let values: Vec<f32> = (0..spec.analog_out)
                    .map(|i| {
                        if card.last.ao_type.get(i).copied().is_some_and(AoMode::is_current_loop)
                        {
                            safe.ao_current_value * 1000.0
                        } else {
                            safe.ao_voltage_value * 1000.0
                        }
                    })
                    .collect();
                match io::write_analog_outputs(&session, card.slave_id, 0, &values).await {
                    Ok(()) => tracing::info!(
                        card = %card.id,
                        channels = spec.analog_out,
                        "safe state: analog outputs written"
                    ),
                    Err(e) => {
                        tracing::warn!(card = %card.id, error = %e, "safe state: AO write failed");
                        first_error.get_or_insert(e.into());
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("safe state: all outputs written");
                Ok(())
            }
        }
    }
}

impl fmt::Debug for IoManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("IoManager")
            .field("cards", &inner.cards.len())
            .field("queued_writes", &inner.write_queue.len())
            .field("ports", &self.ports.len())
            .finish()
    }
}

// =============================================================================
// State-change detection
// =============================================================================

/// Returns `true` when DI or AI values differ between two snapshots.
///
/// Length changes always count. AI values compare against `deadband`; the
/// default 0.0 fires on any difference.
fn detect_state_change(prev: &CardState, next: &CardState, deadband: f32) -> bool {
    if prev.digital_in.len() != next.digital_in.len() {
        return true;
    }
    if prev
        .digital_in
        .iter()
        .zip(&next.digital_in)
        .any(|(a, b)| a != b)
    {
        return true;
    }

    if prev.analog_in.len() != next.analog_in.len() {
        return true;
    }
    prev.analog_in
        .iter()
        .zip(&next.analog_in)
        .any(|(a, b)| (a - b).abs() > deadband)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn state(di: Vec<bool>, ai: Vec<f32>) -> CardState {
        CardState {
            digital_in: di,
            analog_in: ai,
            ..CardState::empty()
        }
    }

    #[test]
    fn test_detect_di_change() {
        let prev = state(vec![false, false], vec![]);
        let next = state(vec![false, true], vec![]);
        assert!(detect_state_change(&prev, &next, 0.0));
        assert!(!detect_state_change(&prev, &prev.clone(), 0.0));
    }

    #[test]
    fn test_detect_length_change() {
        let prev = state(vec![], vec![]);
        let next = state(vec![false], vec![]);
        assert!(detect_state_change(&prev, &next, 0.0));
    }

    #[test]
    fn test_detect_ai_change_exact() {
        let prev = state(vec![], vec![1000.0, 2000.0]);
        let next = state(vec![], vec![1000.0, 2000.5]);
        assert!(detect_state_change(&prev, &next, 0.0));
        assert!(!detect_state_change(&prev, &prev.clone(), 0.0));
    }

    #[test]
    fn test_detect_ai_deadband() {
        let prev = state(vec![], vec![1000.0]);
        let within = state(vec![], vec![1000.4]);
        let beyond = state(vec![], vec![1001.0]);
        assert!(!detect_state_change(&prev, &within, 0.5));
        assert!(detect_state_change(&prev, &beyond, 0.5));
    }

    #[test]
    fn test_do_ao_changes_do_not_fire() {
        let mut prev = state(vec![true], vec![1.0]);
        let mut next = prev.clone();
        prev.digital_out = vec![false];
        next.digital_out = vec![true];
        next.analog_out = vec![9.0];
        assert!(!detect_state_change(&prev, &next, 0.0));
    }

    #[test]
    fn test_default_safe_state() {
        let safe = SafeStateConfig::default();
        assert!(!safe.do_state);
        assert_eq!(safe.ao_voltage_value, 0.0);
        assert_eq!(safe.ao_current_value, 4.0);
    }

    #[test]
    fn test_default_config() {
        let config = IoConfig::default();
        assert_eq!(config.port_path, "/dev/ttyS7");
        assert_eq!(config.max_slave, 5);
        assert_eq!(config.timeout, Duration::from_millis(200));
        assert_eq!(config.cycle_delay, Duration::from_millis(10));
        assert_eq!(config.operation_delay, Duration::from_millis(2));
    }
}
