// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Write operations, results, and batching helpers.
//!
//! Writes arrive from two concurrent front-ends (REST and TCP) and are
//! coalesced into the minimum number of bus frames: operations with the
//! same `(card, kind)` are merged into one contiguous multi-write covering
//! the span between their lowest and highest index, with the gap positions
//! seeded from the card's cached state. AO-mode registers are the exception
//! and stay one frame per operation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::card::{AoMode, CardState};

// =============================================================================
// Operations
// =============================================================================

/// The register kind a write targets. Operations only coalesce within one
/// kind on one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    /// Digital output coil.
    DigitalOut,
    /// Analog output value.
    AnalogOut,
    /// Analog output mode register.
    AnalogOutMode,
}

/// The payload of one write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    /// Set a digital output.
    DigitalOut {
        /// Desired coil state.
        state: bool,
    },
    /// Set an analog output (raw device units).
    AnalogOut {
        /// Desired output value.
        value: f32,
    },
    /// Switch an analog output's electrical mode.
    AnalogOutMode {
        /// Desired mode.
        mode: AoMode,
    },
}

impl WriteRequest {
    /// Returns the register kind this payload targets.
    pub fn kind(&self) -> WriteKind {
        match self {
            Self::DigitalOut { .. } => WriteKind::DigitalOut,
            Self::AnalogOut { .. } => WriteKind::AnalogOut,
            Self::AnalogOutMode { .. } => WriteKind::AnalogOutMode,
        }
    }
}

/// One queued write operation. Lives in the FIFO until drained, and is
/// consumed at most once.
#[derive(Debug, Clone)]
pub struct WriteOp {
    /// Target card id.
    pub card_id: String,
    /// Channel index within the kind.
    pub index: usize,
    /// What to write.
    pub request: WriteRequest,
}

impl WriteOp {
    /// Creates a digital output write.
    pub fn digital_out(card_id: impl Into<String>, index: usize, state: bool) -> Self {
        Self {
            card_id: card_id.into(),
            index,
            request: WriteRequest::DigitalOut { state },
        }
    }

    /// Creates an analog output write.
    pub fn analog_out(card_id: impl Into<String>, index: usize, value: f32) -> Self {
        Self {
            card_id: card_id.into(),
            index,
            request: WriteRequest::AnalogOut { value },
        }
    }

    /// Creates an AO mode write.
    pub fn ao_mode(card_id: impl Into<String>, index: usize, mode: AoMode) -> Self {
        Self {
            card_id: card_id.into(),
            index,
            request: WriteRequest::AnalogOutMode { mode },
        }
    }

    /// Returns the register kind of this operation.
    pub fn kind(&self) -> WriteKind {
        self.request.kind()
    }
}

// =============================================================================
// Results
// =============================================================================

/// Outcome status of one command in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    /// The command succeeded (or was a no-op).
    Ok,
    /// The command failed; `message` says why.
    Error,
}

/// Per-command result of a batch write, in the caller's command order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Position in the original command array.
    pub index: usize,
    /// Outcome status.
    pub status: CommandStatus,
    /// Detail message (error text, or a skip note).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandOutcome {
    /// Creates a success outcome.
    pub fn ok(index: usize) -> Self {
        Self {
            index,
            status: CommandStatus::Ok,
            message: None,
        }
    }

    /// Creates a success outcome with a note.
    pub fn ok_with(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            status: CommandStatus::Ok,
            message: Some(message.into()),
        }
    }

    /// Creates an error outcome.
    pub fn error(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            status: CommandStatus::Error,
            message: Some(message.into()),
        }
    }

    /// Returns `true` for error outcomes.
    pub fn is_error(&self) -> bool {
        self.status == CommandStatus::Error
    }
}

// =============================================================================
// Batching helpers
// =============================================================================

/// A set of operations sharing `(card, kind)`, tagged with their original
/// batch positions so results land back in caller order.
#[derive(Debug)]
pub(crate) struct WriteGroup {
    pub card_id: String,
    pub kind: WriteKind,
    pub ops: Vec<(usize, WriteOp)>,
}

/// Groups operations by `(card, kind)`, preserving arrival order within each
/// group.
pub(crate) fn group_ops(ops: Vec<(usize, WriteOp)>) -> Vec<WriteGroup> {
    let mut groups: Vec<WriteGroup> = Vec::new();
    let mut index: HashMap<(String, WriteKind), usize> = HashMap::new();

    for (orig, op) in ops {
        let key = (op.card_id.clone(), op.kind());
        match index.get(&key) {
            Some(&at) => groups[at].ops.push((orig, op)),
            None => {
                index.insert(key, groups.len());
                groups.push(WriteGroup {
                    card_id: op.card_id.clone(),
                    kind: op.kind(),
                    ops: vec![(orig, op)],
                });
            }
        }
    }

    groups
}

/// Returns `true` when the operation would not change the card's cached
/// state. Indices beyond the cached vectors always count as a change.
pub(crate) fn is_noop(op: &WriteOp, cached: &CardState) -> bool {
    match &op.request {
        WriteRequest::DigitalOut { state } => {
            cached.digital_out.get(op.index) == Some(state)
        }
        WriteRequest::AnalogOut { value } => {
            cached.analog_out.get(op.index) == Some(value)
        }
        WriteRequest::AnalogOutMode { mode } => cached.ao_type.get(op.index) == Some(mode),
    }
}

/// Builds the coil window for a DO group: the span `[min_index, max_index]`
/// seeded from the cached outputs and overlaid with the new states.
pub(crate) fn coil_window(ops: &[(usize, WriteOp)], cached: &[bool]) -> (usize, Vec<bool>) {
    let (start, mut window) = seeded_window(ops, cached, false);
    for (_, op) in ops {
        if let WriteRequest::DigitalOut { state } = &op.request {
            window[op.index - start] = *state;
        }
    }
    (start, window)
}

/// Builds the value window for an AO group, seeded from cached outputs.
pub(crate) fn value_window(ops: &[(usize, WriteOp)], cached: &[f32]) -> (usize, Vec<f32>) {
    let (start, mut window) = seeded_window(ops, cached, 0.0);
    for (_, op) in ops {
        if let WriteRequest::AnalogOut { value } = &op.request {
            window[op.index - start] = *value;
        }
    }
    (start, window)
}

fn seeded_window<T: Copy>(
    ops: &[(usize, WriteOp)],
    cached: &[T],
    fill: T,
) -> (usize, Vec<T>) {
    let start = ops.iter().map(|(_, op)| op.index).min().unwrap_or(0);
    let end = ops.iter().map(|(_, op)| op.index).max().unwrap_or(0);
    let window = (start..=end)
        .map(|i| cached.get(i).copied().unwrap_or(fill))
        .collect();
    (start, window)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(ops: Vec<WriteOp>) -> Vec<(usize, WriteOp)> {
        ops.into_iter().enumerate().collect()
    }

    #[test]
    fn test_group_by_card_and_kind() {
        let groups = group_ops(indexed(vec![
            WriteOp::digital_out("1", 0, true),
            WriteOp::digital_out("1", 3, true),
            WriteOp::analog_out("1", 0, 5000.0),
            WriteOp::digital_out("2", 0, false),
        ]));

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].card_id, "1");
        assert_eq!(groups[0].kind, WriteKind::DigitalOut);
        assert_eq!(groups[0].ops.len(), 2);
        assert_eq!(groups[1].kind, WriteKind::AnalogOut);
        assert_eq!(groups[2].card_id, "2");
    }

    #[test]
    fn test_coil_window_covers_span() {
        let cached = vec![false, true, false, false];
        let group = indexed(vec![
            WriteOp::digital_out("1", 0, true),
            WriteOp::digital_out("1", 3, true),
        ]);
        let (start, window) = coil_window(&group, &cached);
        assert_eq!(start, 0);
        // Index 1 keeps its cached value, index 2 keeps cached false.
        assert_eq!(window, vec![true, true, false, true]);
    }

    #[test]
    fn test_coil_window_offset_start() {
        let cached = vec![true, true, true, true, true, true, true, true];
        let group = indexed(vec![
            WriteOp::digital_out("1", 5, false),
            WriteOp::digital_out("1", 6, false),
        ]);
        let (start, window) = coil_window(&group, &cached);
        assert_eq!(start, 5);
        assert_eq!(window, vec![false, false]);
    }

    #[test]
    fn test_value_window_seeds_from_cache() {
        let cached = vec![1000.0, 2000.0, 3000.0, 4000.0];
        let group = indexed(vec![
            WriteOp::analog_out("1", 1, 9000.0),
            WriteOp::analog_out("1", 3, 7000.0),
        ]);
        let (start, window) = value_window(&group, &cached);
        assert_eq!(start, 1);
        assert_eq!(window, vec![9000.0, 3000.0, 7000.0]);
    }

    #[test]
    fn test_noop_detection() {
        let mut cached = CardState::empty();
        cached.digital_out = vec![false, true];
        cached.analog_out = vec![4000.0];
        cached.ao_type = vec![AoMode::Current4To20Ma];

        assert!(is_noop(&WriteOp::digital_out("1", 1, true), &cached));
        assert!(!is_noop(&WriteOp::digital_out("1", 1, false), &cached));
        assert!(is_noop(&WriteOp::analog_out("1", 0, 4000.0), &cached));
        assert!(!is_noop(&WriteOp::analog_out("1", 0, 4001.0), &cached));
        assert!(is_noop(
            &WriteOp::ao_mode("1", 0, AoMode::Current4To20Ma),
            &cached
        ));
        // Beyond the cached vector: always write.
        assert!(!is_noop(&WriteOp::digital_out("1", 5, false), &cached));
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = CommandOutcome::ok_with(2, "value unchanged, skipped");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["index"], 2);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["message"], "value unchanged, skipped");

        let error = CommandOutcome::error(0, "card not found");
        assert_eq!(serde_json::to_value(&error).unwrap()["status"], "error");
    }
}
