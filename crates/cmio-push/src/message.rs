// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Wire messages of the push protocol.
//!
//! One JSON object per line in both directions. Server messages carry a
//! `type` tag of `welcome`, `card-update`, or `write-response`; the only
//! client message is `{type: "write", commands: [...]}`.

use cmio_core::{Card, CommandOutcome};
use serde::{Deserialize, Serialize};

// =============================================================================
// Server → client
// =============================================================================

/// Messages the server pushes to its client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent once when a client connects, identifying the server.
    Welcome {
        /// Server product name.
        server: String,
        /// Server version.
        #[serde(skip_serializing_if = "String::is_empty")]
        version: String,
        /// Framing description.
        protocol: String,
        /// Human-readable summary of what the server does.
        description: String,
    },

    /// Full card snapshot, sent periodically and on DI/AI change.
    CardUpdate {
        /// Sorted card list.
        cards: Vec<Card>,
    },

    /// Reply to a `write` command batch.
    #[serde(rename_all = "camelCase")]
    WriteResponse {
        /// `"ok"` when every command succeeded, else `"error"`.
        status: String,
        /// Per-command results in original command order.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        results: Vec<CommandOutcome>,
        /// First failure's message.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Index of the first failed command.
        #[serde(skip_serializing_if = "Option::is_none")]
        failed_index: Option<usize>,
    },
}

impl ServerMessage {
    /// Builds the welcome message.
    pub fn welcome(version: &str) -> Self {
        Self::Welcome {
            server: "CMIO TCP Server".to_string(),
            version: version.to_string(),
            protocol: "JSON".to_string(),
            description: "CMIO expansion cards TCP server - sends card state updates and \
                          accepts write commands"
                .to_string(),
        }
    }

    /// Builds a card update from a snapshot.
    pub fn card_update(cards: Vec<Card>) -> Self {
        Self::CardUpdate { cards }
    }

    /// Builds a write response, deriving the top-level status from the
    /// first failed result.
    pub fn write_response(results: Vec<CommandOutcome>) -> Self {
        let first_failure = results.iter().find(|r| r.is_error());
        let (status, message, failed_index) = match first_failure {
            Some(failure) => (
                "error".to_string(),
                failure.message.clone(),
                Some(failure.index),
            ),
            None => ("ok".to_string(), None, None),
        };
        Self::WriteResponse {
            status,
            results,
            message,
            failed_index,
        }
    }

    /// Builds an error response with no per-command results.
    pub fn write_error(message: impl Into<String>) -> Self {
        Self::WriteResponse {
            status: "error".to_string(),
            results: Vec::new(),
            message: Some(message.into()),
            failed_index: None,
        }
    }
}

// =============================================================================
// Client → server
// =============================================================================

/// Envelope of a client message. Anything but `type == "write"` is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCommand {
    /// Message type; the server only understands `"write"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The command batch.
    #[serde(default)]
    pub commands: Vec<WriteCommandItem>,
}

/// One command inside a `write` batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteCommandItem {
    /// `write-do`, `write-ao`, `write-aotype`, or `reboot`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Target card id.
    #[serde(default)]
    pub card_id: String,
    /// Channel index.
    #[serde(default)]
    pub index: usize,
    /// Digital state for `write-do`.
    #[serde(default)]
    pub state: bool,
    /// Analog value (raw device units) for `write-ao`.
    #[serde(default)]
    pub value: f32,
    /// AO mode string for `write-aotype`.
    #[serde(default)]
    pub mode: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cmio_core::CommandOutcome;

    #[test]
    fn test_welcome_shape() {
        let json = serde_json::to_value(ServerMessage::welcome("1.0.0")).unwrap();
        assert_eq!(json["type"], "welcome");
        assert_eq!(json["protocol"], "JSON");
        assert_eq!(json["version"], "1.0.0");
    }

    #[test]
    fn test_card_update_shape() {
        let json = serde_json::to_value(ServerMessage::card_update(Vec::new())).unwrap();
        assert_eq!(json["type"], "card-update");
        assert_eq!(json["cards"], serde_json::json!([]));
    }

    #[test]
    fn test_write_response_ok() {
        let json = serde_json::to_value(ServerMessage::write_response(vec![
            CommandOutcome::ok(0),
            CommandOutcome::ok_with(1, "value unchanged, skipped"),
        ]))
        .unwrap();
        assert_eq!(json["type"], "write-response");
        assert_eq!(json["status"], "ok");
        assert!(json.get("failedIndex").is_none());
        assert_eq!(json["results"][1]["message"], "value unchanged, skipped");
    }

    #[test]
    fn test_write_response_error_names_first_failure() {
        let json = serde_json::to_value(ServerMessage::write_response(vec![
            CommandOutcome::ok(0),
            CommandOutcome::error(1, "card not found"),
            CommandOutcome::error(2, "index out of range"),
        ]))
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["failedIndex"], 1);
        assert_eq!(json["message"], "card not found");
    }

    #[test]
    fn test_client_command_parsing() {
        let line = r#"{"type":"write","commands":[
            {"type":"write-do","cardId":"1","index":2,"state":true},
            {"type":"write-ao","cardId":"1","index":0,"value":5000},
            {"type":"reboot","cardId":"2","index":0}
        ]}"#;
        let command: ClientCommand = serde_json::from_str(line).unwrap();
        assert_eq!(command.kind, "write");
        assert_eq!(command.commands.len(), 3);
        assert_eq!(command.commands[0].card_id, "1");
        assert!(command.commands[0].state);
        assert_eq!(command.commands[1].value, 5000.0);
        assert_eq!(command.commands[2].kind, "reboot");
    }
}
