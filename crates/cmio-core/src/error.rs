// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the I/O manager.

use cmio_modbus::ModbusError;
use thiserror::Error;

/// Result type alias for I/O manager operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the card registry and bus operations.
///
/// Transport errors (`Port`, `Modbus`) are transient and clear on a later
/// cycle; the rest are protocol misuse or configuration errors reported
/// synchronously to the caller and never enqueued.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The referenced card id is not registered.
    #[error("card not found")]
    CardNotFound {
        /// The id that failed to resolve.
        id: String,
    },

    /// A channel index is outside the card's spec.
    #[error("index out of range: {index} (card has {limit} channels)")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of channels of that kind on the card.
        limit: usize,
    },

    /// The module name is not in the model table.
    #[error("unknown module {module}")]
    UnknownModule {
        /// The rejected module name.
        module: String,
    },

    /// Auto-detection did not match any known module.
    #[error("unable to detect module on {port} slave {slave}; specify module explicitly")]
    DetectionFailed {
        /// Port probed.
        port: String,
        /// Slave id probed.
        slave: u8,
    },

    /// The slave id is outside the addressable range.
    #[error("invalid slave id {slave}")]
    InvalidSlaveId {
        /// The rejected slave id.
        slave: u8,
    },

    /// The serial port could not be opened or created.
    #[error("port {path}: {source}")]
    Port {
        /// Port path.
        path: String,
        /// Underlying transport error.
        #[source]
        source: ModbusError,
    },

    /// A bus transaction failed.
    #[error(transparent)]
    Modbus(#[from] ModbusError),
}

impl CoreError {
    /// Creates a card-not-found error.
    pub fn card_not_found(id: impl Into<String>) -> Self {
        Self::CardNotFound { id: id.into() }
    }

    /// Creates an unknown-module error.
    pub fn unknown_module(module: impl Into<String>) -> Self {
        Self::UnknownModule {
            module: module.into(),
        }
    }

    /// Creates a port error.
    pub fn port(path: impl Into<String>, source: ModbusError) -> Self {
        Self::Port {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for errors a later cycle may clear on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Port { .. } => true,
            Self::Modbus(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_wire_messages() {
        // The REST and TCP layers surface these texts verbatim.
        assert_eq!(CoreError::card_not_found("9").to_string(), "card not found");
        assert!(CoreError::IndexOutOfRange { index: 7, limit: 4 }
            .to_string()
            .starts_with("index out of range"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(!CoreError::card_not_found("1").is_transient());
        assert!(CoreError::Modbus(ModbusError::timeout(
            "modbus transaction",
            std::time::Duration::from_millis(200)
        ))
        .is_transient());
    }
}
