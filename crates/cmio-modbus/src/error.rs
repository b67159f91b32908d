// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus error types.
//!
//! Errors are grouped by where they originate on the path to the device:
//!
//! ```text
//! ModbusError
//! ├── Connection - serial port open/close failures, lost handles
//! ├── Timeout    - per-request deadline expiry
//! ├── Frame      - CRC, framing and request/response echo mismatches
//! ├── Exception  - Modbus exception responses from the device
//! └── Request    - locally rejected requests (never hit the bus)
//! ```
//!
//! Transport errors (`Connection`, `Timeout`, `Frame`, `Exception`) are
//! recoverable by retrying on a later cycle; `Request` errors are caller
//! bugs and are surfaced synchronously.

use std::time::Duration;

use thiserror::Error;

use crate::frame::ExceptionCode;

/// Result type alias for Modbus operations.
pub type ModbusResult<T> = Result<T, ModbusError>;

// =============================================================================
// ModbusError
// =============================================================================

/// The error type for all Modbus operations.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Serial connection errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// A request did not complete within its deadline.
    #[error("timeout after {timeout:?} during {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The deadline that expired.
        timeout: Duration,
    },

    /// Framing errors in the reply.
    #[error("{0}")]
    Frame(#[from] FrameError),

    /// The device answered with a Modbus exception.
    #[error("exception response to function 0x{function:02X}: {code}")]
    Exception {
        /// The function code the exception responds to.
        function: u8,
        /// The exception code reported by the device.
        code: ExceptionCode,
    },

    /// The request was rejected before touching the bus.
    #[error("invalid request: {0}")]
    Request(String),
}

impl ModbusError {
    /// Creates a timeout error for the given operation.
    pub fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout { operation, timeout }
    }

    /// Creates an exception error from the raw exception byte.
    pub fn exception(function: u8, code: u8) -> Self {
        Self::Exception {
            function,
            code: ExceptionCode::from_u8(code),
        }
    }

    /// Creates a locally-rejected request error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    /// Returns `true` for errors that a later cycle may clear on its own.
    ///
    /// Everything that reached (or tried to reach) the wire is transient;
    /// only locally rejected requests are permanent.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Request(_))
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Serial connection errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The serial port could not be opened.
    #[error("failed to open serial port {port}: {message}")]
    Open {
        /// Port path.
        port: String,
        /// Underlying error text.
        message: String,
    },

    /// An operation was attempted on a closed transport.
    #[error("transport is not connected")]
    NotConnected,

    /// The handle failed mid-request.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Creates an open failure for the given port.
    pub fn open(port: impl Into<String>, message: impl ToString) -> Self {
        Self::Open {
            port: port.into(),
            message: message.to_string(),
        }
    }
}

// =============================================================================
// FrameError
// =============================================================================

/// Reply framing errors.
///
/// Any of these means the bytes on the wire cannot be trusted as an answer
/// to the request that was sent.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The reply ended before a complete frame was received.
    #[error("frame too short ({len} bytes)")]
    TooShort {
        /// Number of bytes received.
        len: usize,
    },

    /// The CRC trailer does not match the frame body.
    #[error("CRC mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    CrcMismatch {
        /// CRC computed over the received body.
        computed: u16,
        /// CRC carried by the frame.
        received: u16,
    },

    /// The reply came from a different slave than addressed.
    #[error("slave id mismatch: expected {expected}, got {actual}")]
    SlaveMismatch {
        /// The slave the request addressed.
        expected: u8,
        /// The slave the reply names.
        actual: u8,
    },

    /// The reply echoes a different function code than requested.
    #[error("function code mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    FunctionMismatch {
        /// The requested function code.
        expected: u8,
        /// The echoed function code.
        actual: u8,
    },

    /// The payload does not have the shape the function code promises.
    #[error("malformed frame: {0}")]
    Malformed(String),
}

impl FrameError {
    /// Creates a malformed-frame error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ModbusError::timeout("read", Duration::from_millis(200)).is_transient());
        assert!(ModbusError::exception(0x03, 0x02).is_transient());
        assert!(ModbusError::from(FrameError::TooShort { len: 1 }).is_transient());
        assert!(!ModbusError::request("index out of range").is_transient());
    }

    #[test]
    fn test_display() {
        let err = ModbusError::exception(0x03, 0x02);
        let text = err.to_string();
        assert!(text.contains("0x03"));
        assert!(text.contains("illegal data address"));

        let err = ModbusError::from(FrameError::CrcMismatch {
            computed: 0x1234,
            received: 0x4321,
        });
        assert!(err.to_string().contains("0x1234"));
    }
}
