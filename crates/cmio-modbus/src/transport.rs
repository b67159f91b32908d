// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Abstract transport layer.
//!
//! [`Transport`] is the seam between the port session and the wire: one
//! request in, one verified reply out. Production supplies the serial-backed
//! [`SerialTransport`](crate::serial::SerialTransport); tests supply a
//! scripted implementation that answers from canned data and records the
//! frames it was asked to send.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ModbusResult;
use crate::frame::{Request, Response};

// =============================================================================
// Transport
// =============================================================================

/// A bidirectional Modbus transport.
///
/// Implementations are not required to be internally synchronized; the
/// [`PortSession`](crate::session::PortSession) guarantees exclusive access
/// while a transaction is in flight.
#[async_trait]
pub trait Transport: Send {
    /// Sends one request and returns the verified reply.
    ///
    /// `timeout` is a hard deadline for the complete exchange; on expiry any
    /// partial reply is discarded and a timeout error is returned.
    async fn transact(&mut self, request: &Request, timeout: Duration)
        -> ModbusResult<Response>;

    /// Returns `true` while the underlying handle is usable.
    fn is_connected(&self) -> bool;

    /// Releases the underlying handle.
    async fn close(&mut self) -> ModbusResult<()>;
}

// =============================================================================
// Serial line settings
// =============================================================================

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    /// Seven data bits.
    Seven,
    /// Eight data bits.
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    /// One stop bit.
    One,
    /// Two stop bits.
    Two,
}

/// Serial line configuration for a bus port.
///
/// The expansion cards ship at 9600 8-N-1; the baud is the only field that
/// changes in practice (via the `update-baud` bootstrap flow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits.
    pub data_bits: DataBits,
    /// Parity.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: StopBits,
}

impl SerialSettings {
    /// Returns the factory-default 9600 8-N-1 configuration.
    pub fn default_9600_8n1() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }

    /// Returns the same settings at a different baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self::default_9600_8n1()
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = match self.data_bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(f, "{} {}-{}-{}", self.baud_rate, data, parity, stop)
    }
}

// =============================================================================
// Transport factory
// =============================================================================

/// Creates a transport for a port path.
///
/// The I/O manager receives one of these in its configuration record so that
/// tests can inject a scripted transport while production opens the real
/// serial port.
pub type TransportFactory =
    Arc<dyn Fn(&str, &SerialSettings) -> ModbusResult<Box<dyn Transport>> + Send + Sync>;

// =============================================================================
// Tests
// =============================================================================
