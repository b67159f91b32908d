// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Port session: exclusive owner of one bus transport.
//!
//! RS-485 is a single-writer medium, so everything that wants the wire goes
//! through here. The session guarantees:
//!
//! - at most one outstanding request per port (mutex over the transport);
//! - a mandatory inter-frame gap (`operation_delay`) after every
//!   transaction, success or failure;
//! - a hard per-request deadline (`timeout`) enforced by the transport.
//!
//! The session must never be re-entered from inside a callback dispatched
//! while its lock is held; callbacks in this system fire from the cycle
//! scheduler after the session lock is released.

use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::ModbusResult;
use crate::frame::{FunctionCode, Request, Response, SlaveId};
use crate::transport::Transport;

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/// Default RS-485 inter-frame gap.
pub const DEFAULT_OPERATION_DELAY: Duration = Duration::from_millis(2);

// =============================================================================
// PortSession
// =============================================================================

/// Serializes all Modbus traffic on one serial port.
pub struct PortSession {
    path: String,
    transport: Mutex<Box<dyn Transport>>,
    timeout: Duration,
    operation_delay: Duration,
}

impl PortSession {
    /// Creates a session over an opened transport.
    pub fn new(
        path: impl Into<String>,
        transport: Box<dyn Transport>,
        timeout: Duration,
        operation_delay: Duration,
    ) -> Self {
        Self {
            path: path.into(),
            transport: Mutex::new(transport),
            timeout,
            operation_delay,
        }
    }

    /// Returns the port path this session owns.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the per-request deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Performs one transaction, holding the port for its duration plus the
    /// inter-frame gap.
    ///
    /// The gap is slept while the lock is still held so that two frames from
    /// concurrent callers can never appear on the wire closer together than
    /// `operation_delay`.
    pub async fn transact(&self, request: &Request) -> ModbusResult<Response> {
        let mut transport = self.transport.lock().await;
        let result = transport.transact(request, self.timeout).await;
        tokio::time::sleep(self.operation_delay).await;
        result
    }

    /// Closes the underlying transport.
    pub async fn close(&self) -> ModbusResult<()> {
        self.transport.lock().await.close().await
    }

    // =========================================================================
    // Typed operations
    // =========================================================================

    /// Reads `count` coils starting at `address` (FC 01).
    pub async fn read_coils(
        &self,
        slave: SlaveId,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        let request = Request::read(slave, FunctionCode::ReadCoils, address, count);
        self.transact(&request).await?.parse_bits(count as usize)
    }

    /// Reads `count` discrete inputs starting at `address` (FC 02).
    pub async fn read_discrete_inputs(
        &self,
        slave: SlaveId,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        let request = Request::read(slave, FunctionCode::ReadDiscreteInputs, address, count);
        self.transact(&request).await?.parse_bits(count as usize)
    }

    /// Reads `count` holding registers starting at `address` (FC 03).
    pub async fn read_holding_registers(
        &self,
        slave: SlaveId,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        let request = Request::read(slave, FunctionCode::ReadHoldingRegisters, address, count);
        self.transact(&request).await?.parse_registers()
    }

    /// Reads `count` input registers starting at `address` (FC 04).
    pub async fn read_input_registers(
        &self,
        slave: SlaveId,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        let request = Request::read(slave, FunctionCode::ReadInputRegisters, address, count);
        self.transact(&request).await?.parse_registers()
    }

    /// Writes a single coil (FC 05).
    pub async fn write_single_coil(
        &self,
        slave: SlaveId,
        address: u16,
        state: bool,
    ) -> ModbusResult<()> {
        let request = Request::write_single_coil(slave, address, state);
        self.transact(&request).await.map(|_| ())
    }

    /// Writes a single holding register (FC 06).
    pub async fn write_single_register(
        &self,
        slave: SlaveId,
        address: u16,
        value: u16,
    ) -> ModbusResult<()> {
        let request = Request::write_single_register(slave, address, value);
        self.transact(&request).await.map(|_| ())
    }

    /// Writes multiple coils in one frame (FC 0F).
    pub async fn write_multiple_coils(
        &self,
        slave: SlaveId,
        address: u16,
        states: &[bool],
    ) -> ModbusResult<()> {
        let request = Request::write_multiple_coils(slave, address, states);
        self.transact(&request).await.map(|_| ())
    }

    /// Writes multiple holding registers in one frame (FC 10).
    pub async fn write_multiple_registers(
        &self,
        slave: SlaveId,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        let request = Request::write_multiple_registers(slave, address, values);
        self.transact(&request).await.map(|_| ())
    }
}

impl std::fmt::Debug for PortSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortSession")
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .field("operation_delay", &self.operation_delay)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
