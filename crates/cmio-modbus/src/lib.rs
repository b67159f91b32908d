// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cmio-modbus
//!
//! Modbus RTU plumbing for the CMIO gateway: the frame codec, the transport
//! abstraction, the serial transport, and the port session that serializes
//! all traffic on one RS-485 line.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 PortSession                 │
//! │   (mutex, per-request timeout, RS-485 gap)  │
//! └─────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │                  Transport                  │
//! │        transact(request, timeout)           │
//! └─────────────────────────────────────────────┘
//!          │                         │
//!          ▼                         ▼
//! ┌──────────────────┐    ┌──────────────────────┐
//! │  SerialTransport │    │  scripted transport  │
//! │  (tokio-serial)  │    │      (tests)         │
//! └──────────────────┘    └──────────────────────┘
//! ```
//!
//! The frame codec lives in [`frame`] and is shared by both sides: requests
//! are encoded to RTU ADUs (slave + PDU + CRC-16/Modbus appended
//! little-endian) and replies are verified against the originating request
//! (CRC, slave id echo, function code echo, exception decoding).

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod frame;
pub mod serial;
pub mod session;
pub mod transport;

pub use error::{ConnectionError, FrameError, ModbusError, ModbusResult};
pub use frame::{ExceptionCode, FunctionCode, Request, Response, SlaveId};
pub use serial::SerialTransport;
pub use session::{PortSession, DEFAULT_OPERATION_DELAY, DEFAULT_TIMEOUT};
pub use transport::{DataBits, Parity, SerialSettings, StopBits, Transport, TransportFactory};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
