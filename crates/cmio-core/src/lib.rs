// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cmio-core
//!
//! The I/O manager for the CMIO gateway: everything between the REST/TCP
//! front-ends and the RS-485 bus.
//!
//! - **model**: the closed table of known expansion-card models
//! - **card**: card identity and cached state (the wire JSON shapes)
//! - **io**: the per-card register map, probing, reads and writes
//! - **write**: write operations, batch results, coalescing helpers
//! - **manager**: the registry facade, write queue, and safe-state engine
//! - **cycle**: the single scheduler task driving the read→write loop
//! - **discovery**: the startup sweep and the shared gateway handle
//!
//! ## Concurrency model
//!
//! One scheduler task per manager performs all scheduled reads. Front-end
//! tasks run in parallel and may enqueue or batch writes, reboot cards, or
//! trigger the safe state concurrently; every bus frame still passes
//! through the per-port session mutex, so traffic interleaves frame-by-
//! frame, never byte-by-byte. Registry state sits behind one mutex that is
//! never held across an await.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod card;
pub mod cycle;
pub mod discovery;
pub mod error;
pub mod io;
pub mod manager;
pub mod model;
pub mod write;

pub use card::{AoMode, Card, CardState, ParseAoModeError};
pub use cycle::{start_cycle, CycleHandle};
pub use discovery::{initialize, GatewayCore, SharedGateway};
pub use error::{CoreError, CoreResult};
pub use manager::{
    IoConfig, IoManager, SafeStateConfig, StateChangeCallback, DEFAULT_CYCLE_DELAY,
    DEFAULT_MAX_SLAVE, DEFAULT_PORT_PATH,
};
pub use model::{match_counts, spec_for, ModelSpec, MODEL_TABLE};
pub use write::{CommandOutcome, CommandStatus, WriteKind, WriteOp, WriteRequest};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
