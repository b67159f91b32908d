// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cmio-push
//!
//! TCP push server for the CMIO gateway.
//!
//! A single local automation client connects over TCP and receives the live
//! card view as line-delimited JSON: one `welcome`, then `card-update`
//! snapshots every 500 ms and immediately on DI/AI change. The client sends
//! batched write commands and receives per-command results in original
//! order. Loss of the client drives all physical outputs to the configured
//! safe state.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod message;
pub mod server;

pub use message::{ClientCommand, ServerMessage, WriteCommandItem};
pub use server::{PushConfig, PushHandle, PushServer, DEFAULT_PUSH_PORT};
