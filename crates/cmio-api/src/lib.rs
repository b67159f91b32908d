// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cmio-api
//!
//! REST front-end for the CMIO gateway: a thin request → queue adapter over
//! the I/O manager, for the human operator UI. While the TCP automation
//! peer is attached, the mutating endpoints answer 503 and the UI is
//! read-only.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::{ApiConfig, ApiServer, DEFAULT_API_PORT};
pub use state::AppState;
