// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::error::BinResult;

/// Prints version information for all components.
pub fn version() -> BinResult<()> {
    println!("cmio {}", cmio_core::VERSION);
    println!("  cmio-core   {}", cmio_core::VERSION);
    println!("  cmio-modbus {}", cmio_modbus::VERSION);
    Ok(())
}
