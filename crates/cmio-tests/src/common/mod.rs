// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared test support.

pub mod mocks;

use std::time::Duration;

use cmio_core::IoConfig;

use mocks::FakeBus;

/// Returns an `IoConfig` wired to a fake bus, with delays tightened so
/// tests run fast.
pub fn test_io_config(bus: &FakeBus) -> IoConfig {
    IoConfig {
        timeout: Duration::from_millis(50),
        cycle_delay: Duration::from_millis(1),
        operation_delay: Duration::ZERO,
        transport_factory: bus.transport_factory(),
        ..IoConfig::default()
    }
}
