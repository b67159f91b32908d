// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::GatewayRuntime;

/// Starts the gateway daemon.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let runtime = GatewayRuntime::from_args(cli, &args)?;
    runtime.run().await
}
