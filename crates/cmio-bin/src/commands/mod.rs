// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.

mod run;
mod update_baud;
mod version;

pub use run::run;
pub use update_baud::update_baud;
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::UpdateBaud(args) => update_baud::update_baud(&args).await,
        Commands::Version => version::version(),
    }
}
