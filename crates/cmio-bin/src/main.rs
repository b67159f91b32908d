// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CMIO gateway entry point.

use clap::Parser;

use cmio_bin::cli::Cli;
use cmio_bin::commands;
use cmio_bin::error::report_error_and_exit;
use cmio_bin::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format);

    if let Err(error) = commands::execute(cli).await {
        report_error_and_exit(error);
    }
}
