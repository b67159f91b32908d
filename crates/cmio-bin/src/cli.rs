// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// CMIO - local I/O expansion card gateway.
///
/// Fronts a bus of industrial I/O expansion cards on one RS-485 line,
/// exposing a live TCP push view to the automation client and a small REST
/// surface to the operator UI.
#[derive(Parser, Debug)]
#[command(
    name = "cmio",
    author = "Sylvex <contact@sylvex.io>",
    version = cmio_core::VERSION,
    about = "CMIO expansion card gateway",
    propagate_version = true
)]
pub struct Cli {
    /// Config directory (overrides the default lookup)
    #[arg(long, env = "CM_UTILS_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info", env = "CMIO_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "CMIO_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Returns the effective command, defaulting to `run`.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the gateway daemon (default)
    ///
    /// Discovers cards on the bus, starts the read-write cycle, and serves
    /// the TCP push and REST interfaces until SIGTERM/SIGINT.
    Run(RunArgs),

    /// Write a new baud rate to all cards and reboot them
    ///
    /// One-off bootstrap tool for devices still at the factory default
    /// baud. Opens the port at the current rate, writes the target rate to
    /// each responding slave, and sends the reboot command so it takes
    /// effect. Exits 0 when at least one card was updated, 1 otherwise.
    #[command(name = "update-baud")]
    UpdateBaud(UpdateBaudArgs),

    /// Show version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Bus serial port
    #[arg(long, default_value = cmio_core::DEFAULT_PORT_PATH)]
    pub port: String,

    /// Bus baud rate
    #[arg(long, default_value_t = 9600)]
    pub baud: u32,

    /// Highest slave id probed at discovery
    #[arg(long, default_value_t = cmio_core::DEFAULT_MAX_SLAVE)]
    pub max_slave: u8,

    /// REST listen port
    #[arg(long, default_value_t = cmio_api::DEFAULT_API_PORT)]
    pub http_port: u16,

    /// TCP push listen port
    #[arg(long, default_value_t = cmio_push::DEFAULT_PUSH_PORT)]
    pub push_port: u16,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            port: cmio_core::DEFAULT_PORT_PATH.to_string(),
            baud: 9600,
            max_slave: cmio_core::DEFAULT_MAX_SLAVE,
            http_port: cmio_api::DEFAULT_API_PORT,
            push_port: cmio_push::DEFAULT_PUSH_PORT,
        }
    }
}

/// Arguments for the `update-baud` command.
#[derive(Args, Debug, Clone)]
pub struct UpdateBaudArgs {
    /// Bus serial port
    #[arg(long, default_value = cmio_core::DEFAULT_PORT_PATH)]
    pub port: String,

    /// Current baud rate (how devices are configured now)
    #[arg(long, default_value_t = 9600)]
    pub current: u32,

    /// Target baud rate to write to devices
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,

    /// Comma-separated slave ids to try
    #[arg(long, default_value = "1,2,3,4,5")]
    pub slaves: String,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for log aggregation
    Json,
    /// Compact format for minimal output
    Compact,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::parse_from(["cmio"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::parse_from(["cmio", "run", "--port", "/dev/ttyUSB0", "--push-port", "9999"]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.port, "/dev/ttyUSB0");
        assert_eq!(args.push_port, 9999);
        assert_eq!(args.http_port, 9080);
    }

    #[test]
    fn test_update_baud_args() {
        let cli = Cli::parse_from(["cmio", "update-baud", "--baud", "115200", "--slaves", "1,2"]);
        let Some(Commands::UpdateBaud(args)) = cli.command else {
            panic!("expected update-baud command");
        };
        assert_eq!(args.current, 9600);
        assert_eq!(args.baud, 115_200);
        assert_eq!(args.slaves, "1,2");
    }

    #[test]
    fn test_log_flags() {
        let cli = Cli::parse_from(["cmio", "-l", "debug", "--log-format", "json"]);
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
