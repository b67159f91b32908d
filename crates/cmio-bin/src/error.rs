// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the CMIO binary.

use thiserror::Error;

/// Result type alias for binary operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that end the process.
#[derive(Debug, Error)]
pub enum BinError {
    /// Device config could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] cmio_config::ConfigError),

    /// A server failed to bind or serve.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bus-level failure in a maintenance command.
    #[error("bus error: {0}")]
    Modbus(#[from] cmio_modbus::ModbusError),

    /// Invalid command-line input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic runtime failure.
    #[error("{0}")]
    Runtime(String),
}

impl BinError {
    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

/// Reports an error on stderr and exits with status 1.
pub fn report_error_and_exit(error: BinError) -> ! {
    tracing::error!(error = %error, "fatal");
    eprintln!("Error: {error}");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = BinError::invalid_argument("invalid slave id \"0\"");
        assert!(error.to_string().contains("invalid slave id"));

        let error = BinError::runtime("no cards updated");
        assert_eq!(error.to_string(), "no cards updated");
    }
}
