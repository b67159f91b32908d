// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `update-baud` command.
//!
//! One-off bootstrap flow for cards still at the factory default baud:
//! open the port at the current rate, then per candidate slave read the
//! baud register as a presence probe, write the target rate (two registers,
//! 32-bit big-endian), and send the reboot command so the device applies
//! it. "Reboot ACKed" counts as success; there is no confirmation at the
//! new rate.

use std::time::Duration;

use tracing::{info, warn};

use cmio_core::io::{self, BAUD_REGISTER, BAUD_REGISTER_COUNT};
use cmio_modbus::{PortSession, SerialSettings, SerialTransport};

use crate::cli::UpdateBaudArgs;
use crate::error::{BinError, BinResult};

/// Per-request deadline for the bootstrap flow. Longer than the daemon's
/// because devices straight out of reset answer slowly.
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_millis(500);

/// Inter-frame gap used by the bootstrap flow.
const BOOTSTRAP_DELAY: Duration = Duration::from_millis(5);

/// Writes the target baud to every responding slave and reboots it.
///
/// Fails (exit code 1) when no card was updated.
pub async fn update_baud(args: &UpdateBaudArgs) -> BinResult<()> {
    let slaves = parse_slaves(&args.slaves)?;
    if args.baud == 0 {
        return Err(BinError::invalid_argument("baud must be positive"));
    }

    let settings = SerialSettings::default().with_baud_rate(args.current);
    let transport = SerialTransport::open(&args.port, &settings)?;
    let session = PortSession::new(
        &args.port,
        Box::new(transport),
        BOOTSTRAP_TIMEOUT,
        BOOTSTRAP_DELAY,
    );

    let mut updated = 0usize;
    for slave in slaves {
        // Presence probe: the baud register is a safe read.
        if let Err(e) = session
            .read_holding_registers(slave, BAUD_REGISTER, BAUD_REGISTER_COUNT)
            .await
        {
            info!(slave, error = %e, "slave not found or no response");
            continue;
        }

        if let Err(e) = io::write_baud_rate(&session, slave, args.baud).await {
            warn!(slave, error = %e, "write baud failed");
            continue;
        }

        match io::reboot(&session, slave).await {
            Ok(()) => {
                info!(slave, baud = args.baud, "baud set and reboot sent");
                updated += 1;
            }
            Err(e) => warn!(slave, error = %e, "reboot failed"),
        }
    }

    if updated == 0 {
        return Err(BinError::runtime(format!(
            "no cards updated (check port, current baud {}, and slave IDs)",
            args.current
        )));
    }

    println!(
        "Done. Updated {updated} card(s) to {} baud; they will use it after reboot.",
        args.baud
    );
    Ok(())
}

/// Parses a comma-separated slave id list; each id must be in 1..=255.
fn parse_slaves(input: &str) -> BinResult<Vec<u8>> {
    let mut slaves = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let slave: u8 = part
            .parse()
            .ok()
            .filter(|&n| n >= 1)
            .ok_or_else(|| BinError::invalid_argument(format!("invalid slave id {part:?}")))?;
        slaves.push(slave);
    }
    if slaves.is_empty() {
        return Err(BinError::invalid_argument("no slave IDs"));
    }
    Ok(slaves)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slaves() {
        assert_eq!(parse_slaves("1,2,3,4,5").unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(parse_slaves(" 7 , 9 ").unwrap(), vec![7, 9]);
        assert_eq!(parse_slaves("1,,2").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_parse_slaves_rejects_invalid() {
        assert!(parse_slaves("0").is_err());
        assert!(parse_slaves("256").is_err());
        assert!(parse_slaves("abc").is_err());
        assert!(parse_slaves("").is_err());
        assert!(parse_slaves(",").is_err());
    }
}
