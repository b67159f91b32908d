// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Card register map and per-card bus I/O.
//!
//! Everything here speaks to one card through a [`PortSession`]; the session
//! enforces the inter-frame gap after every transaction, so these functions
//! never sleep themselves.

use chrono::Utc;
use cmio_modbus::frame::{f32_to_registers, registers_to_f32, registers_to_u32, u32_to_registers};
use cmio_modbus::{FrameError, ModbusResult, PortSession, SlaveId};

use crate::card::{AoMode, CardState};
use crate::model::{match_counts, ModelSpec};

// =============================================================================
// Register map
// =============================================================================

/// Discrete inputs base address.
pub const DI_BASE: u16 = 0x0000;
/// Coil (digital output) base address.
pub const DO_BASE: u16 = 0x0000;
/// Analog input base address (input registers, two per channel).
pub const AI_BASE: u16 = 0x0000;
/// Analog output base address (holding registers, two per channel).
pub const AO_BASE: u16 = 0x0000;
/// AO mode registers: one per channel at `AO_MODE_BASE + channel`.
pub const AO_MODE_BASE: u16 = 0x0190;
/// Reboot register; write [`REBOOT_MAGIC`] to restart the card.
pub const REBOOT_REGISTER: u16 = 0x0010;
/// Magic value for [`REBOOT_REGISTER`].
pub const REBOOT_MAGIC: u16 = 0xFF00;
/// Baud-rate register (32-bit big-endian across two registers).
pub const BAUD_REGISTER: u16 = 0x0020;
/// Number of baud-rate registers.
pub const BAUD_REGISTER_COUNT: u16 = 2;
/// Serial-number register block (20 ASCII bytes, NUL-terminated).
pub const SERIAL_NUMBER_REGISTER: u16 = 0x0070;
/// Number of serial-number registers.
pub const SERIAL_NUMBER_REGISTER_COUNT: u16 = 10;

// =============================================================================
// Probing
// =============================================================================

/// Probes DI/DO/AI/AO channel counts of a candidate slave.
///
/// Probe order and counts are fixed: DI (8, then 4, else 0), DO (8, then 4,
/// else 0), AI (8 input registers = 4 channels, else 0), AO (4 holding
/// registers in the AO-mode region, else 0). Errors mean "not present".
pub async fn probe_counts(
    session: &PortSession,
    slave: SlaveId,
) -> (usize, usize, usize, usize) {
    let digital_in = if session.read_discrete_inputs(slave, DI_BASE, 8).await.is_ok() {
        8
    } else if session.read_discrete_inputs(slave, DI_BASE, 4).await.is_ok() {
        4
    } else {
        0
    };

    let digital_out = if session.read_coils(slave, DO_BASE, 8).await.is_ok() {
        8
    } else if session.read_coils(slave, DO_BASE, 4).await.is_ok() {
        4
    } else {
        0
    };

    // Known modules carry at most 4 AI channels (8 registers).
    let analog_in = if session.read_input_registers(slave, AI_BASE, 8).await.is_ok() {
        4
    } else {
        0
    };

    let analog_out = if session
        .read_holding_registers(slave, AO_MODE_BASE, 4)
        .await
        .is_ok()
    {
        4
    } else {
        0
    };

    (digital_in, digital_out, analog_in, analog_out)
}

/// Probes a slave and maps the counts to a known model.
pub async fn detect_model(
    session: &PortSession,
    slave: SlaveId,
) -> Option<&'static ModelSpec> {
    let (di, dout, ai, ao) = probe_counts(session, slave).await;
    let spec = match_counts(di, dout, ai, ao);
    tracing::debug!(
        slave,
        di,
        dout,
        ai,
        ao,
        module = spec.map(|s| s.name).unwrap_or("Unknown"),
        "probed channel counts"
    );
    spec
}

// =============================================================================
// Reading
// =============================================================================

/// Reads one card's state.
///
/// Performs only the sub-reads implied by the spec's non-zero channel
/// counts, in DI → DO → AI → AO order. A `full` read additionally fetches
/// the AO-mode region, the serial number, and the baud register; those three
/// degrade to empty values on failure instead of aborting. Any channel
/// sub-read failure aborts the whole call with the first error and the
/// partial state is discarded by the caller.
pub async fn read_card(
    session: &PortSession,
    slave: SlaveId,
    spec: &ModelSpec,
    full: bool,
) -> ModbusResult<CardState> {
    let mut state = CardState {
        timestamp: Utc::now(),
        ..CardState::empty()
    };

    if spec.digital_in > 0 {
        state.digital_in = session
            .read_discrete_inputs(slave, DI_BASE, spec.digital_in as u16)
            .await?;
    }

    if spec.digital_out > 0 {
        state.digital_out = session
            .read_coils(slave, DO_BASE, spec.digital_out as u16)
            .await?;
    }

    if spec.analog_in > 0 {
        let registers = session
            .read_input_registers(slave, AI_BASE, (spec.analog_in * 2) as u16)
            .await?;
        state.analog_in = decode_float_channels(&registers, spec.analog_in)?;
    }

    if spec.analog_out > 0 {
        let registers = session
            .read_holding_registers(slave, AO_BASE, (spec.analog_out * 2) as u16)
            .await?;
        state.analog_out = decode_float_channels(&registers, spec.analog_out)?;

        if full {
            if let Ok(modes) = session
                .read_holding_registers(slave, AO_MODE_BASE, spec.analog_out as u16)
                .await
            {
                state.ao_type = modes.into_iter().map(AoMode::from_register).collect();
            }
        }
    }

    if full {
        state.serial_number = read_serial_number(session, slave).await;
        state.baud_rate = read_baud_rate(session, slave).await;
    }

    Ok(state)
}

fn decode_float_channels(registers: &[u16], channels: usize) -> ModbusResult<Vec<f32>> {
    if registers.len() < channels * 2 {
        return Err(FrameError::malformed("short float channel payload").into());
    }
    let mut values = Vec::with_capacity(channels);
    for channel in 0..channels {
        values.push(registers_to_f32(&registers[channel * 2..channel * 2 + 2])?);
    }
    Ok(values)
}

/// Reads the serial number block; empty string when the read fails.
pub async fn read_serial_number(session: &PortSession, slave: SlaveId) -> String {
    let registers = match session
        .read_holding_registers(slave, SERIAL_NUMBER_REGISTER, SERIAL_NUMBER_REGISTER_COUNT)
        .await
    {
        Ok(registers) => registers,
        Err(_) => return String::new(),
    };

    let mut bytes = Vec::with_capacity(registers.len() * 2);
    for register in registers {
        bytes.extend_from_slice(&register.to_be_bytes());
    }
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Reads the configured baud rate; 0 when the read fails.
pub async fn read_baud_rate(session: &PortSession, slave: SlaveId) -> u32 {
    match session
        .read_holding_registers(slave, BAUD_REGISTER, BAUD_REGISTER_COUNT)
        .await
    {
        Ok(registers) => registers_to_u32(&registers).unwrap_or(0),
        Err(_) => 0,
    }
}

// =============================================================================
// Writing
// =============================================================================

/// Writes a contiguous run of digital outputs in one frame.
pub async fn write_digital_outputs(
    session: &PortSession,
    slave: SlaveId,
    start: usize,
    states: &[bool],
) -> ModbusResult<()> {
    session
        .write_multiple_coils(slave, DO_BASE + start as u16, states)
        .await
}

/// Writes a contiguous run of analog outputs in one frame.
///
/// Each channel occupies two registers, so the frame starts at
/// `start_channel * 2` and spans `values.len() * 2` registers.
pub async fn write_analog_outputs(
    session: &PortSession,
    slave: SlaveId,
    start_channel: usize,
    values: &[f32],
) -> ModbusResult<()> {
    let mut registers = Vec::with_capacity(values.len() * 2);
    for &value in values {
        registers.extend_from_slice(&f32_to_registers(value));
    }
    session
        .write_multiple_registers(slave, AO_BASE + (start_channel * 2) as u16, &registers)
        .await
}

/// Writes one channel's AO mode register.
pub async fn write_ao_mode(
    session: &PortSession,
    slave: SlaveId,
    channel: usize,
    mode: AoMode,
) -> ModbusResult<()> {
    session
        .write_single_register(slave, AO_MODE_BASE + channel as u16, mode.to_register())
        .await
}

/// Writes a new baud rate; the device applies it on its next reboot.
pub async fn write_baud_rate(
    session: &PortSession,
    slave: SlaveId,
    baud: u32,
) -> ModbusResult<()> {
    session
        .write_multiple_registers(slave, BAUD_REGISTER, &u32_to_registers(baud))
        .await
}

/// Sends the reboot command. The device drops off the bus and comes back on
/// its own; callers do not wait for it.
pub async fn reboot(session: &PortSession, slave: SlaveId) -> ModbusResult<()> {
    session
        .write_single_register(slave, REBOOT_REGISTER, REBOOT_MAGIC)
        .await
}
