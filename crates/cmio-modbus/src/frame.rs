// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU frame codec.
//!
//! Encodes requests into RTU application data units (slave id + PDU + CRC)
//! and decodes replies back, verifying the CRC trailer and the slave id /
//! function code echo against the originating request. Also hosts the data
//! packing helpers shared by higher layers: LSB-first bit packing for
//! coil/discrete payloads and big-endian register packing for 32-bit and
//! float values spanning two registers.

use std::fmt;

use crc::{Crc, CRC_16_MODBUS};
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, ModbusError, ModbusResult};

/// Modbus slave/unit identifier.
pub type SlaveId = u8;

/// Maximum number of coils in a single read/write request.
pub const MAX_COILS_PER_REQUEST: u16 = 2000;

/// Maximum number of registers in a single read/write request.
pub const MAX_REGISTERS_PER_REQUEST: u16 = 125;

/// Maximum Modbus RTU frame size.
pub const MAX_FRAME_SIZE: usize = 256;

/// CRC calculator for RTU frames (poly 0xA001 reflected, init 0xFFFF).
const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

// =============================================================================
// Function Codes
// =============================================================================

/// The Modbus function codes used on the expansion-card bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FunctionCode {
    /// Read Coils (0x01)
    ReadCoils = 0x01,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = 0x02,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = 0x03,
    /// Read Input Registers (0x04)
    ReadInputRegisters = 0x04,
    /// Write Single Coil (0x05)
    WriteSingleCoil = 0x05,
    /// Write Single Register (0x06)
    WriteSingleRegister = 0x06,
    /// Write Multiple Coils (0x0F)
    WriteMultipleCoils = 0x0F,
    /// Write Multiple Registers (0x10)
    WriteMultipleRegisters = 0x10,
}

impl FunctionCode {
    /// Converts a raw function byte.
    pub fn from_u8(value: u8) -> ModbusResult<Self> {
        match value {
            0x01 => Ok(Self::ReadCoils),
            0x02 => Ok(Self::ReadDiscreteInputs),
            0x03 => Ok(Self::ReadHoldingRegisters),
            0x04 => Ok(Self::ReadInputRegisters),
            0x05 => Ok(Self::WriteSingleCoil),
            0x06 => Ok(Self::WriteSingleRegister),
            0x0F => Ok(Self::WriteMultipleCoils),
            0x10 => Ok(Self::WriteMultipleRegisters),
            other => Err(FrameError::malformed(format!(
                "unsupported function code 0x{other:02X}"
            ))
            .into()),
        }
    }

    /// Returns the raw function byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` for the four read functions.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Self::ReadCoils
                | Self::ReadDiscreteInputs
                | Self::ReadHoldingRegisters
                | Self::ReadInputRegisters
        )
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::WriteMultipleCoils => "Write Multiple Coils",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        };
        write!(f, "{} (0x{:02X})", name, self.as_u8())
    }
}

// =============================================================================
// Exception Codes
// =============================================================================

/// Modbus exception codes carried by replies with the function high bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    /// 0x01 - the function is not supported by the device.
    IllegalFunction,
    /// 0x02 - the data address is outside the device's map.
    IllegalDataAddress,
    /// 0x03 - a value in the request is not acceptable.
    IllegalDataValue,
    /// 0x04 - the device failed while performing the action.
    ServerDeviceFailure,
    /// 0x06 - the device is busy with a long-running command.
    ServerDeviceBusy,
    /// Any other code, kept verbatim.
    Other(u8),
}

impl ExceptionCode {
    /// Converts a raw exception byte.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            0x06 => Self::ServerDeviceBusy,
            other => Self::Other(other),
        }
    }

    /// Returns the raw exception byte.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::ServerDeviceFailure => 0x04,
            Self::ServerDeviceBusy => 0x06,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::IllegalFunction => "illegal function",
            Self::IllegalDataAddress => "illegal data address",
            Self::IllegalDataValue => "illegal data value",
            Self::ServerDeviceFailure => "server device failure",
            Self::ServerDeviceBusy => "server device busy",
            Self::Other(code) => return write!(f, "exception 0x{code:02X}"),
        };
        write!(f, "{} (0x{:02X})", text, self.as_u8())
    }
}

// =============================================================================
// Request / Response
// =============================================================================

/// A Modbus request PDU plus the slave it addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Addressed slave.
    pub slave: SlaveId,
    /// Function code.
    pub function: FunctionCode,
    /// Starting address (0-based).
    pub address: u16,
    /// Quantity of coils/registers the request covers.
    pub quantity: u16,
    /// Payload for write requests, empty for reads.
    pub data: Vec<u8>,
}

impl Request {
    /// Builds a read request for the given function.
    pub fn read(slave: SlaveId, function: FunctionCode, address: u16, quantity: u16) -> Self {
        Self {
            slave,
            function,
            address,
            quantity,
            data: Vec::new(),
        }
    }

    /// Builds a Write Single Coil request.
    pub fn write_single_coil(slave: SlaveId, address: u16, state: bool) -> Self {
        Self {
            slave,
            function: FunctionCode::WriteSingleCoil,
            address,
            quantity: 1,
            data: vec![u8::from(state)],
        }
    }

    /// Builds a Write Single Register request.
    pub fn write_single_register(slave: SlaveId, address: u16, value: u16) -> Self {
        Self {
            slave,
            function: FunctionCode::WriteSingleRegister,
            address,
            quantity: 1,
            data: value.to_be_bytes().to_vec(),
        }
    }

    /// Builds a Write Multiple Coils request from a bit vector.
    pub fn write_multiple_coils(slave: SlaveId, address: u16, states: &[bool]) -> Self {
        Self {
            slave,
            function: FunctionCode::WriteMultipleCoils,
            address,
            quantity: states.len() as u16,
            data: pack_bits(states),
        }
    }

    /// Builds a Write Multiple Registers request from register values.
    pub fn write_multiple_registers(slave: SlaveId, address: u16, values: &[u16]) -> Self {
        Self {
            slave,
            function: FunctionCode::WriteMultipleRegisters,
            address,
            quantity: values.len() as u16,
            data: registers_to_bytes(values),
        }
    }

    /// Validates the request before it touches the bus.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.slave == 0 {
            return Err(ModbusError::request("slave id must not be 0 (broadcast)"));
        }
        if self.quantity == 0 {
            return Err(ModbusError::request("quantity must not be zero"));
        }
        match self.function {
            FunctionCode::ReadCoils
            | FunctionCode::ReadDiscreteInputs
            | FunctionCode::WriteMultipleCoils => {
                if self.quantity > MAX_COILS_PER_REQUEST {
                    return Err(ModbusError::request(format!(
                        "too many coils: {}",
                        self.quantity
                    )));
                }
            }
            FunctionCode::ReadHoldingRegisters
            | FunctionCode::ReadInputRegisters
            | FunctionCode::WriteMultipleRegisters => {
                if self.quantity > MAX_REGISTERS_PER_REQUEST {
                    return Err(ModbusError::request(format!(
                        "too many registers: {}",
                        self.quantity
                    )));
                }
            }
            FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => {}
        }
        Ok(())
    }
}

/// A decoded Modbus reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The slave that answered.
    pub slave: SlaveId,
    /// Echoed function code.
    pub function: FunctionCode,
    /// PDU payload (byte count + data for reads, address echo for writes).
    pub data: Vec<u8>,
}

impl Response {
    /// Parses the payload as a coil/discrete bit vector of `count` bits.
    pub fn parse_bits(&self, count: usize) -> ModbusResult<Vec<bool>> {
        let byte_count = *self
            .data
            .first()
            .ok_or_else(|| FrameError::malformed("empty bit payload"))?
            as usize;
        if self.data.len() < 1 + byte_count {
            return Err(FrameError::malformed("incomplete bit payload").into());
        }
        Ok(unpack_bits(&self.data[1..1 + byte_count], count))
    }

    /// Parses the payload as big-endian 16-bit registers.
    pub fn parse_registers(&self) -> ModbusResult<Vec<u16>> {
        let byte_count = *self
            .data
            .first()
            .ok_or_else(|| FrameError::malformed("empty register payload"))?
            as usize;
        if self.data.len() < 1 + byte_count || byte_count % 2 != 0 {
            return Err(FrameError::malformed("incomplete register payload").into());
        }
        bytes_to_registers(&self.data[1..1 + byte_count])
    }
}

// =============================================================================
// ADU Encoding
// =============================================================================

/// Computes the CRC-16/Modbus checksum of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    CRC_MODBUS.checksum(data)
}

/// Encodes a request into a complete RTU frame (slave + PDU + CRC).
pub fn encode_frame(request: &Request) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8 + request.data.len());
    frame.push(request.slave);
    frame.push(request.function.as_u8());
    frame.extend_from_slice(&request.address.to_be_bytes());

    match request.function {
        FunctionCode::ReadCoils
        | FunctionCode::ReadDiscreteInputs
        | FunctionCode::ReadHoldingRegisters
        | FunctionCode::ReadInputRegisters => {
            frame.extend_from_slice(&request.quantity.to_be_bytes());
        }
        FunctionCode::WriteSingleCoil => {
            let value: u16 = if request.data.first().is_some_and(|&b| b != 0) {
                0xFF00
            } else {
                0x0000
            };
            frame.extend_from_slice(&value.to_be_bytes());
        }
        FunctionCode::WriteSingleRegister => {
            frame.extend_from_slice(request.data.get(0..2).unwrap_or(&[0, 0]));
        }
        FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters => {
            frame.extend_from_slice(&request.quantity.to_be_bytes());
            frame.push(request.data.len() as u8);
            frame.extend_from_slice(&request.data);
        }
    }

    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Returns the total ADU length once enough header bytes are present.
///
/// `None` means more bytes are needed before the length is known. Used by
/// the serial reader to decide when a reply frame is complete.
pub fn expected_frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < 2 {
        return None;
    }
    let function = buf[1];
    if function & 0x80 != 0 {
        // slave + fc + exception code + crc
        return Some(5);
    }
    match function {
        // Read replies: slave + fc + byte count + data + crc
        0x01..=0x04 => buf.get(2).map(|&byte_count| 3 + byte_count as usize + 2),
        // Write replies echo address + value/quantity: fixed 8 bytes
        0x05 | 0x06 | 0x0F | 0x10 => Some(8),
        // Unknown function: treat what we have plus CRC as the frame and let
        // decode_frame reject it.
        _ => Some(buf.len().max(3) + 2),
    }
}

/// Decodes and verifies a reply frame against the request that produced it.
///
/// Checks, in order: minimum length, CRC trailer, slave id echo, exception
/// flag, function code echo. Any mismatch is a transport error; exceptions
/// carry the device's exception code.
pub fn decode_frame(frame: &[u8], request: &Request) -> ModbusResult<Response> {
    if frame.len() < 5 {
        return Err(FrameError::TooShort { len: frame.len() }.into());
    }

    let body = &frame[..frame.len() - 2];
    let received = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
    let computed = crc16(body);
    if computed != received {
        return Err(FrameError::CrcMismatch { computed, received }.into());
    }

    let slave = frame[0];
    if slave != request.slave {
        return Err(FrameError::SlaveMismatch {
            expected: request.slave,
            actual: slave,
        }
        .into());
    }

    let function = frame[1];
    if function & 0x80 != 0 {
        if function & 0x7F != request.function.as_u8() {
            return Err(FrameError::FunctionMismatch {
                expected: request.function.as_u8(),
                actual: function,
            }
            .into());
        }
        return Err(ModbusError::exception(request.function.as_u8(), frame[2]));
    }
    if function != request.function.as_u8() {
        return Err(FrameError::FunctionMismatch {
            expected: request.function.as_u8(),
            actual: function,
        }
        .into());
    }

    Ok(Response {
        slave,
        function: request.function,
        data: body[2..].to_vec(),
    })
}

// =============================================================================
// Data Packing
// =============================================================================

/// Packs booleans into coil bytes, LSB-first within each byte, zero-padded.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Unpacks coil bytes into `count` booleans, LSB-first within each byte.
///
/// Missing trailing bytes read as `false`.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| {
            bytes
                .get(i / 8)
                .is_some_and(|&byte| byte & (1 << (i % 8)) != 0)
        })
        .collect()
}

/// Converts registers to big-endian bytes.
pub fn registers_to_bytes(registers: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(registers.len() * 2);
    for &register in registers {
        bytes.extend_from_slice(&register.to_be_bytes());
    }
    bytes
}

/// Converts big-endian bytes to registers.
pub fn bytes_to_registers(bytes: &[u8]) -> ModbusResult<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return Err(FrameError::malformed("odd register byte count").into());
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
        .collect())
}

/// Splits a u32 into two registers, high word first.
pub fn u32_to_registers(value: u32) -> [u16; 2] {
    [(value >> 16) as u16, value as u16]
}

/// Joins two registers into a u32, high word first.
pub fn registers_to_u32(registers: &[u16]) -> ModbusResult<u32> {
    if registers.len() < 2 {
        return Err(FrameError::malformed("need 2 registers for u32").into());
    }
    Ok((u32::from(registers[0]) << 16) | u32::from(registers[1]))
}

/// Splits an f32 into two registers (IEEE 754, big-endian over 4 bytes).
pub fn f32_to_registers(value: f32) -> [u16; 2] {
    u32_to_registers(value.to_bits())
}

/// Joins two registers into an f32 (IEEE 754, big-endian over 4 bytes).
pub fn registers_to_f32(registers: &[u16]) -> ModbusResult<f32> {
    Ok(f32::from_bits(registers_to_u32(registers)?))
}

// =============================================================================
// Tests
// =============================================================================
