// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Scripted bus mocks.
//!
//! [`FakeBus`] stands in for the RS-485 line: it holds [`FakeCard`] register
//! banks keyed by slave id, answers requests the way the real cards do
//! (including exceptions for out-of-range probes and silence for absent
//! slaves), and records every request frame for assertions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use cmio_core::io::{
    AO_MODE_BASE, BAUD_REGISTER, BAUD_REGISTER_COUNT, REBOOT_MAGIC, REBOOT_REGISTER,
    SERIAL_NUMBER_REGISTER, SERIAL_NUMBER_REGISTER_COUNT,
};
use cmio_modbus::frame::{
    f32_to_registers, pack_bits, registers_to_f32, u32_to_registers, unpack_bits,
};
use cmio_modbus::{
    FunctionCode, ModbusError, ModbusResult, Request, Response, Transport, TransportFactory,
};

// =============================================================================
// FakeCard
// =============================================================================

/// In-memory register bank emulating one expansion card.
#[derive(Debug, Clone)]
pub struct FakeCard {
    /// Digital input states.
    pub digital_in: Vec<bool>,
    /// Digital output states.
    pub digital_out: Vec<bool>,
    /// Analog input values (raw device units).
    pub analog_in: Vec<f32>,
    /// Analog output values (raw device units).
    pub analog_out: Vec<f32>,
    /// AO mode registers (0x0001 voltage, 0x0004 current).
    pub ao_modes: Vec<u16>,
    /// Serial number reported from the 0x0070 block.
    pub serial_number: String,
    /// Baud register value.
    pub baud_rate: u32,
    /// Number of reboot commands received.
    pub reboots: usize,
}

impl FakeCard {
    fn new(di: usize, dout: usize, ai: usize, ao: usize) -> Self {
        Self {
            digital_in: vec![false; di],
            digital_out: vec![false; dout],
            analog_in: vec![0.0; ai],
            analog_out: vec![0.0; ao],
            ao_modes: vec![0x0001; ao],
            serial_number: String::new(),
            baud_rate: 9600,
            reboots: 0,
        }
    }

    /// A 4 DI / 4 DO card.
    pub fn io4040() -> Self {
        Self::new(4, 4, 0, 0)
    }

    /// A 4 DO / 4 AI card.
    pub fn io0440() -> Self {
        Self::new(0, 4, 4, 0)
    }

    /// An 8 DO card.
    pub fn io0080() -> Self {
        Self::new(0, 8, 0, 0)
    }

    /// An 8 DI card.
    pub fn io8000() -> Self {
        Self::new(8, 0, 0, 0)
    }

    /// A 4 AI / 4 AO card.
    pub fn io0404() -> Self {
        Self::new(0, 0, 4, 4)
    }

    /// Sets the serial number.
    pub fn with_serial_number(mut self, serial: &str) -> Self {
        self.serial_number = serial.to_string();
        self
    }

    /// Sets the AO mode registers.
    pub fn with_ao_modes(mut self, modes: &[u16]) -> Self {
        self.ao_modes = modes.to_vec();
        self
    }

    /// Answers one request against this card's registers.
    fn respond(&mut self, request: &Request) -> ModbusResult<Response> {
        let address = request.address as usize;
        let quantity = request.quantity as usize;

        match request.function {
            FunctionCode::ReadDiscreteInputs => {
                bit_read(request, &self.digital_in, address, quantity)
            }
            FunctionCode::ReadCoils => bit_read(request, &self.digital_out, address, quantity),
            FunctionCode::ReadInputRegisters => {
                let registers = float_registers(&self.analog_in);
                let slice = register_slice(&registers, address, quantity)
                    .ok_or_else(|| illegal_address(request))?;
                Ok(register_read(request, &slice))
            }
            FunctionCode::ReadHoldingRegisters => {
                let slice = self
                    .holding_registers(address, quantity)
                    .ok_or_else(|| illegal_address(request))?;
                Ok(register_read(request, &slice))
            }
            FunctionCode::WriteSingleCoil => {
                if address >= self.digital_out.len() {
                    return Err(illegal_address(request));
                }
                self.digital_out[address] = request.data.first().is_some_and(|&b| b != 0);
                Ok(write_echo(request))
            }
            FunctionCode::WriteSingleRegister => {
                let value = u16::from_be_bytes([
                    request.data.first().copied().unwrap_or(0),
                    request.data.get(1).copied().unwrap_or(0),
                ]);
                if address == REBOOT_REGISTER as usize && value == REBOOT_MAGIC {
                    self.reboots += 1;
                    return Ok(write_echo(request));
                }
                let mode_base = AO_MODE_BASE as usize;
                if address >= mode_base && address < mode_base + self.ao_modes.len() {
                    self.ao_modes[address - mode_base] = value;
                    return Ok(write_echo(request));
                }
                Err(illegal_address(request))
            }
            FunctionCode::WriteMultipleCoils => {
                if address + quantity > self.digital_out.len() {
                    return Err(illegal_address(request));
                }
                let bits = unpack_bits(&request.data, quantity);
                self.digital_out[address..address + quantity].copy_from_slice(&bits);
                Ok(write_echo(request))
            }
            FunctionCode::WriteMultipleRegisters => {
                if address == BAUD_REGISTER as usize && quantity == BAUD_REGISTER_COUNT as usize
                {
                    let registers = bytes_to_register_vec(&request.data);
                    self.baud_rate =
                        (u32::from(registers[0]) << 16) | u32::from(registers[1]);
                    return Ok(write_echo(request));
                }
                // Analog output region: two registers per channel.
                if address % 2 == 0
                    && quantity % 2 == 0
                    && address + quantity <= self.analog_out.len() * 2
                {
                    let registers = bytes_to_register_vec(&request.data);
                    for (i, pair) in registers.chunks_exact(2).enumerate() {
                        let channel = address / 2 + i;
                        self.analog_out[channel] =
                            registers_to_f32(pair).unwrap_or(0.0);
                    }
                    return Ok(write_echo(request));
                }
                Err(illegal_address(request))
            }
        }
    }

    /// Resolves a holding-register read against the card's address map.
    fn holding_registers(&self, address: usize, quantity: usize) -> Option<Vec<u16>> {
        let ao_len = self.analog_out.len() * 2;
        if ao_len > 0 && address + quantity <= ao_len {
            let registers = float_registers(&self.analog_out);
            return register_slice(&registers, address, quantity);
        }

        let baud_base = BAUD_REGISTER as usize;
        if address >= baud_base && address + quantity <= baud_base + BAUD_REGISTER_COUNT as usize
        {
            let registers = u32_to_registers(self.baud_rate);
            return register_slice(&registers, address - baud_base, quantity);
        }

        let serial_base = SERIAL_NUMBER_REGISTER as usize;
        if address >= serial_base
            && address + quantity <= serial_base + SERIAL_NUMBER_REGISTER_COUNT as usize
        {
            let mut bytes = self.serial_number.as_bytes().to_vec();
            bytes.resize(SERIAL_NUMBER_REGISTER_COUNT as usize * 2, 0);
            let registers: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            return register_slice(&registers, address - serial_base, quantity);
        }

        let mode_base = AO_MODE_BASE as usize;
        if address >= mode_base && address + quantity <= mode_base + self.ao_modes.len() {
            return register_slice(&self.ao_modes, address - mode_base, quantity);
        }

        None
    }
}

fn float_registers(values: &[f32]) -> Vec<u16> {
    let mut registers = Vec::with_capacity(values.len() * 2);
    for &value in values {
        registers.extend_from_slice(&f32_to_registers(value));
    }
    registers
}

fn register_slice(registers: &[u16], offset: usize, quantity: usize) -> Option<Vec<u16>> {
    registers.get(offset..offset + quantity).map(<[u16]>::to_vec)
}

fn bytes_to_register_vec(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

fn bit_read(
    request: &Request,
    bits: &[bool],
    address: usize,
    quantity: usize,
) -> ModbusResult<Response> {
    let slice = bits
        .get(address..address + quantity)
        .ok_or_else(|| illegal_address(request))?;
    let packed = pack_bits(slice);
    let mut data = vec![packed.len() as u8];
    data.extend_from_slice(&packed);
    Ok(Response {
        slave: request.slave,
        function: request.function,
        data,
    })
}

fn register_read(request: &Request, registers: &[u16]) -> Response {
    let mut data = vec![(registers.len() * 2) as u8];
    for &register in registers {
        data.extend_from_slice(&register.to_be_bytes());
    }
    Response {
        slave: request.slave,
        function: request.function,
        data,
    }
}

fn write_echo(request: &Request) -> Response {
    let mut data = request.address.to_be_bytes().to_vec();
    data.extend_from_slice(&request.quantity.to_be_bytes());
    Response {
        slave: request.slave,
        function: request.function,
        data,
    }
}

fn illegal_address(request: &Request) -> ModbusError {
    ModbusError::exception(request.function.as_u8(), 0x02)
}

// =============================================================================
// FakeBus
// =============================================================================

struct FakeBusInner {
    cards: HashMap<u8, FakeCard>,
    log: Vec<Request>,
}

/// The scripted bus shared by every transport the factory hands out.
#[derive(Clone)]
pub struct FakeBus {
    inner: Arc<Mutex<FakeBusInner>>,
}

impl FakeBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeBusInner {
                cards: HashMap::new(),
                log: Vec::new(),
            })),
        }
    }

    /// Adds a card at a slave id (builder form).
    pub fn with_card(self, slave: u8, card: FakeCard) -> Self {
        self.inner.lock().cards.insert(slave, card);
        self
    }

    /// Returns a copy of a card's current register bank.
    pub fn card(&self, slave: u8) -> Option<FakeCard> {
        self.inner.lock().cards.get(&slave).cloned()
    }

    /// Mutates a card's register bank in place.
    pub fn with_card_mut(&self, slave: u8, mutate: impl FnOnce(&mut FakeCard)) {
        if let Some(card) = self.inner.lock().cards.get_mut(&slave) {
            mutate(card);
        }
    }

    /// Returns every request seen so far.
    pub fn requests(&self) -> Vec<Request> {
        self.inner.lock().log.clone()
    }

    /// Returns the requests for one function code.
    pub fn requests_for(&self, function: FunctionCode) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|request| request.function == function)
            .collect()
    }

    /// Clears the request log.
    pub fn clear_requests(&self) {
        self.inner.lock().log.clear();
    }

    /// Returns a transport factory handing out views onto this bus.
    pub fn transport_factory(&self) -> TransportFactory {
        let bus = self.clone();
        Arc::new(move |_path, _settings| {
            Ok(Box::new(FakeTransport { bus: bus.clone() }) as Box<dyn Transport>)
        })
    }
}

impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

struct FakeTransport {
    bus: FakeBus,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn transact(
        &mut self,
        request: &Request,
        timeout: Duration,
    ) -> ModbusResult<Response> {
        let mut inner = self.bus.inner.lock();
        inner.log.push(request.clone());
        match inner.cards.get_mut(&request.slave) {
            Some(card) => card.respond(request),
            // Absent slaves are silent; the caller sees a timeout.
            None => Err(ModbusError::timeout("modbus transaction", timeout)),
        }
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn close(&mut self) -> ModbusResult<()> {
        Ok(())
    }
}
