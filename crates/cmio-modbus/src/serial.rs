// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Serial-backed Modbus RTU transport.
//!
//! Owns one `tokio-serial` stream and performs the request/reply exchange:
//! encode, drain stale input, write, then read incrementally until the frame
//! codec can tell the reply is complete. The whole exchange runs under the
//! caller's hard deadline; a partial reply at expiry is discarded.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

use crate::error::{ConnectionError, ModbusError, ModbusResult};
use crate::frame::{
    decode_frame, encode_frame, expected_frame_len, Request, Response, MAX_FRAME_SIZE,
};
use crate::transport::{DataBits, Parity, SerialSettings, StopBits, Transport};

// =============================================================================
// SerialTransport
// =============================================================================

/// Modbus RTU transport over a serial port.
pub struct SerialTransport {
    path: String,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Opens the serial port at `path` with the given line settings.
    pub fn open(path: &str, settings: &SerialSettings) -> ModbusResult<Self> {
        let stream = tokio_serial::new(path, settings.baud_rate)
            .data_bits(convert_data_bits(settings.data_bits))
            .parity(convert_parity(settings.parity))
            .stop_bits(convert_stop_bits(settings.stop_bits))
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| ConnectionError::open(path, e))?;

        tracing::debug!(port = %path, settings = %settings, "opened serial port");

        Ok(Self {
            path: path.to_string(),
            stream: Some(stream),
        })
    }

    /// Returns the port path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads one complete reply frame, growing the buffer until the codec
    /// knows the expected length and it has been reached.
    async fn read_frame(stream: &mut SerialStream) -> ModbusResult<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(MAX_FRAME_SIZE);
        let mut chunk = [0u8; MAX_FRAME_SIZE];

        loop {
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(ConnectionError::Io)?;
            if n == 0 {
                return Err(ConnectionError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "serial stream closed",
                ))
                .into());
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(expected) = expected_frame_len(&buf) {
                if buf.len() >= expected {
                    return Ok(buf[..expected].to_vec());
                }
            }
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn transact(
        &mut self,
        request: &Request,
        timeout: Duration,
    ) -> ModbusResult<Response> {
        request.validate()?;

        let stream = self
            .stream
            .as_mut()
            .ok_or(ConnectionError::NotConnected)?;

        // Drop bytes left over from a previous timed-out exchange so they
        // cannot be mistaken for this reply.
        let _ = stream.clear(tokio_serial::ClearBuffer::Input);

        let frame = encode_frame(request);

        let exchange = async {
            stream
                .write_all(&frame)
                .await
                .map_err(ConnectionError::Io)?;
            stream.flush().await.map_err(ConnectionError::Io)?;
            Self::read_frame(stream).await
        };

        let reply = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ModbusError::timeout("modbus transaction", timeout))??;

        decode_frame(&reply, request)
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if self.stream.take().is_some() {
            tracing::debug!(port = %self.path, "closed serial port");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("connected", &self.is_connected())
            .finish()
    }
}

// =============================================================================
// Setting conversions
// =============================================================================

fn convert_data_bits(bits: DataBits) -> tokio_serial::DataBits {
    match bits {
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

fn convert_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

fn convert_stop_bits(bits: StopBits) -> tokio_serial::StopBits {
    match bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
    }
}

// =============================================================================
// Tests
// =============================================================================
