// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Card identity and cached state.
//!
//! A [`Card`] is one physical expansion module on the bus; its [`CardState`]
//! is overwritten by each read cycle and serialized verbatim onto the REST
//! and TCP push surfaces, so the JSON field names here are the wire format.
//! Analog values are raw device units (millivolts×1000 or milliamps×1000
//! depending on the channel's [`AoMode`]); normalization is a display
//! concern.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{spec_for, ModelSpec};

// =============================================================================
// AoMode
// =============================================================================

/// Electrical mode of one analog output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AoMode {
    /// 0–10 V voltage output (mode register 0x0001).
    Voltage0To10V,
    /// 4–20 mA current loop (mode register 0x0004).
    Current4To20Ma,
    /// Any other register value, kept verbatim.
    Raw(u16),
}

impl AoMode {
    /// Decodes the AO-type register value.
    pub fn from_register(value: u16) -> Self {
        match value {
            0x0001 => Self::Voltage0To10V,
            0x0004 => Self::Current4To20Ma,
            other => Self::Raw(other),
        }
    }

    /// Encodes the AO-type register value.
    pub fn to_register(self) -> u16 {
        match self {
            Self::Voltage0To10V => 0x0001,
            Self::Current4To20Ma => 0x0004,
            Self::Raw(value) => value,
        }
    }

    /// Returns `true` for 4–20 mA current-loop channels.
    pub fn is_current_loop(self) -> bool {
        matches!(self, Self::Current4To20Ma)
    }
}

impl fmt::Display for AoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voltage0To10V => write!(f, "0-10V"),
            Self::Current4To20Ma => write!(f, "4-20mA"),
            Self::Raw(value) => write!(f, "0x{value:04X}"),
        }
    }
}

/// Error returned for AO mode strings outside the known set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAoModeError(pub String);

impl fmt::Display for ParseAoModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown AO type {:?}", self.0)
    }
}

impl std::error::Error for ParseAoModeError {}

impl FromStr for AoMode {
    type Err = ParseAoModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0-10V" => Ok(Self::Voltage0To10V),
            "4-20mA" => Ok(Self::Current4To20Ma),
            other => {
                if let Some(hex) = other.strip_prefix("0x") {
                    if let Ok(value) = u16::from_str_radix(hex, 16) {
                        return Ok(Self::Raw(value));
                    }
                }
                Err(ParseAoModeError(other.to_string()))
            }
        }
    }
}

impl Serialize for AoMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AoMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// CardState
// =============================================================================

/// Snapshot of one card's channels, refreshed by the cycle scheduler.
///
/// After any successful read the channel vectors have exactly the lengths
/// the card's [`ModelSpec`] prescribes; `ao_type` is either empty (fast
/// read, value preserved by the registry) or `analog_out` long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardState {
    /// Time the snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Digital input states.
    #[serde(rename = "di", default, skip_serializing_if = "Vec::is_empty")]
    pub digital_in: Vec<bool>,

    /// Digital output states.
    #[serde(rename = "do", default, skip_serializing_if = "Vec::is_empty")]
    pub digital_out: Vec<bool>,

    /// Analog input values in raw device units.
    #[serde(rename = "ai", default, skip_serializing_if = "Vec::is_empty")]
    pub analog_in: Vec<f32>,

    /// Analog output values in raw device units.
    #[serde(rename = "ao", default, skip_serializing_if = "Vec::is_empty")]
    pub analog_out: Vec<f32>,

    /// Per-channel analog output modes (full reads only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ao_type: Vec<AoMode>,

    /// Device serial number (full reads only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub serial_number: String,

    /// Configured bus baud rate (full reads only; applied on reboot).
    #[serde(default, skip_serializing_if = "is_zero")]
    pub baud_rate: u32,

    /// Last transport error; cleared by the next successful read.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl CardState {
    /// Returns an empty snapshot stamped now.
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            digital_in: Vec::new(),
            digital_out: Vec::new(),
            analog_in: Vec::new(),
            analog_out: Vec::new(),
            ao_type: Vec::new(),
            serial_number: String::new(),
            baud_rate: 0,
            error: String::new(),
        }
    }
}

impl Default for CardState {
    fn default() -> Self {
        Self::empty()
    }
}

// =============================================================================
// Card
// =============================================================================

/// One registered expansion card.
///
/// `id` is a process-unique stringified integer assigned at registration in
/// monotonic order; it is regenerated on every rediscover, so clients must
/// not persist it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Registry id.
    pub id: String,
    /// Serial port path this card lives on.
    pub port_path: String,
    /// Modbus slave id.
    pub slave_id: u8,
    /// Model name (always a `MODEL_TABLE` entry).
    pub module: String,
    /// Latest state snapshot.
    #[serde(default)]
    pub last: CardState,
}

impl Card {
    /// Returns the model spec for this card.
    pub fn spec(&self) -> Option<&'static ModelSpec> {
        spec_for(&self.module)
    }

    /// Returns the numeric value of the registry id, for stable ordering.
    pub fn numeric_id(&self) -> u64 {
        self.id.parse().unwrap_or(0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ao_mode_register_round_trip() {
        assert_eq!(AoMode::from_register(0x0001), AoMode::Voltage0To10V);
        assert_eq!(AoMode::from_register(0x0004), AoMode::Current4To20Ma);
        assert_eq!(AoMode::from_register(0x0007), AoMode::Raw(0x0007));
        for mode in [AoMode::Voltage0To10V, AoMode::Current4To20Ma, AoMode::Raw(0x00FF)] {
            assert_eq!(AoMode::from_register(mode.to_register()), mode);
        }
    }

    #[test]
    fn test_ao_mode_strings() {
        assert_eq!(AoMode::Voltage0To10V.to_string(), "0-10V");
        assert_eq!(AoMode::Current4To20Ma.to_string(), "4-20mA");
        assert_eq!(AoMode::Raw(0x0007).to_string(), "0x0007");

        assert_eq!("0-10V".parse::<AoMode>().unwrap(), AoMode::Voltage0To10V);
        assert_eq!("4-20mA".parse::<AoMode>().unwrap(), AoMode::Current4To20Ma);
        assert_eq!("0x0007".parse::<AoMode>().unwrap(), AoMode::Raw(7));
        assert!("5V".parse::<AoMode>().is_err());
    }

    #[test]
    fn test_card_state_json_shape() {
        let mut state = CardState::empty();
        state.digital_in = vec![true, false];
        state.analog_out = vec![4000.0];
        state.ao_type = vec![AoMode::Current4To20Ma];
        state.serial_number = "CM12345".to_string();
        state.baud_rate = 9600;

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["di"], serde_json::json!([true, false]));
        assert_eq!(json["ao"], serde_json::json!([4000.0]));
        assert_eq!(json["aoType"], serde_json::json!(["4-20mA"]));
        assert_eq!(json["serialNumber"], "CM12345");
        assert_eq!(json["baudRate"], 9600);
        // Empty collections are omitted, mirroring the previous wire format.
        assert!(json.get("do").is_none());
        assert!(json.get("ai").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_card_json_shape() {
        let card = Card {
            id: "3".to_string(),
            port_path: "/dev/ttyS7".to_string(),
            slave_id: 2,
            module: "IO4040".to_string(),
            last: CardState::empty(),
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["id"], "3");
        assert_eq!(json["portPath"], "/dev/ttyS7");
        assert_eq!(json["slaveId"], 2);
        assert_eq!(json["module"], "IO4040");
        assert_eq!(card.numeric_id(), 3);
    }
}
