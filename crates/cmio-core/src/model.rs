// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Known expansion-card models.
//!
//! The bus carries five card models, distinguished purely by their channel
//! counts. The table is closed: auto-detected counts that match no entry
//! mean the device is not a supported card and registration is refused.

use serde::Serialize;

/// Immutable channel-count record for one card model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    /// Model name as reported to clients.
    pub name: &'static str,
    /// Digital input channels.
    #[serde(rename = "di")]
    pub digital_in: usize,
    /// Digital output channels.
    #[serde(rename = "do")]
    pub digital_out: usize,
    /// Analog input channels.
    #[serde(rename = "ai")]
    pub analog_in: usize,
    /// Analog output channels.
    #[serde(rename = "ao")]
    pub analog_out: usize,
}

/// The closed table of supported card models.
pub const MODEL_TABLE: [ModelSpec; 5] = [
    ModelSpec { name: "IO4040", digital_in: 4, digital_out: 4, analog_in: 0, analog_out: 0 },
    ModelSpec { name: "IO0440", digital_in: 0, digital_out: 4, analog_in: 4, analog_out: 0 },
    ModelSpec { name: "IO0080", digital_in: 0, digital_out: 8, analog_in: 0, analog_out: 0 },
    ModelSpec { name: "IO8000", digital_in: 8, digital_out: 0, analog_in: 0, analog_out: 0 },
    ModelSpec { name: "IO0404", digital_in: 0, digital_out: 0, analog_in: 4, analog_out: 4 },
];

/// Looks up a model by name.
pub fn spec_for(name: &str) -> Option<&'static ModelSpec> {
    MODEL_TABLE.iter().find(|spec| spec.name == name)
}

/// Maps probed channel counts to a model.
///
/// Returns `None` when the counts match no known card ("Unknown", which is
/// non-registrable).
pub fn match_counts(
    digital_in: usize,
    digital_out: usize,
    analog_in: usize,
    analog_out: usize,
) -> Option<&'static ModelSpec> {
    MODEL_TABLE.iter().find(|spec| {
        spec.digital_in == digital_in
            && spec.digital_out == digital_out
            && spec.analog_in == analog_in
            && spec.analog_out == analog_out
    })
}
