#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the weighbridge system.
//!
//! `Config` and sub-structs are deserialized from TOML and validated. Weight
//! fields are plain unit values (e.g. `0.5` for half a unit); the consumer
//! quantizes them to fixed-point at the boundary.

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    #[default]
    BcdFramed,
    ReversedText,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SerialCfg {
    pub port: String,
    pub baud: u32,
    pub protocol: ProtocolKind,
    /// Total frame length in bytes for the BCD protocol, markers included.
    pub frame_len: usize,
    /// Payload delimiter for the reversed-text protocol, one ASCII byte.
    pub delimiter: String,
    pub read_timeout_ms: u64,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud: 9_600,
            protocol: ProtocolKind::BcdFramed,
            frame_len: 5,
            delimiter: "=".into(),
            read_timeout_ms: 200,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScaleCfg {
    /// Readings inside [empty_min, empty_max] mean the scale is empty.
    pub empty_min: f64,
    pub empty_max: f64,
}

impl Default for ScaleCfg {
    fn default() -> Self {
        Self {
            empty_min: -0.5,
            empty_max: 0.5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StabilityCfgToml {
    /// Max deviation from the reference reading that still counts as stable.
    pub tolerance: f64,
    pub stable_duration_ms: u64,
    pub tick_ms: u64,
}

impl Default for StabilityCfgToml {
    fn default() -> Self {
        Self {
            tolerance: 1.0,
            stable_duration_ms: 3_000,
            tick_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    Sending,
    #[default]
    Receiving,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MatchingCfgToml {
    pub match_window_hours: i64,
    pub require_plate_match: bool,
    pub delivery_type: DeliveryKind,
    pub sending_prefix: String,
    pub receiving_prefix: String,
}

impl Default for MatchingCfgToml {
    fn default() -> Self {
        Self {
            match_window_hours: 12,
            require_plate_match: true,
            delivery_type: DeliveryKind::Receiving,
            sending_prefix: "fl".into(),
            receiving_prefix: "sl".into(),
        }
    }
}

/// Deviation-rate bounds in percent; either bound may be absent.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct OffsetCfgToml {
    pub lower_percent: Option<f64>,
    pub upper_percent: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureCfgToml {
    pub plate_timeout_ms: u64,
    pub photo_timeout_ms: u64,
}

impl Default for CaptureCfgToml {
    fn default() -> Self {
        Self {
            plate_timeout_ms: 2_000,
            photo_timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialCfg,
    pub scale: ScaleCfg,
    pub stability: StabilityCfgToml,
    pub matching: MatchingCfgToml,
    pub offset: OffsetCfgToml,
    pub capture: CaptureCfgToml,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.port.is_empty() {
            eyre::bail!("serial.port must not be empty");
        }
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }
        if self.serial.read_timeout_ms == 0 {
            eyre::bail!("serial.read_timeout_ms must be >= 1");
        }
        match self.serial.protocol {
            ProtocolKind::BcdFramed => {
                // Two marker bytes plus at least one payload byte.
                if self.serial.frame_len < 3 {
                    eyre::bail!("serial.frame_len must be >= 3 for the BCD protocol");
                }
            }
            ProtocolKind::ReversedText => {
                if self.serial.delimiter.len() != 1 || !self.serial.delimiter.is_ascii() {
                    eyre::bail!("serial.delimiter must be a single ASCII byte");
                }
            }
        }

        // Scale band
        if self.scale.empty_min > self.scale.empty_max {
            eyre::bail!("scale.empty_min must be <= scale.empty_max");
        }
        if !self.scale.empty_min.is_finite() || !self.scale.empty_max.is_finite() {
            eyre::bail!("scale band bounds must be finite");
        }

        // Stability
        if self.stability.tolerance < 0.0 || !self.stability.tolerance.is_finite() {
            eyre::bail!("stability.tolerance must be >= 0");
        }
        if self.stability.stable_duration_ms == 0 {
            eyre::bail!("stability.stable_duration_ms must be >= 1");
        }
        if self.stability.stable_duration_ms > 5 * 60 * 1000 {
            eyre::bail!("stability.stable_duration_ms is unreasonably large (>5min)");
        }
        if self.stability.tick_ms == 0 {
            eyre::bail!("stability.tick_ms must be >= 1");
        }
        if self.stability.tick_ms > self.stability.stable_duration_ms {
            eyre::bail!("stability.tick_ms must not exceed stability.stable_duration_ms");
        }

        // Matching
        if self.matching.match_window_hours <= 0 {
            eyre::bail!("matching.match_window_hours must be >= 1");
        }
        if self.matching.match_window_hours > 8_760 {
            eyre::bail!("matching.match_window_hours must be <= 8760 (one year)");
        }
        if self.matching.sending_prefix.is_empty() || self.matching.receiving_prefix.is_empty() {
            eyre::bail!("matching order prefixes must not be empty");
        }

        // Offset bounds
        if let (Some(lo), Some(hi)) = (self.offset.lower_percent, self.offset.upper_percent)
            && lo > hi
        {
            eyre::bail!("offset.lower_percent must be <= offset.upper_percent");
        }

        // Capture
        if self.capture.plate_timeout_ms == 0 || self.capture.photo_timeout_ms == 0 {
            eyre::bail!("capture timeouts must be >= 1 ms");
        }

        Ok(())
    }

    /// The delimiter byte for the reversed-text protocol. Call after
    /// `validate`; defaults to `=` when unset.
    pub fn delimiter_byte(&self) -> u8 {
        self.serial.delimiter.bytes().next().unwrap_or(b'=')
    }
}
