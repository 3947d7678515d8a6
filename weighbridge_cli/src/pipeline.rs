//! Config-to-core mapping and pipeline assembly helpers.
//!
//! The TOML schema carries weights as plain unit values; everything here
//! quantizes them to fixed-point once, at the boundary, so the core never
//! sees floating point.

use std::sync::Mutex;

use weighbridge_config::{Config, DeliveryKind, ProtocolKind};
use weighbridge_core::units;
use weighbridge_core::{
    BandCfg, CaptureCfg, DeliveryType, MatchCfg, MonitorCfg, OffsetLimits, StabilityCfg,
};
use weighbridge_hardware::{LineError, LineFactory, Protocol, ScriptedLine, SerialSettings};
use weighbridge_traits::SerialLine;

pub fn protocol(cfg: &Config) -> Protocol {
    match cfg.serial.protocol {
        ProtocolKind::BcdFramed => Protocol::BcdFramed {
            frame_len: cfg.serial.frame_len,
        },
        ProtocolKind::ReversedText => Protocol::ReversedText {
            delimiter: cfg.delimiter_byte(),
        },
    }
}

pub fn serial_settings(cfg: &Config) -> SerialSettings {
    SerialSettings {
        port: cfg.serial.port.clone(),
        baud: cfg.serial.baud,
        protocol: protocol(cfg),
        read_timeout_ms: cfg.serial.read_timeout_ms,
    }
}

pub fn monitor_cfg(cfg: &Config) -> MonitorCfg {
    MonitorCfg {
        band: BandCfg {
            empty_min_centi: units::quantize_centi(cfg.scale.empty_min),
            empty_max_centi: units::quantize_centi(cfg.scale.empty_max),
        },
        stability: StabilityCfg {
            tolerance_centi: units::quantize_centi(cfg.stability.tolerance),
            stable_duration_ms: cfg.stability.stable_duration_ms,
            tick_ms: cfg.stability.tick_ms,
        },
        capture: CaptureCfg {
            plate_timeout_ms: cfg.capture.plate_timeout_ms,
            photo_timeout_ms: cfg.capture.photo_timeout_ms,
        },
    }
}

pub fn match_cfg(cfg: &Config) -> MatchCfg {
    MatchCfg {
        match_window_hours: cfg.matching.match_window_hours,
        require_plate_match: cfg.matching.require_plate_match,
        sending_prefix: cfg.matching.sending_prefix.clone(),
        receiving_prefix: cfg.matching.receiving_prefix.clone(),
        delivery_type: match cfg.matching.delivery_type {
            DeliveryKind::Sending => DeliveryType::Sending,
            DeliveryKind::Receiving => DeliveryType::Receiving,
        },
    }
}

pub fn offset_limits(cfg: &Config) -> OffsetLimits {
    OffsetLimits {
        lower_e4: cfg.offset.lower_percent.map(units::quantize_e4),
        upper_e4: cfg.offset.upper_percent.map(units::quantize_e4),
    }
}

/// Wraps a scripted line in a one-shot factory for the telemetry reader.
pub fn scripted_factory(line: ScriptedLine) -> LineFactory {
    let slot = Mutex::new(Some(line));
    Box::new(move |settings| {
        slot.lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|l| Box::new(l) as Box<dyn SerialLine + Send>)
            .ok_or_else(|| LineError::Open {
                port: settings.port.clone(),
                reason: "scripted line already consumed".into(),
            })
    })
}
