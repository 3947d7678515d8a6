#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Weighbridge core logic (hardware-agnostic).
//!
//! This crate pairs truck weighings into waybills without touching hardware.
//! Telemetry arrives through `weighbridge_traits::WeightSource`; captures go
//! through the `PlateCamera`/`PhotoCamera` seams; persistence through
//! `RecordStore`.
//!
//! ## Architecture
//!
//! - **Stability**: Debounced on/off-scale state machine (`monitor` module)
//! - **Matching**: Entry/exit pairing into waybills (`matching` module)
//! - **Offset**: Plan-vs-actual deviation arithmetic (`offset` module)
//! - **Store**: Transactional record/waybill persistence seam (`store` module)
//!
//! ## Fixed-Point Arithmetic
//!
//! Weights are **centi-units** (two implied decimals) in `i64`; quantities
//! and rates carry four implied decimals at scale 10^4. Divisions round half
//! away from zero via `units::div_round_away`.

pub mod error;
pub mod hw_error;
pub mod matching;
pub mod mocks;
pub mod model;
pub mod monitor;
pub mod offset;
pub mod store;
pub mod units;

pub use error::{CoreError, Result};
pub use matching::{MatchCfg, MatchWorker, MatchingEngine};
pub use model::{DeliveryType, MatchedType, Waybill, WeighingRecord};
pub use monitor::{
    BandCfg, CaptureCfg, MonitorCfg, MonitorCore, ScaleStatus, StabilityCfg, StabilityMonitor,
    StepEvent,
};
pub use offset::{OffsetCalculation, OffsetLimits, OffsetResult};
pub use store::{MemoryStore, RecordStore, StoreError, StoreResult, StoreTxn};
