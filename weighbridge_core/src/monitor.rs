//! Debounced vehicle weighing state machine and its tick-driven runtime.
//!
//! `MonitorCore` is the pure state machine (OffScale → OnScale → Weighing),
//! driven by explicit samples and milliseconds so tests are deterministic.
//! `StabilityMonitor` wraps it in a tick thread that polls the shared weight
//! cell, creates weighing records on stability, and fires match triggers.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use uuid::Uuid;
use weighbridge_traits::{
    Clock, MonotonicClock, PhotoCamera, PlateCamera, SystemWallClock, WallClock, WeightSource,
};

use crate::hw_error::map_collaborator_error;
use crate::model::WeighingRecord;
use crate::store::RecordStore;

/// Empty-scale noise band: weights inside `[empty_min, empty_max]` mean
/// nothing is on the scale.
#[derive(Debug, Clone)]
pub struct BandCfg {
    pub empty_min_centi: i64,
    pub empty_max_centi: i64,
}

impl Default for BandCfg {
    fn default() -> Self {
        Self {
            empty_min_centi: -50,
            empty_max_centi: 50,
        }
    }
}

/// Stability detection parameters.
#[derive(Debug, Clone)]
pub struct StabilityCfg {
    /// Max deviation from the anchor reading that still counts as stable.
    pub tolerance_centi: i64,
    /// The weight must hold within tolerance for this long, uninterrupted.
    pub stable_duration_ms: u64,
    /// Tick period of the monitor thread.
    pub tick_ms: u64,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            tolerance_centi: 100,
            stable_duration_ms: 3_000,
            tick_ms: 100,
        }
    }
}

/// Bounded timeouts for the best-effort capture collaborators.
#[derive(Debug, Clone)]
pub struct CaptureCfg {
    pub plate_timeout_ms: u64,
    pub photo_timeout_ms: u64,
}

impl Default for CaptureCfg {
    fn default() -> Self {
        Self {
            plate_timeout_ms: 2_000,
            photo_timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MonitorCfg {
    pub band: BandCfg,
    pub stability: StabilityCfg,
    pub capture: CaptureCfg,
}

/// Public scale state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScaleStatus {
    OffScale = 0,
    OnScale = 1,
    Weighing = 2,
}

impl ScaleStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::OnScale,
            2 => Self::Weighing,
            _ => Self::OffScale,
        }
    }
}

/// Outcome of one state-machine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    None,
    VehicleEntered,
    /// The weight held stable for the full window; create a weighing record.
    StabilityConfirmed { weight_centi: i64 },
    VehicleDeparted,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    OffScale,
    OnScale {
        anchor_centi: i64,
        stable_since_ms: u64,
    },
    /// Record produced; waiting for the weight to re-enter the empty band.
    Weighing,
}

/// Pure on/off-scale state machine. One `step` per weight sample.
#[derive(Debug)]
pub struct MonitorCore {
    band: BandCfg,
    stability: StabilityCfg,
    phase: Phase,
}

impl MonitorCore {
    pub fn new(band: BandCfg, stability: StabilityCfg) -> Self {
        Self {
            band,
            stability,
            phase: Phase::OffScale,
        }
    }

    pub fn status(&self) -> ScaleStatus {
        match self.phase {
            Phase::OffScale => ScaleStatus::OffScale,
            Phase::OnScale { .. } => ScaleStatus::OnScale,
            Phase::Weighing => ScaleStatus::Weighing,
        }
    }

    fn in_empty_band(&self, weight_centi: i64) -> bool {
        (self.band.empty_min_centi..=self.band.empty_max_centi).contains(&weight_centi)
    }

    pub fn step(&mut self, weight_centi: i64, now_ms: u64) -> StepEvent {
        match self.phase {
            Phase::OffScale => {
                if self.in_empty_band(weight_centi) {
                    return StepEvent::None;
                }
                self.phase = Phase::OnScale {
                    anchor_centi: weight_centi,
                    stable_since_ms: now_ms,
                };
                StepEvent::VehicleEntered
            }
            Phase::OnScale {
                anchor_centi,
                stable_since_ms,
            } => {
                if self.in_empty_band(weight_centi) {
                    // Vehicle left before stabilizing; no record.
                    self.phase = Phase::OffScale;
                    return StepEvent::VehicleDeparted;
                }
                if (weight_centi - anchor_centi).abs() > self.stability.tolerance_centi {
                    // Debounce: re-anchor at the deviating reading and restart
                    // the window without leaving OnScale.
                    self.phase = Phase::OnScale {
                        anchor_centi: weight_centi,
                        stable_since_ms: now_ms,
                    };
                    return StepEvent::None;
                }
                if now_ms.saturating_sub(stable_since_ms) >= self.stability.stable_duration_ms {
                    self.phase = Phase::Weighing;
                    return StepEvent::StabilityConfirmed {
                        weight_centi: anchor_centi,
                    };
                }
                StepEvent::None
            }
            Phase::Weighing => {
                if self.in_empty_band(weight_centi) {
                    self.phase = Phase::OffScale;
                    return StepEvent::VehicleDeparted;
                }
                StepEvent::None
            }
        }
    }
}

struct Shared<S> {
    source: Arc<dyn WeightSource>,
    store: Arc<S>,
    plate_cam: Mutex<Box<dyn PlateCamera + Send>>,
    photo_cam: Mutex<Box<dyn PhotoCamera + Send>>,
    wall: Arc<dyn WallClock + Send + Sync>,
    cfg: MonitorCfg,
    status: AtomicU8,
    trigger_tx: xch::Sender<Uuid>,
}

impl<S: RecordStore> Shared<S> {
    /// Record creation sequence on entering Weighing. Captures are
    /// best-effort: a hardware capture failure must never block the core
    /// measurement from being recorded.
    fn create_record(&self, weight_centi: i64) {
        let plate_timeout = Duration::from_millis(self.cfg.capture.plate_timeout_ms);
        let plate = match self.plate_cam.lock() {
            Ok(mut cam) => match cam.capture_plate(plate_timeout) {
                Ok(p) => p,
                Err(e) => {
                    let mapped = map_collaborator_error(e.as_ref());
                    tracing::warn!(error = %mapped, "plate capture failed; recording without plate");
                    None
                }
            },
            Err(_) => None,
        };

        let photo_timeout = Duration::from_millis(self.cfg.capture.photo_timeout_ms);
        let photos = match self.photo_cam.lock() {
            Ok(mut cam) => match cam.capture_photos(photo_timeout) {
                Ok(p) => p,
                Err(e) => {
                    let mapped = map_collaborator_error(e.as_ref());
                    tracing::warn!(error = %mapped, "photo capture failed; recording without photos");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        let record = WeighingRecord::new(weight_centi, plate, photos, self.wall.now_utc());
        let id = record.id;
        match self.store.insert_record(record) {
            Ok(()) => {
                tracing::info!(record_id = %id, weight_centi, "weighing record created");
                // Fire-and-forget; matching is idempotent, so a dropped
                // trigger can always be re-requested explicitly.
                if self.trigger_tx.try_send(id).is_err() {
                    tracing::warn!(record_id = %id, "match trigger channel full, trigger dropped");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to insert weighing record");
            }
        }
    }
}

struct Worker {
    shutdown: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
}

/// Tick-driven stability monitor. `start`/`stop` are idempotent.
pub struct StabilityMonitor<S: RecordStore + 'static> {
    shared: Arc<Shared<S>>,
    clock: Arc<dyn Clock + Send + Sync>,
    trigger_rx: xch::Receiver<Uuid>,
    worker: Option<Worker>,
}

impl<S: RecordStore + 'static> StabilityMonitor<S> {
    pub fn new(
        source: Arc<dyn WeightSource>,
        store: Arc<S>,
        plate_cam: Box<dyn PlateCamera + Send>,
        photo_cam: Box<dyn PhotoCamera + Send>,
        cfg: MonitorCfg,
    ) -> Self {
        let (trigger_tx, trigger_rx) = xch::bounded(16);
        Self {
            shared: Arc::new(Shared {
                source,
                store,
                plate_cam: Mutex::new(plate_cam),
                photo_cam: Mutex::new(photo_cam),
                wall: Arc::new(SystemWallClock),
                cfg,
                status: AtomicU8::new(ScaleStatus::OffScale as u8),
                trigger_tx,
            }),
            clock: Arc::new(MonotonicClock::new()),
            trigger_rx,
            worker: None,
        }
    }

    /// Provide custom clocks; defaults are the system clocks. Call before
    /// `start`.
    pub fn with_clocks(
        mut self,
        clock: Arc<dyn Clock + Send + Sync>,
        wall: Arc<dyn WallClock + Send + Sync>,
    ) -> Self {
        self.clock = clock;
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.wall = wall;
        }
        self
    }

    /// Receiver side of the match-trigger channel; hand to a `MatchWorker`.
    pub fn match_triggers(&self) -> xch::Receiver<Uuid> {
        self.trigger_rx.clone()
    }

    /// Spawn the tick thread. Starting twice is a no-op.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            tracing::debug!("monitor already running, start is a no-op");
            return;
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let shared = self.shared.clone();
        let clock = self.clock.clone();

        let join = std::thread::spawn(move || {
            let mut core = MonitorCore::new(shared.cfg.band.clone(), shared.cfg.stability.clone());
            let tick = Duration::from_millis(shared.cfg.stability.tick_ms.max(1));
            let epoch: Instant = clock.now();
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("monitor thread received shutdown signal");
                    break;
                }
                if let Some(sample) = shared.source.latest() {
                    let now_ms = clock.ms_since(epoch);
                    match core.step(sample.weight_centi, now_ms) {
                        StepEvent::VehicleEntered => {
                            tracing::debug!(weight_centi = sample.weight_centi, "vehicle on scale");
                        }
                        StepEvent::StabilityConfirmed { weight_centi } => {
                            shared.create_record(weight_centi);
                        }
                        StepEvent::VehicleDeparted => {
                            tracing::debug!("scale empty again");
                        }
                        StepEvent::None => {}
                    }
                }
                shared.status.store(core.status() as u8, Ordering::Relaxed);
                clock.sleep(tick);
            }
            tracing::trace!("monitor thread exiting cleanly");
        });

        self.worker = Some(Worker {
            shutdown,
            join: Some(join),
        });
    }

    /// Stop the tick thread. An in-flight capture sequence finishes (bounded
    /// by the capture timeouts) before the thread exits. Stopping when not
    /// started is a no-op.
    pub fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown.store(true, Ordering::Relaxed);
            if let Some(handle) = worker.join.take() {
                match handle.join() {
                    Ok(()) => tracing::trace!("monitor thread joined"),
                    Err(e) => tracing::warn!(?e, "monitor thread panicked during shutdown"),
                }
            }
        }
    }

    pub fn status(&self) -> ScaleStatus {
        ScaleStatus::from_u8(self.shared.status.load(Ordering::Relaxed))
    }

    /// Diagnostic accessor for the latest telemetry snapshot.
    pub fn current_weight(&self) -> Option<i64> {
        self.shared.source.latest().map(|s| s.weight_centi)
    }
}

impl<S: RecordStore + 'static> Drop for StabilityMonitor<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
