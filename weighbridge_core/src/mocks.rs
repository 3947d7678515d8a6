//! Test doubles for the capture and telemetry seams. Compiled for tests and
//! for hardware-free demo binaries.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use weighbridge_traits::{BoxError, PhotoCamera, PlateCamera, WeightSample, WeightSource};

/// Always returns the same plate.
pub struct StaticPlateCamera {
    pub plate: Option<String>,
}

impl PlateCamera for StaticPlateCamera {
    fn capture_plate(&mut self, _timeout: Duration) -> Result<Option<String>, BoxError> {
        Ok(self.plate.clone())
    }
}

/// Always fails; exercises the best-effort capture path.
pub struct FailingPlateCamera;

impl PlateCamera for FailingPlateCamera {
    fn capture_plate(&mut self, _timeout: Duration) -> Result<Option<String>, BoxError> {
        Err("plate recognizer offline".into())
    }
}

/// Always returns the same photo paths.
pub struct StaticPhotoCamera {
    pub photos: Vec<PathBuf>,
}

impl PhotoCamera for StaticPhotoCamera {
    fn capture_photos(&mut self, _timeout: Duration) -> Result<Vec<PathBuf>, BoxError> {
        Ok(self.photos.clone())
    }
}

/// Always fails; exercises the best-effort capture path.
pub struct FailingPhotoCamera;

impl PhotoCamera for FailingPhotoCamera {
    fn capture_photos(&mut self, _timeout: Duration) -> Result<Vec<PathBuf>, BoxError> {
        Err("camera timeout".into())
    }
}

/// Settable weight source for driving the monitor without a serial line.
#[derive(Default)]
pub struct StaticWeightSource {
    sample: Mutex<Option<WeightSample>>,
}

impl StaticWeightSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, sample: WeightSample) {
        if let Ok(mut slot) = self.sample.lock() {
            *slot = Some(sample);
        }
    }
}

impl WeightSource for StaticWeightSource {
    fn latest(&self) -> Option<WeightSample> {
        self.sample.lock().ok().and_then(|s| s.clone())
    }

    fn stalled_for_ms(&self) -> u64 {
        0
    }
}
