pub mod clock;

pub use clock::{Clock, MonotonicClock, SystemWallClock, WallClock};

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One decoded weight reading. Transient; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightSample {
    /// Weight in centi-units (two implied decimals, matching the wire).
    pub weight_centi: i64,
    pub observed_at: DateTime<Utc>,
}

/// Read side of the single shared "last known weight" cell published by the
/// telemetry reader. Consumers poll the latest snapshot; they never block
/// waiting for fresh telemetry.
pub trait WeightSource: Send + Sync {
    fn latest(&self) -> Option<WeightSample>;

    /// Milliseconds since the last successful decode, for stall detection.
    fn stalled_for_ms(&self) -> u64;
}

/// A byte stream from a scale indicator head. The telemetry reader owns the
/// line exclusively; no other component touches the port handle.
pub trait SerialLine {
    /// Read up to `buf.len()` bytes, waiting at most `timeout`.
    /// `Ok(0)` means the timeout elapsed with no data (not an error).
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, BoxError>;

    /// Discard any buffered input. Called after a malformed frame so the
    /// decoder can resynchronize on the next start marker.
    fn clear_input(&mut self) -> Result<(), BoxError>;
}

/// Plate-recognition camera. Calls are best-effort: a failure or timeout must
/// never block a weighing record from being created.
pub trait PlateCamera {
    /// `Ok(None)` when the camera saw no readable plate.
    fn capture_plate(&mut self, timeout: Duration) -> Result<Option<String>, BoxError>;
}

/// Vehicle/bill photo camera, same tolerance as [`PlateCamera`].
pub trait PhotoCamera {
    fn capture_photos(&mut self, timeout: Duration) -> Result<Vec<PathBuf>, BoxError>;
}
