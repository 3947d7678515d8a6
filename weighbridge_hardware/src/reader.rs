//! Background telemetry reader.
//!
//! Owns the serial line exclusively and spawns a single decode thread that
//! turns the byte stream into weight samples. The latest sample is published
//! through a shared [`WeightCell`] (short-held lock, never held across I/O)
//! and pushed on a bounded channel for subscribers that prefer notification
//! over polling.
//!
//! Safety: the reader spawns exactly one thread per initialization and joins
//! it on close/drop; the in-flight read is bounded by the line read timeout,
//! so close cannot race a torn read against the port handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use weighbridge_traits::{SerialLine, SystemWallClock, WallClock, WeightSource};

use crate::error::{LineError, Result};
use crate::protocol::{self, FRAME_START};

pub use weighbridge_traits::WeightSample;

/// Wire protocol selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    /// Fixed-length frame bounded by 0x02/0x03 with BCD interior bytes.
    BcdFramed { frame_len: usize },
    /// ASCII digits transmitted least-significant-first up to a delimiter.
    ReversedText { delimiter: u8 },
}

/// Serial connection settings. Re-initializing with identical settings is a
/// no-op; any material change (port, baud, protocol) re-opens the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
    pub protocol: Protocol,
    pub read_timeout_ms: u64,
}

struct CellInner {
    latest: Mutex<Option<WeightSample>>,
    /// Monotonic ms of the last successful decode, for stall detection.
    last_ok_ms: AtomicU64,
    epoch: Instant,
}

/// Handle to the single shared "last known weight" value. The stability
/// monitor polls this; it never blocks waiting for fresh telemetry.
#[derive(Clone)]
pub struct WeightCell {
    inner: Arc<CellInner>,
}

impl WeightCell {
    fn new() -> Self {
        Self {
            inner: Arc::new(CellInner {
                latest: Mutex::new(None),
                last_ok_ms: AtomicU64::new(0),
                epoch: Instant::now(),
            }),
        }
    }

    fn publish(&self, sample: WeightSample) {
        if let Ok(mut g) = self.inner.latest.lock() {
            *g = Some(sample);
        }
        let now_ms = Instant::now()
            .saturating_duration_since(self.inner.epoch)
            .as_millis()
            .min(u128::from(u64::MAX)) as u64;
        self.inner.last_ok_ms.store(now_ms, Ordering::Relaxed);
    }

    /// Latest decoded sample, if any frame has been decoded yet.
    pub fn get(&self) -> Option<WeightSample> {
        self.inner.latest.lock().ok().and_then(|g| *g)
    }

    /// Milliseconds since the last successful decode.
    pub fn stalled_for_ms(&self) -> u64 {
        let now_ms = Instant::now()
            .saturating_duration_since(self.inner.epoch)
            .as_millis()
            .min(u128::from(u64::MAX)) as u64;
        now_ms.saturating_sub(self.inner.last_ok_ms.load(Ordering::Relaxed))
    }
}

impl WeightSource for WeightCell {
    fn latest(&self) -> Option<WeightSample> {
        self.get()
    }

    fn stalled_for_ms(&self) -> u64 {
        WeightCell::stalled_for_ms(self)
    }
}

/// Opens a line for the given settings. Injected so tests and the simulated
/// backend share the reader unchanged.
pub type LineFactory =
    Box<dyn Fn(&SerialSettings) -> Result<Box<dyn SerialLine + Send>> + Send + Sync>;

struct Worker {
    shutdown: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
}

pub struct TelemetryReader {
    factory: LineFactory,
    wall: Arc<dyn WallClock + Send + Sync>,
    settings: Option<SerialSettings>,
    worker: Option<Worker>,
    cell: WeightCell,
    updates_tx: xch::Sender<WeightSample>,
    updates_rx: xch::Receiver<WeightSample>,
}

impl TelemetryReader {
    pub fn new(factory: LineFactory) -> Self {
        Self::with_wall_clock(factory, Arc::new(SystemWallClock))
    }

    pub fn with_wall_clock(factory: LineFactory, wall: Arc<dyn WallClock + Send + Sync>) -> Self {
        let (updates_tx, updates_rx) = xch::bounded(1);
        Self {
            factory,
            wall,
            settings: None,
            worker: None,
            cell: WeightCell::new(),
            updates_tx,
            updates_rx,
        }
    }

    /// Open (or re-open) the line. Identical settings with a running decode
    /// thread are a no-op. Open failure is reported to the caller; the reader
    /// never retries internally.
    pub fn initialize(&mut self, settings: SerialSettings) -> Result<()> {
        if self.worker.is_some() && self.settings.as_ref() == Some(&settings) {
            tracing::debug!(port = %settings.port, "settings unchanged, keeping line open");
            return Ok(());
        }
        self.close();
        let line = (self.factory)(&settings)?;
        tracing::info!(port = %settings.port, baud = settings.baud, "telemetry line opened");
        self.spawn_worker(line, &settings);
        self.settings = Some(settings);
        Ok(())
    }

    fn spawn_worker(&mut self, mut line: Box<dyn SerialLine + Send>, settings: &SerialSettings) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let cell = self.cell.clone();
        let tx = self.updates_tx.clone();
        let wall = self.wall.clone();
        let protocol = settings.protocol.clone();
        let timeout = Duration::from_millis(settings.read_timeout_ms.max(1));

        let join = std::thread::spawn(move || {
            let mut acc: Vec<u8> = Vec::with_capacity(128);
            let mut buf = [0u8; 64];
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("telemetry thread received shutdown signal");
                    break;
                }
                match line.read(&mut buf, timeout) {
                    Ok(0) => {}
                    Ok(n) => {
                        acc.extend_from_slice(&buf[..n]);
                        drain_samples(&mut acc, &mut *line, &protocol, |centi| {
                            let sample = WeightSample {
                                weight_centi: centi,
                                observed_at: wall.now_utc(),
                            };
                            cell.publish(sample);
                            // Drop the push update if the subscriber lags; the
                            // cell remains authoritative.
                            let _ = tx.try_send(sample);
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "line read failed, continuing");
                        std::thread::sleep(Duration::from_millis(50));
                    }
                }
            }
            tracing::trace!("telemetry thread exiting cleanly");
        });

        self.worker = Some(Worker {
            shutdown,
            join: Some(join),
        });
    }

    /// The shared latest-weight cell. Clone freely; reads are lock-free of I/O.
    pub fn cell(&self) -> WeightCell {
        self.cell.clone()
    }

    /// Push stream of decoded samples (bounded; lagging subscribers miss
    /// intermediate updates, never block the decode thread).
    pub fn updates(&self) -> xch::Receiver<WeightSample> {
        self.updates_rx.clone()
    }

    /// Most recently decoded sample. Lazily re-opens the line on first use if
    /// it was initialized before and closed since.
    pub fn current_weight(&mut self) -> Result<Option<WeightSample>> {
        if self.worker.is_none() {
            let settings = self.settings.clone().ok_or(LineError::NotInitialized)?;
            let line = (self.factory)(&settings)?;
            self.spawn_worker(line, &settings);
        }
        Ok(self.cell.get())
    }

    /// Signal shutdown and join the decode thread. The in-flight read finishes
    /// first, bounded by the line read timeout.
    pub fn close(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown.store(true, Ordering::Relaxed);
            if let Some(handle) = worker.join.take() {
                match handle.join() {
                    Ok(()) => tracing::trace!("telemetry thread joined"),
                    Err(e) => tracing::warn!(?e, "telemetry thread panicked during shutdown"),
                }
            }
        }
    }
}

impl Drop for TelemetryReader {
    fn drop(&mut self) {
        self.close();
    }
}

/// Extract as many complete samples as the accumulator holds.
///
/// BCD framing: garbage before a start marker is dropped; a frame failing
/// validation clears the accumulator and flushes the line input so the decoder
/// resynchronizes. Text framing: a payload failing to parse is logged and
/// skipped; decoding continues at the next delimiter.
fn drain_samples(
    acc: &mut Vec<u8>,
    line: &mut dyn SerialLine,
    protocol: &Protocol,
    mut publish: impl FnMut(i64),
) {
    match *protocol {
        Protocol::BcdFramed { frame_len } => loop {
            let Some(pos) = acc.iter().position(|&b| b == FRAME_START) else {
                acc.clear();
                return;
            };
            if pos > 0 {
                acc.drain(..pos);
            }
            if acc.len() < frame_len {
                return;
            }
            match protocol::decode_bcd_frame(&acc[..frame_len]) {
                Ok(centi) => {
                    acc.drain(..frame_len);
                    publish(centi);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "discarding malformed frame");
                    acc.clear();
                    if let Err(e) = line.clear_input() {
                        tracing::warn!(error = %e, "input flush failed");
                    }
                    return;
                }
            }
        },
        Protocol::ReversedText { delimiter } => {
            while let Some(pos) = acc.iter().position(|&b| b == delimiter) {
                let payload: Vec<u8> = acc.drain(..=pos).collect();
                match protocol::decode_reversed_text(&payload[..payload.len() - 1]) {
                    Ok(centi) => publish(centi),
                    Err(e) => {
                        tracing::debug!(error = %e, "ignoring unparsable text payload");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FRAME_END, encode_bcd_frame};

    struct NoFlushLine;
    impl SerialLine for NoFlushLine {
        fn read(&mut self, _buf: &mut [u8], _t: Duration) -> std::result::Result<usize, weighbridge_traits::BoxError> {
            Ok(0)
        }
        fn clear_input(&mut self) -> std::result::Result<(), weighbridge_traits::BoxError> {
            Ok(())
        }
    }

    #[test]
    fn drains_consecutive_frames_with_leading_garbage() {
        let mut acc = vec![0xFF, 0x00];
        acc.extend(encode_bcd_frame(185_000, 3).unwrap());
        acc.extend(encode_bcd_frame(185_050, 3).unwrap());
        let mut seen = Vec::new();
        drain_samples(
            &mut acc,
            &mut NoFlushLine,
            &Protocol::BcdFramed { frame_len: 5 },
            |c| seen.push(c),
        );
        assert_eq!(seen, vec![185_000, 185_050]);
        assert!(acc.is_empty());
    }

    #[test]
    fn malformed_frame_clears_accumulator() {
        // Valid markers but a non-BCD nibble inside.
        let mut acc = vec![FRAME_START, 0xAB, 0x00, 0x00, FRAME_END];
        acc.extend(encode_bcd_frame(100, 3).unwrap());
        let mut seen = Vec::new();
        drain_samples(
            &mut acc,
            &mut NoFlushLine,
            &Protocol::BcdFramed { frame_len: 5 },
            |c| seen.push(c),
        );
        // The flush discards everything buffered behind the bad frame.
        assert!(seen.is_empty());
        assert!(acc.is_empty());
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let frame = encode_bcd_frame(42, 3).unwrap();
        let mut acc = frame[..3].to_vec();
        let mut seen = Vec::new();
        drain_samples(
            &mut acc,
            &mut NoFlushLine,
            &Protocol::BcdFramed { frame_len: 5 },
            |c| seen.push(c),
        );
        assert!(seen.is_empty());
        assert_eq!(acc.len(), 3);

        acc.extend_from_slice(&frame[3..]);
        drain_samples(
            &mut acc,
            &mut NoFlushLine,
            &Protocol::BcdFramed { frame_len: 5 },
            |c| seen.push(c),
        );
        assert_eq!(seen, vec![42]);
    }

    #[test]
    fn text_payloads_split_on_delimiter() {
        let mut acc = Vec::new();
        acc.extend(crate::protocol::encode_reversed_text(185_025));
        acc.push(b'=');
        acc.extend_from_slice(b"garbage=");
        acc.extend(crate::protocol::encode_reversed_text(500));
        acc.push(b'=');
        let mut seen = Vec::new();
        drain_samples(
            &mut acc,
            &mut NoFlushLine,
            &Protocol::ReversedText { delimiter: b'=' },
            |c| seen.push(c),
        );
        assert_eq!(seen, vec![185_025, 500]);
    }
}
