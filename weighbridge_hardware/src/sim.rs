//! Scripted serial line for tests and hardware-free demos.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use weighbridge_traits::{BoxError, SerialLine};

use crate::protocol::{encode_bcd_frame, encode_reversed_text};
use crate::reader::Protocol;

/// Replays a fixed sequence of byte chunks, one chunk per read. After the
/// script is exhausted every read reports a timeout (`Ok(0)`).
pub struct ScriptedLine {
    chunks: VecDeque<Vec<u8>>,
    read_delay: Duration,
    flushes: Arc<AtomicUsize>,
}

impl ScriptedLine {
    pub fn new(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
            read_delay: Duration::ZERO,
            flushes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Encode one chunk per weight in the given protocol. `delay` paces the
    /// reads so downstream consumers observe the samples over real time.
    pub fn from_weights(protocol: &Protocol, weights: &[i64], delay: Duration) -> Self {
        let chunks: Vec<Vec<u8>> = weights
            .iter()
            .map(|&w| match *protocol {
                Protocol::BcdFramed { frame_len } => {
                    encode_bcd_frame(w.max(0), frame_len.saturating_sub(2)).unwrap_or_default()
                }
                Protocol::ReversedText { delimiter } => {
                    let mut payload = encode_reversed_text(w);
                    payload.push(delimiter);
                    payload
                }
            })
            .collect();
        let mut line = Self::new(chunks);
        line.read_delay = delay;
        line
    }

    /// Counter handle for asserting flush behavior in tests.
    pub fn flush_counter(&self) -> Arc<AtomicUsize> {
        self.flushes.clone()
    }
}

impl SerialLine for ScriptedLine {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, BoxError> {
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay.min(timeout.max(self.read_delay)));
        }
        let Some(mut chunk) = self.chunks.pop_front() else {
            // Script exhausted; behave like a quiet line.
            std::thread::sleep(timeout.min(Duration::from_millis(5)));
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            // Hand back the remainder on the next read.
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn clear_input(&mut self) -> Result<(), BoxError> {
        // Nothing is buffered on the OS side of a scripted line; just record
        // that a flush was requested.
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
