#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Scale telemetry hardware layer.
//!
//! Decodes the indicator head's byte stream into weight samples. All I/O goes
//! through the `weighbridge_traits::SerialLine` seam; the real serial backend
//! is behind the optional `hardware` feature, and a scripted line ships for
//! tests and demos.

pub mod error;
pub mod protocol;
pub mod reader;
pub mod sim;

pub use error::LineError;
pub use reader::{
    LineFactory, Protocol, SerialSettings, TelemetryReader, WeightCell, WeightSample,
};
pub use sim::ScriptedLine;

#[cfg(feature = "hardware")]
pub mod serial {
    //! Real serial backend (`serialport` crate).

    use std::time::Duration;

    use weighbridge_traits::{BoxError, SerialLine};

    use crate::error::LineError;
    use crate::reader::{LineFactory, SerialSettings};

    pub struct PortLine {
        port: Box<dyn serialport::SerialPort>,
    }

    impl PortLine {
        pub fn open(settings: &SerialSettings) -> Result<Self, LineError> {
            let port = serialport::new(&settings.port, settings.baud)
                .timeout(Duration::from_millis(settings.read_timeout_ms.max(1)))
                .open()
                .map_err(|e| LineError::Open {
                    port: settings.port.clone(),
                    reason: e.to_string(),
                })?;
            Ok(Self { port })
        }
    }

    impl SerialLine for PortLine {
        fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, BoxError> {
            if self.port.timeout() != timeout {
                self.port.set_timeout(timeout)?;
            }
            match self.port.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
                Err(e) => Err(Box::new(e)),
            }
        }

        fn clear_input(&mut self) -> Result<(), BoxError> {
            self.port.clear(serialport::ClearBuffer::Input)?;
            Ok(())
        }
    }

    /// Factory opening real ports; plug into `TelemetryReader::new`.
    pub fn port_line_factory() -> LineFactory {
        Box::new(|settings| PortLine::open(settings).map(|l| Box::new(l) as _))
    }
}
