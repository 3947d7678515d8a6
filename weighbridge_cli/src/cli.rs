//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "weighbridge", version, about = "Weighbridge CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/weighbridge.toml")]
    pub config: PathBuf,

    /// Print results and log as JSON instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the live weighing pipeline until interrupted
    Run {
        /// Stop automatically after this many seconds
        #[arg(long, value_name = "SECS")]
        duration_s: Option<u64>,
    },
    /// Replay a weight sequence through the full pipeline and print the
    /// resulting records and waybills
    Simulate {
        /// Weight readings in scale units, in order; each is held on the
        /// scale long enough to stabilize
        #[arg(long, value_name = "UNITS", num_args = 1.., value_delimiter = ',', allow_negative_numbers = true)]
        weights: Vec<f64>,

        /// Plate reported by the simulated recognizer
        #[arg(long, value_name = "PLATE")]
        plate: Option<String>,

        /// Plan quantity to attach to resulting waybills
        #[arg(long, value_name = "QTY", requires = "unit_rate")]
        plan_quantity: Option<f64>,

        /// Unit rate (weight per quantity unit) for the plan
        #[arg(long, value_name = "RATE", requires = "plan_quantity")]
        unit_rate: Option<f64>,
    },
    /// Decode a single telemetry frame given as hex bytes
    Decode {
        /// Frame bytes as hex, e.g. 0218500003
        #[arg(value_name = "HEX")]
        frame: String,
    },
    /// Quick health check (config parses, protocol settings coherent)
    SelfCheck,
}
