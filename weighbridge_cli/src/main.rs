mod cli;
mod error_fmt;
mod pipeline;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use weighbridge_config::{Config, Logging, load_toml};
use weighbridge_core::mocks::{StaticPhotoCamera, StaticPlateCamera};
use weighbridge_core::units;
use weighbridge_core::{
    MatchWorker, MatchingEngine, MemoryStore, RecordStore, StabilityMonitor, Waybill,
    WeighingRecord,
};
use weighbridge_hardware::{Protocol, ScriptedLine, TelemetryReader, protocol};

fn main() {
    if let Err(err) = run() {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::json_error(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(1);
    }
}

fn run() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    let _ = JSON_MODE.set(args.json);

    let cfg = load_config(&args.config)?;
    init_tracing(&args, &cfg.logging)?;
    cfg.validate()?;

    match &args.cmd {
        Commands::Run { duration_s } => cmd_run(&cfg, *duration_s, args.json),
        Commands::Simulate {
            weights,
            plate,
            plan_quantity,
            unit_rate,
        } => cmd_simulate(
            &cfg,
            weights,
            plate.clone(),
            (*plan_quantity).zip(*unit_rate),
            args.json,
        ),
        Commands::Decode { frame } => cmd_decode(&cfg, frame, args.json),
        Commands::SelfCheck => cmd_self_check(&cfg, args.json),
    }
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    if !path.exists() {
        // Every field has a default; a missing file is not an error.
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
    load_toml(&content).wrap_err_with(|| format!("invalid config file {}", path.display()))
}

fn init_tracing(args: &Cli, log: &Logging) -> eyre::Result<()> {
    // An explicit --log-level beats the config; RUST_LOG beats both.
    let level = if args.log_level != "info" {
        args.log_level.clone()
    } else {
        log.level.clone().unwrap_or_else(|| "info".into())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(file) = &log.file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "weighbridge.log".into());
        let appender = match log.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        if args.json {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .json()
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .init();
        }
    } else if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[cfg(feature = "hardware")]
fn cmd_run(cfg: &Config, duration_s: Option<u64>, json: bool) -> eyre::Result<()> {
    use std::sync::atomic::{AtomicBool, Ordering};

    let mut reader = TelemetryReader::new(weighbridge_hardware::serial::port_line_factory());
    reader.initialize(pipeline::serial_settings(cfg))?;

    let store = Arc::new(MemoryStore::new());
    // No camera backend is wired up yet; records carry no plates or photos
    // until the operator attaches them.
    let mut monitor = StabilityMonitor::new(
        Arc::new(reader.cell()),
        store.clone(),
        Box::new(StaticPlateCamera { plate: None }),
        Box::new(StaticPhotoCamera { photos: vec![] }),
        pipeline::monitor_cfg(cfg),
    );
    let engine = MatchingEngine::new(store.clone(), pipeline::match_cfg(cfg));
    let mut worker = MatchWorker::spawn(engine, monitor.match_triggers());
    monitor.start();
    tracing::info!(port = %cfg.serial.port, "pipeline running; press Ctrl-C to stop");

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .wrap_err("failed to install Ctrl-C handler")?;

    let deadline = duration_s.map(|secs| std::time::Instant::now() + Duration::from_secs(secs));
    while !shutdown.load(Ordering::SeqCst) {
        if let Some(d) = deadline
            && std::time::Instant::now() >= d
        {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    monitor.stop();
    worker.stop();
    reader.close();

    let records = store.records_where(|_| true)?;
    let waybills = store.waybills_where(|_| true)?;
    print_results(&records, &waybills, json)
}

#[cfg(not(feature = "hardware"))]
fn cmd_run(_cfg: &Config, _duration_s: Option<u64>, _json: bool) -> eyre::Result<()> {
    eyre::bail!(
        "this build has no serial backend; rebuild with --features hardware, or use `simulate`"
    )
}

fn cmd_simulate(
    cfg: &Config,
    weights: &[f64],
    plate: Option<String>,
    plan: Option<(f64, f64)>,
    json: bool,
) -> eyre::Result<()> {
    if weights.is_empty() {
        eyre::bail!("simulate needs at least one --weights value");
    }

    // Hold each scripted value long enough for the stability window to
    // complete; a 0 between visits takes the scale off between trucks.
    let delay_ms: u64 = 10;
    // Twice the stability window so a visit cannot miss confirmation due to
    // decode latency.
    let hold_ms = 2 * cfg.stability.stable_duration_ms + 4 * cfg.stability.tick_ms;
    let repeats = usize::try_from((hold_ms / delay_ms).max(1)).unwrap_or(1);
    let mut centi: Vec<i64> = Vec::with_capacity((weights.len() + 1) * repeats);
    for w in weights {
        centi.extend(std::iter::repeat(units::quantize_centi(*w)).take(repeats));
    }
    centi.extend(std::iter::repeat(0).take(repeats));

    let script = ScriptedLine::from_weights(
        &pipeline::protocol(cfg),
        &centi,
        Duration::from_millis(delay_ms),
    );
    let mut reader = TelemetryReader::new(pipeline::scripted_factory(script));
    reader.initialize(pipeline::serial_settings(cfg))?;

    let store = Arc::new(MemoryStore::new());
    let mut monitor = StabilityMonitor::new(
        Arc::new(reader.cell()),
        store.clone(),
        Box::new(StaticPlateCamera { plate }),
        Box::new(StaticPhotoCamera { photos: vec![] }),
        pipeline::monitor_cfg(cfg),
    );
    let engine = MatchingEngine::new(store.clone(), pipeline::match_cfg(cfg));
    let mut worker = MatchWorker::spawn(engine, monitor.match_triggers());
    monitor.start();

    let total_ms = centi.len() as u64 * delay_ms + hold_ms + 500;
    tracing::info!(samples = centi.len(), total_ms, "replaying scripted weights");
    std::thread::sleep(Duration::from_millis(total_ms));

    monitor.stop();
    worker.stop();
    reader.close();

    let records = store.records_where(|_| true)?;
    let mut waybills = store.waybills_where(|_| true)?;
    if let Some((qty, rate)) = plan {
        let limits = pipeline::offset_limits(cfg);
        for bill in &mut waybills {
            bill.apply_plan(units::quantize_e4(qty), units::quantize_e4(rate), limits);
        }
    }
    print_results(&records, &waybills, json)
}

fn cmd_decode(cfg: &Config, frame: &str, json: bool) -> eyre::Result<()> {
    let bytes = hex::decode(frame.trim()).wrap_err("frame is not valid hex")?;
    let centi = match pipeline::protocol(cfg) {
        Protocol::BcdFramed { .. } => protocol::decode_bcd_frame(&bytes)?,
        Protocol::ReversedText { delimiter } => {
            let payload = bytes.strip_suffix(&[delimiter]).unwrap_or(&bytes);
            protocol::decode_reversed_text(payload)?
        }
    };
    if json {
        println!(
            "{}",
            serde_json::json!({
                "weight": units::format_centi(centi),
                "weight_centi": centi,
            })
        );
    } else {
        println!("{}", units::format_centi(centi));
    }
    Ok(())
}

fn cmd_self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    // Round-trip a known value through the configured codec.
    match pipeline::protocol(cfg) {
        Protocol::BcdFramed { frame_len } => {
            let frame = protocol::encode_bcd_frame(42, frame_len.saturating_sub(2))
                .ok_or_else(|| eyre::eyre!("serial.frame_len too small to carry a weight"))?;
            let back = protocol::decode_bcd_frame(&frame)?;
            eyre::ensure!(back == 42, "BCD codec round trip mismatch");
        }
        Protocol::ReversedText { .. } => {
            let payload = protocol::encode_reversed_text(42);
            let back = protocol::decode_reversed_text(&payload)?;
            eyre::ensure!(back == 42, "text codec round trip mismatch");
        }
    }
    if json {
        println!(
            "{}",
            serde_json::json!({
                "status": "ok",
                "port": cfg.serial.port,
                "baud": cfg.serial.baud,
            })
        );
    } else {
        println!(
            "self-check ok: port={} baud={} protocol={:?}",
            cfg.serial.port, cfg.serial.baud, cfg.serial.protocol
        );
    }
    Ok(())
}

fn print_results(records: &[WeighingRecord], waybills: &[Waybill], json: bool) -> eyre::Result<()> {
    if json {
        let body = serde_json::json!({ "records": records, "waybills": waybills });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    println!("{} records, {} waybills", records.len(), waybills.len());
    for r in records {
        println!(
            "  record {} weight={} plate={} state={:?}",
            r.id,
            units::format_centi(r.weight_centi),
            r.plate_number.as_deref().unwrap_or("-"),
            r.matched_type,
        );
    }
    for b in waybills {
        let offset = b
            .offset_rate_e4
            .map_or_else(|| "-".to_string(), units::format_e4);
        println!(
            "  waybill {} order_no={} truck={} total={} goods={} offset_rate={}",
            b.id,
            b.order_no,
            units::format_centi(b.truck_weight_centi),
            units::format_centi(b.total_weight_centi),
            units::format_centi(b.goods_weight_centi),
            offset,
        );
    }
    Ok(())
}
