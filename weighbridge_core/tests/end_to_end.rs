//! Full pipeline: scripted serial bytes → telemetry reader → stability
//! monitor → match worker → waybill in the store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use weighbridge_core::mocks::{StaticPhotoCamera, StaticPlateCamera};
use weighbridge_core::{
    BandCfg, CaptureCfg, MatchCfg, MatchWorker, MatchingEngine, MemoryStore, MonitorCfg,
    RecordStore, StabilityCfg, StabilityMonitor,
};
use weighbridge_hardware::{
    LineError, LineFactory, Protocol, ScriptedLine, SerialSettings, TelemetryReader,
};
use weighbridge_traits::SerialLine;

fn scripted_factory(line: ScriptedLine) -> LineFactory {
    let slot = Mutex::new(Some(line));
    Box::new(move |settings| {
        slot.lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|l| Box::new(l) as Box<dyn SerialLine + Send>)
            .ok_or_else(|| LineError::Open {
                port: settings.port.clone(),
                reason: "script already consumed".into(),
            })
    })
}

#[test]
fn two_visits_end_in_one_waybill() {
    let protocol = Protocol::BcdFramed { frame_len: 5 };

    // Entry: loaded truck at 1850.00 units; exit: empty truck at 820.00.
    // Zero-weight stretches between visits take the scale back off.
    let mut weights: Vec<i64> = vec![0; 3];
    weights.extend(std::iter::repeat(185_000).take(12));
    weights.extend(std::iter::repeat(0).take(5));
    weights.extend(std::iter::repeat(82_000).take(12));
    weights.extend(std::iter::repeat(0).take(3));
    let script = ScriptedLine::from_weights(&protocol, &weights, Duration::from_millis(10));

    let mut reader = TelemetryReader::new(scripted_factory(script));
    reader
        .initialize(SerialSettings {
            port: "scripted".into(),
            baud: 9_600,
            protocol,
            read_timeout_ms: 20,
        })
        .unwrap();

    let store = Arc::new(MemoryStore::new());
    let mut monitor = StabilityMonitor::new(
        Arc::new(reader.cell()),
        store.clone(),
        Box::new(StaticPlateCamera {
            plate: Some("京A12345".into()),
        }),
        Box::new(StaticPhotoCamera { photos: vec![] }),
        MonitorCfg {
            band: BandCfg {
                empty_min_centi: -50,
                empty_max_centi: 50,
            },
            stability: StabilityCfg {
                tolerance_centi: 100,
                stable_duration_ms: 50,
                tick_ms: 5,
            },
            capture: CaptureCfg {
                plate_timeout_ms: 100,
                photo_timeout_ms: 100,
            },
        },
    );
    let engine = MatchingEngine::new(store.clone(), MatchCfg::default());
    let mut worker = MatchWorker::spawn(engine, monitor.match_triggers());
    monitor.start();

    let mut bills = Vec::new();
    for _ in 0..600 {
        bills = store.waybills_where(|_| true).unwrap();
        if !bills.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    monitor.stop();
    worker.stop();
    reader.close();

    assert_eq!(bills.len(), 1, "expected exactly one waybill");
    let bill = &bills[0];
    assert_eq!(bill.total_weight_centi, 185_000);
    assert_eq!(bill.truck_weight_centi, 82_000);
    assert_eq!(bill.goods_weight_centi, 103_000);
    assert_eq!(bill.plate_number.as_deref(), Some("京A12345"));

    let records = store.records_where(|_| true).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.is_unmatched()));
}
