use std::time::Duration;

use weighbridge_hardware::{
    LineError, Protocol, ScriptedLine, SerialSettings, TelemetryReader,
};

fn bcd_settings() -> SerialSettings {
    SerialSettings {
        port: "sim0".into(),
        baud: 9600,
        protocol: Protocol::BcdFramed { frame_len: 5 },
        read_timeout_ms: 10,
    }
}

fn wait_for_weight(reader: &TelemetryReader, expect: i64) -> bool {
    let cell = reader.cell();
    for _ in 0..200 {
        if cell.get().map(|s| s.weight_centi) == Some(expect) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn decodes_scripted_frames_into_cell() {
    let weights = vec![0, 120, 185_000];
    let mut reader = TelemetryReader::new(Box::new(move |s| {
        Ok(Box::new(ScriptedLine::from_weights(
            &s.protocol,
            &[0, 120, 185_000],
            Duration::ZERO,
        )) as _)
    }));
    reader.initialize(bcd_settings()).unwrap();
    assert!(wait_for_weight(&reader, *weights.last().unwrap()));
    reader.close();
}

#[test]
fn reinitialize_with_same_settings_is_noop() {
    let mut reader = TelemetryReader::new(Box::new(|s| {
        Ok(Box::new(ScriptedLine::from_weights(
            &s.protocol,
            &[4_200],
            Duration::ZERO,
        )) as _)
    }));
    reader.initialize(bcd_settings()).unwrap();
    assert!(wait_for_weight(&reader, 4_200));
    // Same settings: must not re-open (the scripted line would start over and
    // the cell keeps its last sample either way, but the call must succeed).
    reader.initialize(bcd_settings()).unwrap();
    assert_eq!(reader.cell().get().map(|s| s.weight_centi), Some(4_200));
}

#[test]
fn open_failure_is_reported_not_panicked() {
    let mut reader = TelemetryReader::new(Box::new(|s| {
        Err(LineError::Open {
            port: s.port.clone(),
            reason: "no such device".into(),
        })
    }));
    let err = reader.initialize(bcd_settings()).unwrap_err();
    assert!(matches!(err, LineError::Open { .. }));
}

#[test]
fn current_weight_before_initialize_is_an_error() {
    let mut reader = TelemetryReader::new(Box::new(|_| {
        Ok(Box::new(ScriptedLine::new(Vec::<Vec<u8>>::new())) as _)
    }));
    assert!(matches!(
        reader.current_weight(),
        Err(LineError::NotInitialized)
    ));
}

#[test]
fn current_weight_lazily_reopens_after_close() {
    let mut reader = TelemetryReader::new(Box::new(|s| {
        Ok(Box::new(ScriptedLine::from_weights(
            &s.protocol,
            &[7_700],
            Duration::ZERO,
        )) as _)
    }));
    reader.initialize(bcd_settings()).unwrap();
    assert!(wait_for_weight(&reader, 7_700));
    reader.close();
    // Lazily re-opens with the stored settings.
    reader.current_weight().unwrap();
    assert!(wait_for_weight(&reader, 7_700));
}

#[test]
fn text_protocol_end_to_end() {
    let settings = SerialSettings {
        protocol: Protocol::ReversedText { delimiter: b'=' },
        ..bcd_settings()
    };
    let mut reader = TelemetryReader::new(Box::new(|s| {
        Ok(Box::new(ScriptedLine::from_weights(
            &s.protocol,
            &[185_025],
            Duration::ZERO,
        )) as _)
    }));
    reader.initialize(settings).unwrap();
    assert!(wait_for_weight(&reader, 185_025));
}

#[test]
fn updates_channel_sees_samples() {
    let mut reader = TelemetryReader::new(Box::new(|s| {
        Ok(Box::new(ScriptedLine::from_weights(
            &s.protocol,
            &[55],
            Duration::ZERO,
        )) as _)
    }));
    let rx = reader.updates();
    reader.initialize(bcd_settings()).unwrap();
    let sample = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(sample.weight_centi, 55);
}
