//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and
/// fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use weighbridge_core::CoreError;
    use weighbridge_hardware::LineError;

    // Typed matches first
    if let Some(le) = err.downcast_ref::<LineError>() {
        return match le {
            LineError::Open { port, reason } => format!(
                "What happened: Could not open the serial line on {port} ({reason}).\nLikely causes: Wrong port in [serial], cable unplugged, or missing permissions.\nHow to fix: Check serial.port in the config and verify the device node exists and is readable."
            ),
            LineError::Timeout => {
                "What happened: The indicator head sent no data within the read timeout.\nLikely causes: Head powered off, wrong baud rate, or broken wiring.\nHow to fix: Verify serial.baud matches the head and consider raising serial.read_timeout_ms.".to_string()
            }
            LineError::NotInitialized => {
                "What happened: Telemetry was queried before the line was initialized.\nLikely causes: Internal ordering bug or a failed earlier initialization.\nHow to fix: Re-run; if it persists, check the logs for the original open failure.".to_string()
            }
            other => format!(
                "What happened: Serial line error ({other}).\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug for more detail."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CoreError>() {
        if let CoreError::RecordNotFound(id) = ce {
            return format!(
                "What happened: Weighing record {id} does not exist.\nLikely causes: A stale trigger or an id from a different store.\nHow to fix: List the current records and retry with a valid id."
            );
        }
        return format!(
            "What happened: {ce}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("frame") || lower.contains("nibble") {
        return format!(
            "What happened: {msg}.\nLikely causes: The bytes are not a complete frame for the configured protocol.\nHow to fix: Check serial.protocol and serial.frame_len against the indicator head's manual."
        );
    }

    if lower.contains("must") || lower.contains("config") {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
        );
    }

    format!("What happened: {msg}.\nHow to fix: Re-run with --log-level=debug for more detail.")
}

/// Structured error for --json consumers.
pub fn json_error(err: &eyre::Report) -> String {
    let body = serde_json::json!({
        "error": err.to_string(),
        "chain": err.chain().skip(1).map(|c| c.to_string()).collect::<Vec<_>>(),
    });
    body.to_string()
}
