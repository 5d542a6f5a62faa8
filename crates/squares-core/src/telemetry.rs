// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

// Telemetry helpers for JSONL logging when the `telemetry` feature is
// enabled. JSON is formatted by hand to keep the core free of a
// serialization dependency on the hot path.

#[cfg(feature = "telemetry")]
fn ts_micros() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros()
}

#[cfg(feature = "telemetry")]
fn emit(event: &str, tick: u64, detail: &str) {
    use std::io::Write as _;
    let mut out = std::io::stdout().lock();
    let _ = write!(
        out,
        r#"{{"timestamp_micros":{},"tick":{},"event":"{}"{}}}"#,
        ts_micros(),
        tick,
        event,
        detail
    );
    let _ = out.write_all(b"\n");
}

/// Emits a phase-entered event. Best-effort: I/O errors are ignored.
pub(crate) fn phase_entered(tick: u64, phase: &str) {
    #[cfg(feature = "telemetry")]
    emit("phase", tick, &format!(r#","phase":"{phase}""#));
    #[cfg(not(feature = "telemetry"))]
    let _ = (tick, phase);
}

/// Emits a step-applied event with the number of moving modules.
pub(crate) fn step_applied(tick: u64, moves: usize) {
    #[cfg(feature = "telemetry")]
    emit("applied", tick, &format!(r#","moves":{moves}"#));
    #[cfg(not(feature = "telemetry"))]
    let _ = (tick, moves);
}

/// Emits a step-rejected event with the executor's reason.
pub(crate) fn step_rejected(tick: u64, reason: &str) {
    #[cfg(feature = "telemetry")]
    emit("rejected", tick, &format!(r#","reason":"{reason}""#));
    #[cfg(not(feature = "telemetry"))]
    let _ = (tick, reason);
}

/// Emits a stall event for the given phase.
pub(crate) fn stall(tick: u64, phase: &str) {
    #[cfg(feature = "telemetry")]
    emit("stall", tick, &format!(r#","phase":"{phase}""#));
    #[cfg(not(feature = "telemetry"))]
    let _ = (tick, phase);
}
