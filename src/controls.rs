use std::time::Duration;

use thiserror::Error;

use crate::models::{
    bitrate::Bitrate, control_event::ControlEvent, counter_snapshot::CounterSnapshot,
    duty_cycle::DutyCycle,
};

/// The configured interface is absent from a counter snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}: No such interface")]
pub struct NoSuchInterface(pub String);

/// Transmit byte delta for `interface` between two snapshots.
/// Counters that went backwards (reset or wrap) yield a negative delta.
pub fn tx_byte_delta(
    interface: &str,
    previous: &CounterSnapshot,
    current: &CounterSnapshot,
) -> Result<i64, NoSuchInterface> {
    let missing = || NoSuchInterface(interface.to_string());
    let before = previous.get(interface).ok_or_else(missing)?.tx.bytes;
    let after = current.get(interface).ok_or_else(missing)?.tx.bytes;

    let delta = i128::from(after) - i128::from(before);
    Ok(i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX }))
}

/// Bytes per polling interval that correspond to a 100% duty cycle.
pub fn reference_bytes(bitrate: Bitrate, interval: Duration) -> f64 {
    bitrate.reference_rate() / interval.as_secs_f64()
}

/// `delta * 100 * interval / (kbps * 8)`, unclamped.
pub fn compute_ratio(delta: i64, bitrate: Bitrate, interval: Duration) -> f64 {
    (delta as f64) * 100f64 * interval.as_secs_f64() / bitrate.reference_rate()
}

/// Build the control event for one tick: measure the delta and map it onto
/// a duty cycle clamped to 0-100%.
pub fn generate_control_event(
    interface: &str,
    previous: &CounterSnapshot,
    current: &CounterSnapshot,
    bitrate: Bitrate,
    interval: Duration,
) -> Result<ControlEvent, NoSuchInterface> {
    let delta = tx_byte_delta(interface, previous, current)?;
    let ratio = compute_ratio(delta, bitrate, interval);

    Ok(ControlEvent {
        interface: interface.to_string(),
        delta,
        reference_bytes: reference_bytes(bitrate, interval),
        ratio,
        duty_cycle: DutyCycle::clamped(ratio as f32),
    })
}
