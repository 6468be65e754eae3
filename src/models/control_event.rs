use std::fmt::Display;

use super::duty_cycle::DutyCycle;

/// Outcome of one polling tick: what was measured and what was written to
/// the PWM output.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    pub interface: String,
    /// Transmit byte delta since the previous tick. Negative after a
    /// counter reset.
    pub delta: i64,
    /// Bytes per interval that map to 100%.
    pub reference_bytes: f64,
    /// Unclamped ratio in percent.
    pub ratio: f64,
    pub duty_cycle: DutyCycle,
}

impl Display for ControlEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}/{:.0} bytes, ratio={:.1}",
            self.interface, self.delta, self.reference_bytes, self.ratio
        )
    }
}
