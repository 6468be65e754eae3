use std::fmt::Display;

use thiserror::Error;

/// Represents a 0-100% PWM duty cycle.
///
/// ```
/// use stream_monitor::models::duty_cycle::DutyCycle;
/// let duty = DutyCycle::try_from(42.5f32).expect("Failed to get DutyCycle representation");
/// assert_eq!(duty.value(), 42.5f32);
/// assert_eq!(DutyCycle::clamped(250f32).value(), 100f32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct DutyCycle {
    value: f32,
}

/// Represents errors in creating a `DutyCycle`.
#[derive(Debug, Error, PartialEq)]
pub enum DutyCycleError {
    /// The value was negative, above 100 or not a number.
    #[error("Value {0} outside of valid state space representation!")]
    OutOfValidStateSpace(f32),
}

impl DutyCycle {
    pub const OFF: Self = Self { value: 0f32 };
    pub const FULL: Self = Self { value: 100f32 };

    /// Saturating constructor. Anything below 0 (or NaN) becomes 0% and
    /// anything above 100 becomes 100%.
    pub fn clamped(value: f32) -> Self {
        if value.is_nan() {
            return Self::OFF;
        }
        Self {
            value: value.clamp(0f32, 100f32),
        }
    }

    /// Get the underlying percentage value.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Duty cycle as a 0.0-1.0 fraction of the period.
    pub fn fraction(&self) -> f64 {
        f64::from(self.value) / 100f64
    }
}

impl TryFrom<f32> for DutyCycle {
    type Error = DutyCycleError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        if !(0f32..=100f32).contains(&value) {
            return Err(DutyCycleError::OutOfValidStateSpace(value));
        }
        Ok(Self { value })
    }
}

impl From<DutyCycle> for f32 {
    fn from(value: DutyCycle) -> Self {
        value.value
    }
}

impl Display for DutyCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.value)
    }
}
