use derive_more::Display;
use thiserror::Error;

/// Reference throughput in kbps that maps to a 100% duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(fmt = "{} kbps", kbps)]
pub struct Bitrate {
    kbps: u32,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BitrateError {
    #[error("Reference bitrate must be greater than zero.")]
    Zero,
}

impl Bitrate {
    pub fn from_kbps(kbps: u32) -> Result<Self, BitrateError> {
        if kbps == 0 {
            return Err(BitrateError::Zero);
        }
        Ok(Self { kbps })
    }

    pub fn kbps(&self) -> u32 {
        self.kbps
    }

    /// The byte rate the duty cycle is scaled against: `kbps * 8`.
    pub fn reference_rate(&self) -> f64 {
        f64::from(self.kbps) * 8f64
    }
}
