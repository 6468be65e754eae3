use std::{num::ParseIntError, str::FromStr};

use derive_more::Display;
use thiserror::Error;

use crate::config::parse_prefixed_u32;

/// Identifies one PWM output as a (chip, channel) pair.
/// Parsed from `"chip:channel"` or a bare `"channel"` on chip 0.
///
/// ```
/// use stream_monitor::models::pwm_pin::PwmPin;
/// let pin: PwmPin = "1:0x2".parse().expect("Failed to parse pin.");
/// assert_eq!((pin.chip, pin.channel), (1, 2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[display(fmt = "{}:{}", chip, channel)]
pub struct PwmPin {
    pub chip: u32,
    pub channel: u32,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid pin '{input}'. Error: {source}")]
pub struct PwmPinError {
    input: String,
    source: ParseIntError,
}

impl FromStr for PwmPin {
    type Err = PwmPinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wrap = |source| PwmPinError {
            input: s.to_string(),
            source,
        };
        match s.split_once(':') {
            Some((chip, channel)) => Ok(Self {
                chip: parse_prefixed_u32(chip).map_err(wrap)?,
                channel: parse_prefixed_u32(channel).map_err(wrap)?,
            }),
            None => Ok(Self {
                chip: 0,
                channel: parse_prefixed_u32(s).map_err(wrap)?,
            }),
        }
    }
}
