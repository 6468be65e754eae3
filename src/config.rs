use std::{env, num::ParseIntError, path::PathBuf, time::Duration};

use clap::Parser;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::models::{
    bitrate::{Bitrate, BitrateError},
    pwm_pin::{PwmPin, PwmPinError},
};

const DEFAULT_INTERFACE: &str = "wlan0";
const DEFAULT_PIN: &str = "0:0";
const DEFAULT_KBPS: &str = "1800";
const DEFAULT_PWM_HZ: &str = "100";
const DEFAULT_UPDATE_SEC: &str = "1.0";
const DEFAULT_COUNTERS_PATH: &str = "/proc/net/dev";
const DEFAULT_PWM_ROOT: &str = "/sys/class/pwm";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Highest frequency whose period is still at least one nanosecond.
pub const MAX_PWM_HZ: u32 = 1_000_000_000;

/// Drive a PWM output proportionally to a network interface's transmit rate.
///
/// Every value can also come from its environment variable. A positional
/// argument wins over the environment, and empty values count as unset.
#[derive(Parser, Debug, Default)]
#[command(name = "stream_monitor")]
pub struct Cli {
    /// Network interface to watch. Falls back to `UDP_IFACE`.
    #[arg(env = "MONITOR_DEV")]
    pub interface: Option<String>,

    /// PWM output as `chip:channel`, or a bare channel on chip 0.
    #[arg(env = "MONITOR_PIN")]
    pub pin: Option<String>,

    /// Throughput in kbit/s that maps to 100%. Falls back to `VIDEO_BITRATE`.
    #[arg(env = "MONITOR_KBPS", allow_negative_numbers = true)]
    pub kbps: Option<String>,

    /// PWM frequency in Hz.
    #[arg(env = "MONITOR_PWM_HZ", allow_negative_numbers = true)]
    pub pwm_hz: Option<String>,

    /// Seconds between samples.
    #[arg(env = "MONITOR_UPDATE_SEC", allow_negative_numbers = true)]
    pub update_sec: Option<String>,

    /// Kernel network counter table.
    #[arg(long, env = "MONITOR_COUNTERS_PATH")]
    pub counters_path: Option<String>,

    /// Root of the PWM sysfs class.
    #[arg(long, env = "MONITOR_PWM_ROOT")]
    pub pwm_root: Option<String>,

    #[arg(long, env = "MONITOR_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Runtime settings for the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub interface: String,
    pub pin: PwmPin,
    pub bitrate: Bitrate,
    pub pwm_frequency_hz: u32,
    pub update_interval: Duration,
    pub counters_path: PathBuf,
    pub pwm_root: PathBuf,
    pub log_level: LevelFilter,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {field} '{value}'. Error: {source}")]
    InvalidInteger {
        field: &'static str,
        value: String,
        source: ParseIntError,
    },

    #[error("Invalid update interval '{0}'. Must be a positive number of seconds.")]
    InvalidInterval(String),

    #[error("PWM frequency must be greater than zero.")]
    ZeroFrequency,

    #[error("PWM frequency {0} Hz is above the limit of {} Hz.", MAX_PWM_HZ)]
    FrequencyTooHigh(u32),

    #[error("Invalid log level '{0}'.")]
    InvalidLogLevel(String),

    #[error(transparent)]
    Pin(#[from] PwmPinError),

    #[error(transparent)]
    Bitrate(#[from] BitrateError),
}

/// Parse an unsigned integer, honouring `0x`, `0o` and `0b` prefixes.
pub fn parse_prefixed_u32(raw: &str) -> Result<u32, ParseIntError> {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    if let Some(digits) = lower.strip_prefix("0x") {
        u32::from_str_radix(digits, 16)
    } else if let Some(digits) = lower.strip_prefix("0o") {
        u32::from_str_radix(digits, 8)
    } else if let Some(digits) = lower.strip_prefix("0b") {
        u32::from_str_radix(digits, 2)
    } else {
        raw.parse()
    }
}

/// Pick the parsed value, then each fallback variable in order, then the
/// default. Blank values are skipped.
fn first_non_empty<F>(
    value: Option<String>,
    fallbacks: &[&str],
    default: &str,
    lookup: &F,
) -> String
where
    F: Fn(&str) -> Option<String>,
{
    value
        .into_iter()
        .chain(fallbacks.iter().filter_map(|key| lookup(*key)))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl MonitorConfig {
    /// Resolve from the process arguments and environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(Cli::parse(), |key| env::var(key).ok())
    }

    /// Resolve parsed arguments into typed settings. `lookup` serves the
    /// secondary variables `UDP_IFACE` and `VIDEO_BITRATE`.
    pub fn resolve<F>(cli: Cli, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interface = first_non_empty(cli.interface, &["UDP_IFACE"], DEFAULT_INTERFACE, &lookup)
            .trim()
            .to_string();

        let pin: PwmPin = first_non_empty(cli.pin, &[], DEFAULT_PIN, &lookup).parse()?;

        let kbps = first_non_empty(cli.kbps, &["VIDEO_BITRATE"], DEFAULT_KBPS, &lookup);
        let kbps = parse_prefixed_u32(&kbps).map_err(|source| ConfigError::InvalidInteger {
            field: "bitrate",
            value: kbps.clone(),
            source,
        })?;
        let bitrate = Bitrate::from_kbps(kbps)?;

        let pwm_hz = first_non_empty(cli.pwm_hz, &[], DEFAULT_PWM_HZ, &lookup);
        let pwm_frequency_hz =
            parse_prefixed_u32(&pwm_hz).map_err(|source| ConfigError::InvalidInteger {
                field: "pwm frequency",
                value: pwm_hz.clone(),
                source,
            })?;
        match pwm_frequency_hz {
            0 => return Err(ConfigError::ZeroFrequency),
            hz if hz > MAX_PWM_HZ => return Err(ConfigError::FrequencyTooHigh(hz)),
            _ => {}
        }

        let update_sec = first_non_empty(cli.update_sec, &[], DEFAULT_UPDATE_SEC, &lookup);
        let update_interval = update_sec
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs > 0f64)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|interval| !interval.is_zero())
            .ok_or_else(|| ConfigError::InvalidInterval(update_sec.clone()))?;

        let counters_path: PathBuf =
            first_non_empty(cli.counters_path, &[], DEFAULT_COUNTERS_PATH, &lookup).into();
        let pwm_root: PathBuf =
            first_non_empty(cli.pwm_root, &[], DEFAULT_PWM_ROOT, &lookup).into();

        let log_level = first_non_empty(cli.log_level, &[], DEFAULT_LOG_LEVEL, &lookup);
        let log_level = log_level
            .trim()
            .parse::<LevelFilter>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level.clone()))?;

        Ok(Self {
            interface,
            pin,
            bitrate,
            pwm_frequency_hz,
            update_interval,
            counters_path,
            pwm_root,
            log_level,
        })
    }
}
