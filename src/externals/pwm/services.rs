use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::models::{duty_cycle::DutyCycle, pwm_pin::PwmPin};

const NANOS_PER_SECOND: f64 = 1_000_000_000f64;

/// Hardware PWM capability. Lets the monitor loop drive either a real
/// output or an inert stand-in.
pub trait PwmOutput: Send {
    /// Claim `pin` and set it up for PWM at `frequency_hz`.
    fn configure(&mut self, pin: PwmPin, frequency_hz: u32) -> Result<(), PwmError>;

    /// Enable the output at an initial duty cycle.
    fn start(&mut self, duty: DutyCycle) -> Result<(), PwmError>;

    fn set_duty(&mut self, duty: DutyCycle) -> Result<(), PwmError>;

    /// Disable the output and release the pin.
    fn stop(&mut self) -> Result<(), PwmError>;
}

impl<T: PwmOutput + ?Sized> PwmOutput for Box<T> {
    fn configure(&mut self, pin: PwmPin, frequency_hz: u32) -> Result<(), PwmError> {
        (**self).configure(pin, frequency_hz)
    }

    fn start(&mut self, duty: DutyCycle) -> Result<(), PwmError> {
        (**self).start(duty)
    }

    fn set_duty(&mut self, duty: DutyCycle) -> Result<(), PwmError> {
        (**self).set_duty(duty)
    }

    fn stop(&mut self) -> Result<(), PwmError> {
        (**self).stop()
    }
}

#[derive(Error, Debug)]
pub enum PwmError {
    #[error("PWM chip '{}' not found.", .0.display())]
    ChipNotFound(PathBuf),

    /// The channel directory did not appear after writing to `export`.
    #[error("Failed to export PWM channel '{}'.", .0.display())]
    ExportFailed(PathBuf),

    /// The period would round to zero nanoseconds.
    #[error("Invalid PWM frequency {0} Hz. The period must be at least 1 ns.")]
    InvalidFrequency(u32),

    #[error("PWM output used before being configured.")]
    NotConfigured,

    #[error("Failed to write '{}'. Error: {source}", .path.display())]
    FailedToWrite { path: PathBuf, source: io::Error },
}

/// A configured channel of a Linux sysfs PWM chip.
struct SysfsChannel {
    pin: PwmPin,
    chip_dir: PathBuf,
    channel_dir: PathBuf,
    period_ns: u64,
    exported: bool,
}

/// Drives a hardware PWM channel through the Linux PWM sysfs class
/// (`<root>/pwmchipN/pwmM/{period,duty_cycle,enable}`).
///
/// Only the configured channel is touched. On `stop` it is disabled and,
/// if this instance exported it, unexported again. Other channels on the
/// same chip keep running.
pub struct SysfsPwm {
    root: PathBuf,
    channel: Option<SysfsChannel>,
}

impl SysfsPwm {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            channel: None,
        }
    }

    fn channel(&self) -> Result<&SysfsChannel, PwmError> {
        self.channel.as_ref().ok_or(PwmError::NotConfigured)
    }
}

fn write_attribute(path: &Path, value: impl ToString) -> Result<(), PwmError> {
    let value = value.to_string();
    trace!("Writing '{}' to '{}'.", value, path.display());
    fs::write(path, value).map_err(|source| PwmError::FailedToWrite {
        path: path.to_path_buf(),
        source,
    })
}

fn period_ns(frequency_hz: u32) -> Result<u64, PwmError> {
    if frequency_hz == 0 {
        return Err(PwmError::InvalidFrequency(frequency_hz));
    }
    let period_ns = (NANOS_PER_SECOND / f64::from(frequency_hz)).round() as u64;
    if period_ns == 0 {
        return Err(PwmError::InvalidFrequency(frequency_hz));
    }
    Ok(period_ns)
}

impl SysfsChannel {
    fn write_duty(&self, duty: DutyCycle) -> Result<(), PwmError> {
        let duty_ns = ((self.period_ns as f64) * duty.fraction()).round() as u64;
        write_attribute(&self.channel_dir.join("duty_cycle"), duty_ns.min(self.period_ns))
    }

    fn write_period(&self) -> Result<(), PwmError> {
        // The kernel rejects a period shorter than the current duty cycle.
        write_attribute(&self.channel_dir.join("duty_cycle"), 0)?;
        write_attribute(&self.channel_dir.join("period"), self.period_ns)
    }

    /// Give the channel back to the kernel if this process exported it.
    fn unexport(&self) -> Result<(), PwmError> {
        if !self.exported {
            return Ok(());
        }
        write_attribute(&self.chip_dir.join("unexport"), self.pin.channel)?;
        debug!("Unexported PWM channel {}.", self.pin);
        Ok(())
    }

    /// Set the period. On failure a channel exported by this process is
    /// unexported again, since no guard exists yet to release it.
    fn initialize(&self) -> Result<(), PwmError> {
        let result = self.write_period();
        if result.is_err() {
            if let Err(e) = self.unexport() {
                error!("Failed to release PWM channel {}. Error: {}", self.pin, e);
            }
        }
        result
    }

    /// Disable the output and release it. Every step is attempted, and the
    /// first failure is reported.
    fn release(&self) -> Result<(), PwmError> {
        let duty = write_attribute(&self.channel_dir.join("duty_cycle"), 0);
        let enable = write_attribute(&self.channel_dir.join("enable"), 0);
        let unexport = self.unexport();
        duty.and(enable).and(unexport)
    }
}

impl PwmOutput for SysfsPwm {
    fn configure(&mut self, pin: PwmPin, frequency_hz: u32) -> Result<(), PwmError> {
        let period_ns = period_ns(frequency_hz)?;

        let chip_dir = self.root.join(format!("pwmchip{}", pin.chip));
        if !chip_dir.is_dir() {
            return Err(PwmError::ChipNotFound(chip_dir));
        }

        let channel_dir = chip_dir.join(format!("pwm{}", pin.channel));
        let exported = !channel_dir.is_dir();
        if exported {
            write_attribute(&chip_dir.join("export"), pin.channel)?;
            if !channel_dir.is_dir() {
                return Err(PwmError::ExportFailed(channel_dir));
            }
            debug!("Exported PWM channel {}.", pin);
        }

        let channel = SysfsChannel {
            pin,
            chip_dir,
            channel_dir,
            period_ns,
            exported,
        };
        channel.initialize()?;
        self.channel = Some(channel);
        Ok(())
    }

    fn start(&mut self, duty: DutyCycle) -> Result<(), PwmError> {
        let channel = self.channel()?;
        channel.write_duty(duty)?;
        write_attribute(&channel.channel_dir.join("enable"), 1)
    }

    fn set_duty(&mut self, duty: DutyCycle) -> Result<(), PwmError> {
        self.channel()?.write_duty(duty)
    }

    fn stop(&mut self) -> Result<(), PwmError> {
        self.channel
            .take()
            .ok_or(PwmError::NotConfigured)?
            .release()
    }
}

/// Stand-in for platforms without PWM hardware.
#[derive(Default)]
pub struct NullPwm;

impl PwmOutput for NullPwm {
    fn configure(&mut self, pin: PwmPin, frequency_hz: u32) -> Result<(), PwmError> {
        trace!("Null PWM configured on {} at {} Hz.", pin, frequency_hz);
        Ok(())
    }

    fn start(&mut self, duty: DutyCycle) -> Result<(), PwmError> {
        trace!("Null PWM started at {}.", duty);
        Ok(())
    }

    fn set_duty(&mut self, duty: DutyCycle) -> Result<(), PwmError> {
        trace!("Null PWM duty set to {}.", duty);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PwmError> {
        trace!("Null PWM stopped.");
        Ok(())
    }
}

/// Pick the sysfs backend if the configured chip exists, otherwise the
/// inert output.
pub fn detect_pwm_output(root: &Path, pin: PwmPin) -> Box<dyn PwmOutput> {
    let chip_dir = root.join(format!("pwmchip{}", pin.chip));
    if chip_dir.is_dir() {
        debug!("Using sysfs PWM chip at '{}'.", chip_dir.display());
        Box::new(SysfsPwm::new(root))
    } else {
        warn!(
            "No PWM chip at '{}'. Duty cycle changes will not reach hardware.",
            chip_dir.display()
        );
        Box::new(NullPwm)
    }
}

/// A running PWM output. Stops the output exactly once, either through
/// [`ActivePwm::stop`] or when dropped on an early return.
pub struct ActivePwm<P: PwmOutput> {
    output: P,
    stopped: bool,
}

impl<P: PwmOutput> ActivePwm<P> {
    /// Configure `output` and start it at 0% duty.
    pub fn start(mut output: P, pin: PwmPin, frequency_hz: u32) -> Result<Self, PwmError> {
        output.configure(pin, frequency_hz)?;
        let mut active = Self {
            output,
            stopped: false,
        };
        active.output.start(DutyCycle::OFF)?;
        Ok(active)
    }

    pub fn set_duty(&mut self, duty: DutyCycle) -> Result<(), PwmError> {
        self.output.set_duty(duty)
    }

    pub fn stop(mut self) -> Result<(), PwmError> {
        self.stopped = true;
        self.output.stop()
    }
}

impl<P: PwmOutput> Drop for ActivePwm<P> {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Err(e) = self.output.stop() {
            error!("Failed to stop PWM output. Error: {}", e);
        }
    }
}
