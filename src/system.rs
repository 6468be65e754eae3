use thiserror::Error;
use tokio::sync::broadcast::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{
    config::MonitorConfig,
    controls::{generate_control_event, reference_bytes, NoSuchInterface},
    externals::{
        net_counters::services::{CounterSource, CounterSourceError},
        pwm::services::{ActivePwm, PwmError, PwmOutput},
    },
    models::{control_event::ControlEvent, counter_snapshot::CounterSnapshot},
};

/// Fatal conditions that end the monitor task.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    NoSuchInterface(#[from] NoSuchInterface),

    #[error(transparent)]
    Counters(#[from] CounterSourceError),

    #[error(transparent)]
    Pwm(#[from] PwmError),
}

/// Task: Every update interval, sample the transmit counters of the
/// configured interface and drive the PWM output proportionally.
/// The PWM output is stopped exactly once on every exit path.
/// On a fatal error the shared token is cancelled so sibling tasks exit.
/// Can be cancelled between ticks.
#[tracing::instrument(skip_all, fields(interface = %config.interface))]
pub async fn task_bandwidth_monitor<S: CounterSource, P: PwmOutput>(
    token: CancellationToken,
    config: MonitorConfig,
    source: S,
    pwm: P,
    tx_control_event: Sender<ControlEvent>,
) -> Result<(), MonitorError> {
    info!("Started.");

    let result = monitor_loop(&token, &config, &source, pwm, &tx_control_event).await;
    if let Err(e) = &result {
        error!("{}", e);
        token.cancel();
    }
    result
}

async fn monitor_loop<S: CounterSource, P: PwmOutput>(
    token: &CancellationToken,
    config: &MonitorConfig,
    source: &S,
    pwm: P,
    tx_control_event: &Sender<ControlEvent>,
) -> Result<(), MonitorError> {
    let mut pwm = ActivePwm::start(pwm, config.pin, config.pwm_frequency_hz)?;
    info!(
        "pin={}, bytes/sec={}, pwm={}, update={:?}",
        config.pin,
        reference_bytes(config.bitrate, config.update_interval),
        config.pwm_frequency_hz,
        config.update_interval
    );

    let mut previous = source.snapshot()?;
    debug!(
        "Initial snapshot has interfaces: {:?}",
        previous.interface_names().collect::<Vec<_>>()
    );

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            _ = tokio::time::sleep(config.update_interval) => {}
        };

        let current = source.snapshot()?;
        business_logic(config, &previous, &current, &mut pwm, tx_control_event)?;
        previous = current;
    }

    pwm.stop()?;
    debug!("PWM output stopped.");
    Ok(())
}

/// Perform one tick: compute the control event, apply its duty cycle and
/// try to emit it.
#[tracing::instrument(skip_all)]
fn business_logic<P: PwmOutput>(
    config: &MonitorConfig,
    previous: &CounterSnapshot,
    current: &CounterSnapshot,
    pwm: &mut ActivePwm<P>,
    tx_control_event: &Sender<ControlEvent>,
) -> Result<(), MonitorError> {
    trace!("Executing business logic.");
    let event = generate_control_event(
        &config.interface,
        previous,
        current,
        config.bitrate,
        config.update_interval,
    )?;

    pwm.set_duty(event.duty_cycle)?;
    debug!("Set duty cycle to {}.", event.duty_cycle);

    if let Err(e) = tx_control_event.send(event) {
        warn!("Failed to broadcast control event. Error: {}", e);
    }
    Ok(())
}
