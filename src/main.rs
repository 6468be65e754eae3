use anyhow::Result;
use stream_monitor::{
    config::MonitorConfig,
    externals::{
        event_logging::task::task_control_event_logging,
        net_counters::services::detect_counter_source, pwm::services::detect_pwm_output,
    },
    system::task_bandwidth_monitor,
};
use tokio::{signal, sync::broadcast};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = MonitorConfig::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    let tracker = TaskTracker::new();

    let token = CancellationToken::new();

    let (tx_control_event, rx_control_event) = broadcast::channel(32);

    let source = detect_counter_source(&config.counters_path);
    let pwm = detect_pwm_output(&config.pwm_root, config.pin);

    let token_clone = token.clone();
    tracker.spawn(async move { task_control_event_logging(token_clone, rx_control_event).await });

    let token_clone = token.clone();
    let monitor = tracker.spawn(async move {
        task_bandwidth_monitor(token_clone, config, source, pwm, tx_control_event).await
    });

    tokio::select! {
        _ = token.cancelled() => {}
        _ = shutdown_signal() => {
            info!("Shutdown requested.");
            token.cancel();
        },
    }

    tracker.close();
    tracker.wait().await;

    monitor.await??;
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM. If a listener can't be installed the
/// process shuts down rather than running without a way to stop it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl_c. Error: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to listen for SIGTERM. Error: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
