use std::io::{self, Write};

use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::models::control_event::ControlEvent;

/// Task: Write one status line to stdout for every control event.
/// Events already queued are drained before a cancellation is honoured.
/// Can be cancelled.
#[tracing::instrument(skip_all)]
pub async fn task_control_event_logging(
    token: CancellationToken,
    mut rx_control_event: Receiver<ControlEvent>,
) {
    info!("Started.");
    loop {
        tokio::select! {
            biased;
            result = rx_control_event.recv() => match result {
                Ok(event) => {
                    let written = write_status_line(&mut io::stdout().lock(), &event);
                    if let Err(e) = written {
                        error!("Failed to write status line. Error: {}", e);
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Status output fell behind. Skipped {} events.", skipped);
                },
                Err(RecvError::Closed) => {
                    info!("Control event channel closed.");
                    break;
                },
            },
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
        };
    }
}

/// Write a single status line and flush it.
pub fn write_status_line(out: &mut impl Write, event: &ControlEvent) -> io::Result<()> {
    writeln!(out, "{}", event)?;
    out.flush()
}
