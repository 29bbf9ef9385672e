use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancelation` once the process is asked to stop: ctrl-c everywhere, SIGTERM on unix.
///
/// On Windows detached processes can't detect signals sent to them, `focusgate stop` kills them
/// instead.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to listen for SIGTERM {e:?}");
                wait_for_ctrl_c().await;
                cancelation.cancel();
                return;
            }
        };
        tokio::select! {
            _ = wait_for_ctrl_c() => info!("Received ctrl-c"),
            _ = terminate.recv() => info!("Received SIGTERM"),
            _ = cancelation.cancelled() => return,
        };
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = wait_for_ctrl_c() => info!("Received ctrl-c"),
            _ = cancelation.cancelled() => return,
        };
    }
    cancelation.cancel();
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c {e:?}");
        std::future::pending::<()>().await;
    }
}
