use super::{ShutdownReason, SnapcamApp};
use crate::error::{Result, SnapcamError};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

type ShutdownSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl SnapcamApp {
    /// Run until a signal arrives or the session ends, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("Snapcam is running");

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| SnapcamError::system("Shutdown receiver already taken"))?;

        setup_signal_handlers(Arc::clone(&self.shutdown_sender));

        // Wait for shutdown signal
        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| SnapcamError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {}", shutdown_reason);

        let exit_code = self.shutdown(shutdown_reason).await?;

        info!("Snapcam shutdown complete");
        Ok(exit_code)
    }

    /// Ask `run` to shut down. Only the first request counts.
    pub async fn request_shutdown(&self, reason: ShutdownReason) -> bool {
        send_shutdown(&self.shutdown_sender, reason).await
    }
}

async fn send_shutdown(sender: &ShutdownSender, reason: ShutdownReason) -> bool {
    match sender.lock().await.take() {
        Some(sender) => sender.send(reason).is_ok(),
        None => false,
    }
}

fn setup_signal_handlers(shutdown_sender: ShutdownSender) {
    // Handle SIGTERM (systemd stop) - Unix only
    #[cfg(unix)]
    {
        let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to register SIGTERM handler: {}", e);
                    return;
                }
            };

            if sigterm.recv().await.is_some() {
                info!("Received SIGTERM signal");
                send_shutdown(
                    &shutdown_sender_sigterm,
                    ShutdownReason::Signal("SIGTERM".to_string()),
                )
                .await;
            }
        });
    }

    // Handle SIGINT (Ctrl+C) - Cross-platform
    tokio::spawn(async move {
        if let Ok(()) = signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            send_shutdown(
                &shutdown_sender,
                ShutdownReason::Signal("SIGINT".to_string()),
            )
            .await;
        }
    });
}
