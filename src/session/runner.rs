use super::controller::CameraSession;
use crate::camera::LensFacing;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// User input driving the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    SelectLens(LensFacing),
    FlipLens,
    ToggleTorch,
    Shutter,
    OpenGallery,
    Shutdown,
}

/// Drive `session` from `commands` until shutdown, then tear it down.
///
/// All session state changes happen on this task. Capture outcomes are
/// folded in as they arrive; a failing command is logged and the loop goes on.
pub async fn run_session(
    mut session: CameraSession,
    mut commands: mpsc::Receiver<SessionCommand>,
    cancellation_token: CancellationToken,
) -> CameraSession {
    info!("Camera session loop started");

    loop {
        tokio::select! {
            // User input
            command = commands.recv() => {
                match command {
                    Some(SessionCommand::Shutdown) => {
                        info!("Session shutdown requested");
                        break;
                    }
                    Some(command) => {
                        debug!("Session command: {:?}", command);
                        if let Err(e) = session.handle_command(command).await {
                            error!("Session command {:?} failed: {}", command, e);
                        }
                    }
                    None => {
                        info!("Command channel closed");
                        break;
                    }
                }
            }
            // Finished captures from the executor
            Some(outcome) = session.next_capture_outcome() => {
                session.handle_capture_outcome(outcome).await;
            }
            // Application shutdown
            _ = cancellation_token.cancelled() => {
                info!("Session cancelled");
                break;
            }
        }
    }

    // Release the camera before handing the session back
    session.teardown().await;
    session
}
