use super::{ComponentState, ShutdownReason, SnapcamApp};
use crate::error::{Result, SnapcamError};
use crate::events::SnapcamEvent;
use crate::session::SessionCommand;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Upper bound on draining queued captures and releasing the camera
const SESSION_STOP_TIMEOUT: Duration = Duration::from_secs(15);

impl SnapcamApp {
    /// Stop all components; returns the process exit code
    pub async fn shutdown(&mut self, reason: ShutdownReason) -> Result<i32> {
        info!("Beginning graceful shutdown ({})", reason);

        let _ = self
            .event_bus
            .publish(SnapcamEvent::ShutdownRequested {
                timestamp: SystemTime::now(),
                reason: reason.to_string(),
            })
            .await;

        let mut exit_code = match reason {
            ShutdownReason::Error(_) => 1,
            _ => 0,
        };

        // Stop input first so no commands arrive behind the shutdown
        if self.keyboard_enabled {
            if let Err(e) = self.stop_keyboard().await {
                error!("Error stopping keyboard: {}", e);
                exit_code = 1;
            }
        }

        if let Err(e) = self.stop_session().await {
            error!("Error stopping session: {}", e);
            exit_code = 1;
        }

        // The display goes last so it shows the final session state
        if self.display_enabled {
            if let Err(e) = self.stop_display().await {
                error!("Error stopping display: {}", e);
                exit_code = 1;
            }
        }

        self.cancellation_token.cancel();

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_keyboard(&mut self) -> Result<()> {
        let Some(keyboard) = &self.keyboard_handler else {
            return Ok(());
        };

        info!("Stopping keyboard component");
        self.set_component_state("keyboard", ComponentState::Stopping)
            .await;

        match keyboard.stop().await {
            Ok(()) => {
                self.set_component_state("keyboard", ComponentState::Stopped)
                    .await;
                Ok(())
            }
            Err(e) => {
                self.set_component_state("keyboard", ComponentState::Failed)
                    .await;
                Err(e)
            }
        }
    }

    async fn stop_session(&mut self) -> Result<()> {
        info!("Stopping session component");
        self.set_component_state("session", ComponentState::Stopping)
            .await;

        let Some(mut task) = self.session_task.take() else {
            // Never started; the worker still has to be released
            if let Some(mut session) = self.session.take() {
                session.teardown().await;
            }
            self.set_component_state("session", ComponentState::Stopped)
                .await;
            return Ok(());
        };

        // Queued after any pending commands so in-flight shutter presses finish
        if self.command_tx.send(SessionCommand::Shutdown).await.is_err() {
            info!("Session loop already finished");
        }

        let result = match timeout(SESSION_STOP_TIMEOUT, &mut task).await {
            Ok(Ok(session)) => {
                self.captured_images = session.captured_images().to_vec();
                info!(
                    "Session stopped with {} photo(s) saved",
                    self.captured_images.len()
                );
                Ok(())
            }
            Ok(Err(e)) => Err(SnapcamError::component(
                "session".to_string(),
                format!("session task failed: {}", e),
            )),
            Err(_) => {
                warn!("Session did not stop in time, cancelling");
                self.cancellation_token.cancel();
                task.abort();
                Err(SnapcamError::component("session", "session stop timeout"))
            }
        };

        let state = if result.is_ok() {
            ComponentState::Stopped
        } else {
            ComponentState::Failed
        };
        self.set_component_state("session", state).await;
        result
    }

    async fn stop_display(&mut self) -> Result<()> {
        let Some(display) = &self.display else {
            return Ok(());
        };

        info!("Stopping display component");
        self.set_component_state("display", ComponentState::Stopping)
            .await;

        match timeout(Duration::from_secs(5), display.stop()).await {
            Ok(Ok(())) => {
                self.set_component_state("display", ComponentState::Stopped)
                    .await;
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state("display", ComponentState::Failed)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.set_component_state("display", ComponentState::Failed)
                    .await;
                Err(SnapcamError::component("display", "display stop timeout"))
            }
        }
    }
}
