use super::{ComponentState, ShutdownReason, SnapcamApp};
use crate::error::{Result, SnapcamError};
use crate::session::run_session;
use std::sync::Arc;
use tracing::{error, info, warn};

impl SnapcamApp {
    /// Register all components as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing Snapcam components");

        let mut states = self.component_states.lock().await;
        states.insert("session".to_string(), ComponentState::Stopped);

        if self.display_enabled {
            states.insert("display".to_string(), ComponentState::Stopped);
        }

        // Only register keyboard component if enabled
        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the display, bind the initial lens and run the session loop
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting Snapcam");

        // The display subscribes first so it sees the initial binding
        if self.display_enabled {
            if let Some(display) = &self.display {
                self.set_component_state("display", ComponentState::Starting)
                    .await;
                display.start(&self.event_bus).await?;
                self.set_component_state("display", ComponentState::Running)
                    .await;
            }
        }

        self.start_session().await?;

        if self.keyboard_enabled {
            if let Some(keyboard) = &self.keyboard_handler {
                self.set_component_state("keyboard", ComponentState::Starting)
                    .await;
                match keyboard.start().await {
                    Ok(()) => {
                        self.set_component_state("keyboard", ComponentState::Running)
                            .await;
                    }
                    Err(e) => {
                        // The app can still be stopped with a signal
                        warn!("Keyboard input unavailable: {}", e);
                        self.set_component_state("keyboard", ComponentState::Failed)
                            .await;
                    }
                }
            }
        }

        info!("Snapcam started");
        Ok(())
    }

    async fn start_session(&mut self) -> Result<()> {
        let mut session = self
            .session
            .take()
            .ok_or_else(|| SnapcamError::system("Camera session already started"))?;
        let commands = self
            .command_rx
            .take()
            .ok_or_else(|| SnapcamError::system("Session command channel already taken"))?;

        self.set_component_state("session", ComponentState::Starting)
            .await;

        match session.start().await {
            Ok(()) => {}
            Err(SnapcamError::Camera(e)) => {
                // Unbound sessions stay usable: selecting a lens retries the bind
                error!("Initial camera bind failed: {}", e);
            }
            Err(e) => {
                error!("Failed to start camera session: {}", e);
                self.set_component_state("session", ComponentState::Failed)
                    .await;
                session.teardown().await;
                return Err(e);
            }
        }

        let cancellation_token = self.cancellation_token.child_token();
        let shutdown_sender = Arc::clone(&self.shutdown_sender);

        self.session_task = Some(tokio::spawn(async move {
            let session = run_session(session, commands, cancellation_token).await;

            // A session that ends on its own (quit key) takes the app down with it
            if let Some(sender) = shutdown_sender.lock().await.take() {
                let _ = sender.send(ShutdownReason::UserRequest);
            }
            session
        }));

        self.set_component_state("session", ComponentState::Running)
            .await;
        info!("Camera session started");
        Ok(())
    }
}
