use crate::camera::LensFacing;
use crate::error::Result;
use crate::session::SessionCommand;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Key bindings for the camera controls
pub fn command_for_key(code: KeyCode) -> Option<SessionCommand> {
    match code {
        KeyCode::Char(' ') | KeyCode::Enter => Some(SessionCommand::Shutter),
        KeyCode::Char('f') | KeyCode::Tab => Some(SessionCommand::FlipLens),
        KeyCode::Char('t') => Some(SessionCommand::ToggleTorch),
        KeyCode::Char('g') => Some(SessionCommand::OpenGallery),
        KeyCode::Char('b') => Some(SessionCommand::SelectLens(LensFacing::Back)),
        KeyCode::Char('s') => Some(SessionCommand::SelectLens(LensFacing::Front)),
        KeyCode::Char('q') | KeyCode::Esc => Some(SessionCommand::Shutdown),
        _ => None,
    }
}

/// Turns terminal key presses into session commands
pub struct KeyboardInputHandler {
    commands: mpsc::Sender<SessionCommand>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(commands: mpsc::Sender<SessionCommand>) -> Self {
        Self {
            commands,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input: SPACE shutter, f flip, t torch, g gallery, q quit");

        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard handler active");

            loop {
                // Check for shutdown between polls
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                // Short poll so cancellation is noticed promptly
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        // Ignore repeats and releases
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        let Some(command) = command_for_key(key_event.code) else {
                            debug!("Unbound key pressed: {:?}", key_event.code);
                            continue;
                        };

                        // Forward to the session task
                        debug!("Key {:?} -> {:?}", key_event.code, command);
                        if commands.blocking_send(command).is_err() {
                            debug!("Session is gone, keyboard handler exiting");
                            break;
                        }

                        if command == SessionCommand::Shutdown {
                            info!("Quit key pressed - requesting shutdown");
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            // Restore the terminal
            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the polling thread a moment to restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}
