mod controller;
mod runner;
mod state;
#[cfg(test)]
mod tests;

pub use controller::{CameraSession, CameraSessionBuilder, CaptureOutcome};
pub use runner::{run_session, SessionCommand};
pub use state::{BindingState, ControlsView, SessionState, TorchIcon};
