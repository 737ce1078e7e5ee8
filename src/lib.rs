pub mod app;
pub mod camera;
pub mod capture;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod frame;
pub mod keyboard_input;
pub mod session;

pub use app::{ComponentState, ShutdownReason, SnapcamApp};
pub use camera::{
    acquire_provider, Camera, CameraBackend, CameraBackendBuilder, CameraDevice, CameraInfo,
    CaptureEndpoint, ImageCapture, LensFacing, Lifecycle, Preview, PreviewSurface,
    ProcessCameraProvider, ProcessProviderSource, ProviderListener, ProviderSource,
};
pub use capture::{take_photo, CaptureCallbacks, CaptureExecutor, CaptureStats, PhotoNaming};
pub use config::SnapcamConfig;
pub use display::{DisplayController, TerminalPreview};
pub use error::{Result, SnapcamError};
pub use events::{EventBus, EventFilter, EventReceiver, SnapcamEvent};
pub use frame::{FrameData, FrameFormat};
pub use keyboard_input::KeyboardInputHandler;
pub use session::{run_session, CameraSession, CameraSessionBuilder, SessionCommand};
