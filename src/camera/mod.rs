mod backend;
mod builder;
#[cfg(all(feature = "gstreamer", target_os = "linux"))]
mod gstreamer_backend;
mod lifecycle;
mod provider;
mod torch;
mod types;
mod use_cases;
mod virtual_camera;

pub use backend::{CameraBackend, CameraDevice};
pub use builder::CameraBackendBuilder;
#[cfg(all(feature = "gstreamer", target_os = "linux"))]
pub use gstreamer_backend::{GstCameraBackend, GstCameraDevice};
pub use lifecycle::Lifecycle;
pub use provider::{
    acquire_provider, Camera, ProcessCameraProvider, ProcessProviderSource, ProviderListener,
    ProviderSource,
};
pub use torch::TorchLed;
pub use types::{CameraInfo, LensFacing};
pub use use_cases::{CaptureEndpoint, ImageCapture, Preview, PreviewSurface};
pub use virtual_camera::{VirtualCameraBackend, VirtualCameraDevice};
