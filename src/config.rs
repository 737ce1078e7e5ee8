use crate::camera::LensFacing;
use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SnapcamConfig {
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendKind {
    /// Synthetic frames, no hardware required
    Virtual,
    /// V4L2 devices through GStreamer (requires the `gstreamer` feature)
    Gstreamer,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Which camera backend the provider creates
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackendKind,

    /// Lens bound when the session starts
    #[serde(default = "default_initial_lens")]
    pub initial_lens: LensFacing,

    /// V4L2 device index of the back-facing camera
    #[serde(default = "default_back_index")]
    pub back_index: u32,

    /// V4L2 device index of the front-facing camera
    #[serde(default = "default_front_index")]
    pub front_index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Sysfs LED directory driven as the torch, or "auto" to scan /sys/class/leds
    #[serde(default)]
    pub torch_led: Option<String>,

    /// Lenses the virtual backend reports a flash unit for
    #[serde(default = "default_virtual_flash_lenses")]
    pub virtual_flash_lenses: Vec<LensFacing>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Output directory for photos; the platform pictures directory when unset
    #[serde(default)]
    pub path: Option<String>,

    /// strftime pattern the photo filename is rendered from
    #[serde(default = "default_filename_format")]
    pub filename_format: String,

    /// "local" or an IANA timezone name used when rendering filenames
    #[serde(default = "default_timestamp_timezone")]
    pub timestamp_timezone: String,

    /// JPEG quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Read key presses from the terminal
    #[serde(default = "default_keyboard_controls")]
    pub keyboard_controls: bool,
}

impl CameraConfig {
    /// Device index for the given lens
    pub fn device_index(&self, lens: LensFacing) -> u32 {
        match lens {
            LensFacing::Back => self.back_index,
            LensFacing::Front => self.front_index,
        }
    }
}

impl CaptureConfig {
    /// Resolve the directory photos are written to
    pub fn output_directory(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => dirs::picture_dir().unwrap_or_else(|| PathBuf::from(default_capture_path())),
        }
    }
}

impl SnapcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("snapcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.backend", "virtual")?
            .set_default("camera.initial_lens", default_initial_lens().as_str())?
            .set_default("camera.back_index", default_back_index())?
            .set_default("camera.front_index", default_front_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default(
                "camera.virtual_flash_lenses",
                default_virtual_flash_lenses()
                    .iter()
                    .map(|lens| lens.as_str())
                    .collect::<Vec<_>>(),
            )?
            .set_default("capture.filename_format", default_filename_format())?
            .set_default("capture.timestamp_timezone", default_timestamp_timezone())?
            .set_default("capture.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.keyboard_controls", default_keyboard_controls())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with SNAPCAM_ prefix, e.g. SNAPCAM_CAMERA__FPS
            .add_source(
                Environment::with_prefix("SNAPCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: SnapcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        validate_filename_format(&self.capture.filename_format)?;

        if self.capture.jpeg_quality == 0 || self.capture.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Capture jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Reject strftime patterns chrono cannot render or that would produce path separators
fn validate_filename_format(format: &str) -> Result<(), ConfigError> {
    if format.trim().is_empty() {
        return Err(ConfigError::Message(
            "Capture filename_format must not be empty".to_string(),
        ));
    }

    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::Message(format!(
            "Capture filename_format '{}' is not a valid strftime pattern",
            format
        )));
    }

    let sample = Utc::now();
    let mut rendered = String::new();
    if write!(rendered, "{}", sample.format(format)).is_err() {
        return Err(ConfigError::Message(format!(
            "Capture filename_format '{}' could not be rendered",
            format
        )));
    }

    if rendered.contains('/') || rendered.contains('\\') {
        return Err(ConfigError::Message(format!(
            "Capture filename_format '{}' must not produce path separators",
            format
        )));
    }

    Ok(())
}

impl Default for SnapcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            capture: CaptureConfig::default(),
            system: SystemConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: default_camera_backend(),
            initial_lens: default_initial_lens(),
            back_index: default_back_index(),
            front_index: default_front_index(),
            resolution: default_camera_resolution(),
            fps: default_camera_fps(),
            torch_led: None,
            virtual_flash_lenses: default_virtual_flash_lenses(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            path: None,
            filename_format: default_filename_format(),
            timestamp_timezone: default_timestamp_timezone(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
            keyboard_controls: default_keyboard_controls(),
        }
    }
}

// Default value functions
fn default_camera_backend() -> CameraBackendKind {
    CameraBackendKind::Virtual
}
fn default_initial_lens() -> LensFacing {
    LensFacing::Back
}
fn default_back_index() -> u32 {
    0
}
fn default_front_index() -> u32 {
    1
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_virtual_flash_lenses() -> Vec<LensFacing> {
    vec![LensFacing::Back]
}

fn default_capture_path() -> String {
    "./captures".to_string()
}
fn default_filename_format() -> String {
    "%Y-%m-%d-%H-%M-%S-%3f".to_string()
}
fn default_timestamp_timezone() -> String {
    "local".to_string()
}
fn default_jpeg_quality() -> u8 {
    90
}

fn default_event_bus_capacity() -> usize {
    100
}
fn default_keyboard_controls() -> bool {
    true
}
