//! Flash LED control through Linux sysfs.
//!
//! A torch LED is a directory such as `/sys/class/leds/white:flash` holding a
//! `max_brightness` and a writable `brightness` file.

use crate::error::CameraError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SYSFS_LEDS_DIR: &str = "/sys/class/leds";

#[derive(Debug, Clone)]
pub struct TorchLed {
    path: PathBuf,
    name: String,
    max_brightness: u32,
}

impl TorchLed {
    /// Open the LED at `path`, verifying it can be driven
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        let path = path.as_ref().to_path_buf();
        let max_brightness_path = path.join("max_brightness");

        let raw = std::fs::read_to_string(&max_brightness_path).map_err(|e| {
            CameraError::Torch {
                details: format!("cannot read {}: {}", max_brightness_path.display(), e),
            }
        })?;

        let max_brightness = match raw.trim().parse::<u32>() {
            Ok(v) if v > 0 => v,
            _ => {
                return Err(CameraError::Torch {
                    details: format!(
                        "invalid max_brightness '{}' in {}",
                        raw.trim(),
                        max_brightness_path.display()
                    ),
                })
            }
        };

        let brightness_path = path.join("brightness");
        std::fs::OpenOptions::new()
            .write(true)
            .open(&brightness_path)
            .map_err(|e| CameraError::Torch {
                details: format!("cannot write {}: {}", brightness_path.display(), e),
            })?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("led")
            .to_string();

        info!(name = %name, max_brightness, "Opened torch LED");
        Ok(Self {
            path,
            name,
            max_brightness,
        })
    }

    /// First usable `*:flash` LED under `leds_dir`, by name
    pub fn discover_in(leds_dir: impl AsRef<Path>) -> Option<Self> {
        let leds_dir = leds_dir.as_ref();
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!("Cannot read {}, torch discovery skipped", leds_dir.display());
            return None;
        };

        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(":flash"))
            })
            .collect();
        candidates.sort();

        candidates.into_iter().find_map(|path| match Self::open(&path) {
            Ok(led) => Some(led),
            Err(e) => {
                warn!("Skipping torch LED: {}", e);
                None
            }
        })
    }

    /// Resolve a configured LED: an explicit path, or "auto" to scan sysfs
    pub fn from_setting(setting: &str) -> Result<Option<Self>, CameraError> {
        if setting.eq_ignore_ascii_case("auto") {
            return Ok(Self::discover_in(SYSFS_LEDS_DIR));
        }
        Self::open(setting).map(Some)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_brightness(&self) -> u32 {
        self.max_brightness
    }

    /// Full brightness when enabled, off otherwise
    pub async fn set(&self, enabled: bool) -> Result<(), CameraError> {
        let value = if enabled { self.max_brightness } else { 0 };
        let brightness_path = self.path.join("brightness");

        tokio::fs::write(&brightness_path, value.to_string())
            .await
            .map_err(|e| CameraError::Torch {
                details: format!("cannot write {}: {}", brightness_path.display(), e),
            })?;

        debug!(name = %self.name, value, "Torch brightness set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_led(root: &Path, name: &str, max: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("max_brightness"), max).unwrap();
        std::fs::write(dir.join("brightness"), "0").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_open_and_toggle() {
        let temp = TempDir::new().unwrap();
        let dir = fake_led(temp.path(), "white:flash", "255\n");

        let led = TorchLed::open(&dir).unwrap();
        assert_eq!(led.name(), "white:flash");
        assert_eq!(led.max_brightness(), 255);

        led.set(true).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("brightness")).unwrap(), "255");

        led.set(false).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("brightness")).unwrap(), "0");
    }

    #[tokio::test]
    async fn test_set_fails_when_led_disappears() {
        let temp = TempDir::new().unwrap();
        let dir = fake_led(temp.path(), "white:flash", "1");
        let led = TorchLed::open(&dir).unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(
            led.set(true).await,
            Err(CameraError::Torch { .. })
        ));
    }

    #[test]
    fn test_open_rejects_zero_max_brightness() {
        let temp = TempDir::new().unwrap();
        let dir = fake_led(temp.path(), "white:flash", "0");

        assert!(matches!(
            TorchLed::open(&dir),
            Err(CameraError::Torch { .. })
        ));
    }

    #[test]
    fn test_open_missing_directory() {
        let temp = TempDir::new().unwrap();
        assert!(TorchLed::open(temp.path().join("absent:flash")).is_err());
    }

    #[test]
    fn test_discover_picks_first_flash_led() {
        let temp = TempDir::new().unwrap();
        fake_led(temp.path(), "status:green", "1");
        fake_led(temp.path(), "yellow:flash", "10");
        fake_led(temp.path(), "white:flash", "20");

        let led = TorchLed::discover_in(temp.path()).unwrap();
        assert_eq!(led.name(), "white:flash");
    }

    #[test]
    fn test_discover_skips_broken_entries() {
        let temp = TempDir::new().unwrap();
        fake_led(temp.path(), "a:flash", "garbage");
        fake_led(temp.path(), "b:flash", "5");

        let led = TorchLed::discover_in(temp.path()).unwrap();
        assert_eq!(led.name(), "b:flash");
    }

    #[test]
    fn test_discover_empty() {
        let temp = TempDir::new().unwrap();
        assert!(TorchLed::discover_in(temp.path()).is_none());
        assert!(TorchLed::discover_in(temp.path().join("missing")).is_none());
    }
}
