use crate::config::CaptureConfig;
use crate::error::CaptureError;
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::fmt::Write;
use std::sync::Arc;
use tracing::warn;

pub const PHOTO_EXTENSION: &str = "jpg";

/// Wall-clock source for photo timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a settable instant
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Zone photo timestamps are rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampZone {
    Local,
    Named(Tz),
}

impl TimestampZone {
    /// "local" or an IANA name; unknown names fall back to local time
    pub fn resolve(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("local") {
            return TimestampZone::Local;
        }

        match name.trim().parse::<Tz>() {
            Ok(tz) => TimestampZone::Named(tz),
            Err(_) => {
                warn!(
                    "Invalid timestamp timezone '{}', falling back to local time",
                    name
                );
                TimestampZone::Local
            }
        }
    }
}

/// Derives photo filenames from a strftime pattern and the clock
#[derive(Clone)]
pub struct PhotoNaming {
    format: String,
    zone: TimestampZone,
    clock: Arc<dyn Clock>,
}

impl PhotoNaming {
    pub fn new(format: impl Into<String>, zone: TimestampZone) -> Self {
        Self {
            format: format.into(),
            zone,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            config.filename_format.clone(),
            TimestampZone::resolve(&config.timestamp_timezone),
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn zone(&self) -> TimestampZone {
        self.zone
    }

    /// `<formatted now>.jpg`
    pub fn file_name(&self) -> Result<String, CaptureError> {
        self.file_name_at(self.clock.now())
    }

    pub fn file_name_at(&self, instant: DateTime<Utc>) -> Result<String, CaptureError> {
        let mut name = String::new();
        let rendered = match self.zone {
            TimestampZone::Local => write!(
                name,
                "{}",
                instant.with_timezone(&Local).format(&self.format)
            ),
            TimestampZone::Named(tz) => {
                write!(name, "{}", instant.with_timezone(&tz).format(&self.format))
            }
        };

        if rendered.is_err() || name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(CaptureError::InvalidFilenameFormat {
                format: self.format.clone(),
            });
        }

        name.push('.');
        name.push_str(PHOTO_EXTENSION);
        Ok(name)
    }
}

impl std::fmt::Debug for PhotoNaming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoNaming")
            .field("format", &self.format)
            .field("zone", &self.zone)
            .finish()
    }
}
