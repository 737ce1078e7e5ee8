mod executor;
mod naming;
mod routine;
mod stats;
#[cfg(test)]
mod tests;

pub use executor::{CaptureExecutor, CaptureJob};
pub use naming::{Clock, FixedClock, PhotoNaming, SystemClock, TimestampZone, PHOTO_EXTENSION};
pub use routine::{take_photo, CaptureCallbacks};
pub use stats::CaptureStats;
