mod controller;
mod preview;
mod stats;

pub use controller::{render_status_line, DisplayController};
pub use preview::{PreviewStats, TerminalPreview};
pub use stats::DisplayStats;
