use std::time::SystemTime;

/// Terminal display statistics
#[derive(Debug, Clone, Default)]
pub struct DisplayStats {
    pub renders: u64,
    pub render_errors: u64,
    pub events_handled: u64,
    pub last_render_time: Option<SystemTime>,
}

impl DisplayStats {
    pub fn record_render(&mut self) {
        self.renders += 1;
        self.last_render_time = Some(SystemTime::now());
    }

    pub fn record_render_error(&mut self) {
        self.render_errors += 1;
        self.last_render_time = Some(SystemTime::now());
    }

    pub fn record_event(&mut self) {
        self.events_handled += 1;
    }

    pub fn render_success_rate(&self) -> f64 {
        let attempts = self.renders + self.render_errors;
        if attempts == 0 {
            0.0
        } else {
            self.renders as f64 / attempts as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
