use std::time::{Duration, Instant};

/// Format elapsed seconds as `H:MM:SS.ss`.
///
/// Hours are not wrapped at 24. Negative and non-finite inputs format as zero.
pub fn hms_string(sec_elapsed: f64) -> String {
    let secs = if sec_elapsed.is_finite() { sec_elapsed.max(0.0) } else { 0.0 };
    let h = (secs / 3600.0).floor();
    let m = ((secs % 3600.0) / 60.0).floor();
    let s = secs % 60.0;
    format!("{}:{:02}:{:05.2}", h as u64, m as u64, s)
}

/// Wall-clock timer for a training run.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Timer { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time formatted by [`hms_string`].
    pub fn elapsed_hms(&self) -> String {
        hms_string(self.elapsed().as_secs_f64())
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}
