//! Wall clock abstraction and elapsed-time formatting.
//!
//! `std::time::SystemTime::now` is unavailable on `wasm32-unknown-unknown`, so
//! everything that needs the time of day (conversion timing, archive names)
//! reads it through [`Clock`]. The browser binding supplies a clock backed by
//! `Date.now()`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current time as milliseconds since the Unix epoch.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Duration between two clock readings, saturating at zero.
pub fn elapsed_between(start_ms: f64, end_ms: f64) -> Duration {
    let millis = (end_ms - start_ms).max(0.0);
    Duration::from_micros((millis * 1000.0).round() as u64)
}

/// Format a duration compactly for status tooltips.
///
/// Sub-second values print as whole milliseconds, values under a minute as
/// seconds with one decimal, longer values as minutes and whole seconds.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_elapsed(Duration::from_millis(850)), "850ms");
/// assert_eq!(format_elapsed(Duration::from_millis(1240)), "1.2s");
/// assert_eq!(format_elapsed(Duration::from_secs(125)), "2m 5s");
/// ```
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        return format!("{}ms", millis);
    }

    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        return format!("{:.1}s", secs);
    }

    let whole = elapsed.as_secs();
    let (minutes, seconds) = (whole / 60, whole % 60);
    if minutes < 60 {
        return format!("{}m {}s", minutes, seconds);
    }
    format!("{}h {}m {}s", minutes / 60, minutes % 60, seconds)
}
