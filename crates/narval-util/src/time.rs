//! Time utilities for narval
//!
//! Lifecycle enforcement (startup grace, idle shutdown, max session) runs on
//! monotonic time so that wall-clock adjustments on the host never shorten
//! or extend a session. Wall-clock time is only used for display.

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// Get the current local time (for display and logging only).
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Format a DateTime for display with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Wall-clock time at which a monotonic deadline will be reached.
pub fn wall_clock_at(deadline: MonotonicInstant) -> DateTime<Local> {
    let remaining = deadline.saturating_duration_until(MonotonicInstant::now());
    let current = now();
    chrono::Duration::from_std(remaining)
        .ok()
        .and_then(|delta| current.checked_add_signed(delta))
        .unwrap_or(current)
}

/// Represents a point in monotonic time for countdown enforcement.
/// This is immune to wall-clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }

    pub fn duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.duration_since(earlier.0)
    }

    pub fn checked_add(&self, duration: Duration) -> Option<MonotonicInstant> {
        self.0.checked_add(duration).map(MonotonicInstant)
    }

    /// Adds a duration, saturating at a far-future instant on overflow.
    pub fn saturating_add(&self, duration: Duration) -> MonotonicInstant {
        self.checked_add(duration).unwrap_or_else(|| {
            self.checked_add(Duration::from_secs(100 * 365 * 24 * 3600))
                .unwrap_or(*self)
        })
    }

    /// Returns duration until `self`, or zero if `self` is in the past
    pub fn saturating_duration_until(&self, from: MonotonicInstant) -> Duration {
        if self.0 > from.0 {
            self.0.duration_since(from.0)
        } else {
            Duration::ZERO
        }
    }
}

impl std::ops::Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
