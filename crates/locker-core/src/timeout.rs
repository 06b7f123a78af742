//! Deadline helpers for bounded waits.

use std::time::Duration;

use tokio::time::Instant;

/// Stand-in for "never" when a duration does not fit on the clock (about 30
/// years, the same horizon tokio uses for its far-future instant).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + duration`, saturating to a far-future instant instead of
/// overflowing.
///
/// Lets callers pass `Duration::MAX` for "no limit" in any lease or wait
/// setting.
pub fn instant_after(from: Instant, duration: Duration) -> Instant {
    from.checked_add(duration)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// A point in time after which a blocking operation must give up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Starts a deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: instant_after(Instant::now(), budget),
            budget,
        }
    }

    /// The total time this deadline allowed.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Strictly past the deadline; an attempt made exactly at it still counts.
    pub fn has_passed(&self) -> bool {
        Instant::now() > self.at
    }

    /// Time left before the deadline, zero once it has been reached.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Caps `step` so a sleep never overshoots the deadline.
    pub fn clamp(&self, step: Duration) -> Duration {
        step.min(self.remaining())
    }
}
