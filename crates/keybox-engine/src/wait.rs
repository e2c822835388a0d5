//! Deadline-bounded polling.
//!
//! Every wait in the engine is a [`BoundedWait`]: a deadline plus a poll
//! interval. Callers check their condition, then call [`BoundedWait::tick`]
//! until it reports the deadline has passed. Time comes from
//! [`tokio::time`], so tests drive these waits with a paused clock.
//!
//! ```
//! use keybox_engine::wait::BoundedWait;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let mut wait = BoundedWait::new(Duration::from_millis(300), Duration::from_millis(100));
//! let mut polls = 1;
//! while wait.tick().await {
//!     polls += 1;
//! }
//! assert_eq!(polls, 4);
//! # }
//! ```

use std::time::Duration;
use tokio::time::Instant;

/// A deadline with a poll interval.
#[derive(Debug, Clone)]
pub struct BoundedWait {
    deadline: Instant,
    interval: Duration,
}

impl BoundedWait {
    /// Start a wait of at most `limit`, polling every `interval`.
    pub fn new(limit: Duration, interval: Duration) -> Self {
        Self {
            deadline: Instant::now() + limit,
            interval,
        }
    }

    /// Returns `true` once the deadline has passed.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time left until the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Sleep until the next poll.
    ///
    /// Returns `false` without sleeping if the deadline has already passed.
    /// The last sleep is shortened so it never overshoots the deadline.
    pub async fn tick(&mut self) -> bool {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return false;
        }
        tokio::time::sleep(self.interval.min(remaining)).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tick_stops_at_deadline() {
        let started = Instant::now();
        let mut wait = BoundedWait::new(Duration::from_millis(250), Duration::from_millis(100));

        let mut ticks = 0;
        while wait.tick().await {
            ticks += 1;
        }

        assert_eq!(ticks, 3);
        assert_eq!(started.elapsed(), Duration::from_millis(250));
        assert!(wait.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limit_never_sleeps() {
        let started = Instant::now();
        let mut wait = BoundedWait::new(Duration::ZERO, Duration::from_millis(100));

        assert!(!wait.tick().await);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let wait = BoundedWait::new(Duration::from_secs(2), Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(wait.remaining(), Duration::from_millis(1500));
        assert!(!wait.expired());
    }
}
