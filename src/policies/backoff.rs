//! # Tiered restart backoff.
//!
//! [`RestartBackoff`] decides how long a leader waits before restarting a task
//! that yielded (returned without error). The delay depends only on the number
//! of consecutive restarts:
//!
//! ```text
//! restarts <  medium_after            → base
//! medium_after <= restarts < long_after → medium
//! restarts >= long_after               → long
//! ```
//!
//! Jitter is applied to the selected tier. The counter is owned by the
//! election engine and resets whenever leadership is freshly acquired.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use singlevisor::{JitterPolicy, RestartBackoff};
//!
//! let backoff = RestartBackoff {
//!     jitter: JitterPolicy::None,
//!     ..RestartBackoff::default()
//! };
//!
//! assert_eq!(backoff.next(1), Duration::from_secs(3));
//! assert_eq!(backoff.next(20), Duration::from_secs(180));
//! assert_eq!(backoff.next(100), Duration::from_secs(900));
//! ```

use std::time::Duration;

use crate::policies::JitterPolicy;

/// Restart delay schedule with three tiers.
#[derive(Clone, Copy, Debug)]
pub struct RestartBackoff {
    /// Delay used for the first `medium_after - 1` restarts.
    pub base: Duration,
    /// Delay once `medium_after` consecutive restarts were reached.
    pub medium: Duration,
    /// Delay once `long_after` consecutive restarts were reached.
    pub long: Duration,
    /// Restart count at which `medium` takes over.
    pub medium_after: u32,
    /// Restart count at which `long` takes over.
    pub long_after: u32,
    /// Jitter applied to the selected tier.
    pub jitter: JitterPolicy,
}

impl Default for RestartBackoff {
    /// Returns a schedule with:
    /// - `base = 3s` (the default heartbeat interval);
    /// - `medium = 3min` after 20 restarts;
    /// - `long = 15min` after 100 restarts;
    /// - `jitter = Spread` (±20%).
    fn default() -> Self {
        Self {
            base: Duration::from_secs(3),
            medium: Duration::from_secs(3 * 60),
            long: Duration::from_secs(15 * 60),
            medium_after: 20,
            long_after: 100,
            jitter: JitterPolicy::Spread,
        }
    }
}

impl RestartBackoff {
    /// Returns the un-jittered tier delay for the given restart count.
    pub fn tier(&self, restarts: u32) -> Duration {
        if restarts >= self.long_after {
            self.long
        } else if restarts >= self.medium_after {
            self.medium
        } else {
            self.base
        }
    }

    /// Computes the (jittered) delay before restart number `restarts`.
    pub fn next(&self, restarts: u32) -> Duration {
        self.jitter.apply(self.tier(restarts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> RestartBackoff {
        RestartBackoff {
            base: Duration::from_millis(100),
            medium: Duration::from_secs(2),
            long: Duration::from_secs(10),
            medium_after: 20,
            long_after: 100,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_base_tier_below_threshold() {
        let policy = fixed();
        for restarts in 0..20 {
            assert_eq!(policy.next(restarts), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_medium_tier_strictly_greater_than_base() {
        let policy = fixed();
        for restarts in 20..100 {
            assert!(policy.next(restarts) > policy.base);
        }
    }

    #[test]
    fn test_long_tier_rises_again() {
        let policy = fixed();
        assert!(policy.next(100) > policy.next(99));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_default_tiers_separate_even_with_jitter() {
        let policy = RestartBackoff::default();
        for _ in 0..100 {
            assert!(policy.next(20) > policy.next(19));
            assert!(policy.next(100) > policy.next(99));
        }
    }
}
