//! # Jitter policy for periodic triggers.
//!
//! [`JitterPolicy`] adds randomness to heartbeat, election and restart delays so
//! that a fleet of peers started together does not stay synchronized.
//!
//! - [`JitterPolicy::None`] - no randomization, predictable delays
//! - [`JitterPolicy::Spread`] - delay ± 20% (fleet default, see [`jitter`])
//! - [`JitterPolicy::Full`] - random delay in [0, delay] (most aggressive)
//! - [`JitterPolicy::Equal`] - delay = delay/2 + random[0, delay/2] (balanced)

use rand::Rng;
use std::time::Duration;

/// Fraction of the delay that [`jitter`] may add or remove (1/5 = 20%).
const SPREAD_DIVISOR: u64 = 5;

/// Randomizes `d` uniformly within `[d - d/5, d + d/5)`.
///
/// Used for every periodic trigger in the crate. Delays too short to carry a
/// fragment of at least one microsecond are returned unchanged.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use singlevisor::jitter;
///
/// let d = jitter(Duration::from_secs(10));
/// assert!(d >= Duration::from_secs(8) && d < Duration::from_secs(12));
/// ```
pub fn jitter(d: Duration) -> Duration {
    let micros = d.as_micros().min(u128::from(u64::MAX)) as u64;
    let fragment = micros / SPREAD_DIVISOR;
    if fragment == 0 {
        return d;
    }
    let offset = rand::rng().random_range(0..2 * fragment);
    Duration::from_micros(micros - fragment + offset)
}

/// Policy controlling randomization of delays.
///
/// ## Trade-offs
/// - **None**: Predictable, but risks synchronized peers
/// - **Spread**: Keeps the mean delay, decorrelates peers (default)
/// - **Full**: Maximum randomness, can shrink the delay to zero
/// - **Equal**: Never below half of the delay
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use exact delay.
    ///
    /// Use for tests or single-instance deployments.
    None,

    /// ±20% around the delay, see [`jitter`].
    #[default]
    Spread,

    /// Full jitter: random delay in [0, delay].
    Full,

    /// Equal jitter: delay = delay/2 + random[0, delay/2].
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Spread => jitter(delay),
            JitterPolicy::Full => full_jitter(delay),
            JitterPolicy::Equal => equal_jitter(delay),
        }
    }
}

/// Full jitter: random[0, delay]
fn full_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

/// Equal jitter: delay/2 + random[0, delay/2]
fn equal_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    let half = ms / 2;
    let jitter = if half == 0 {
        0
    } else {
        rand::rng().random_range(0..=half)
    };
    Duration::from_millis(half + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_bounds() {
        let base = Duration::from_millis(1000);
        for _ in 0..200 {
            let d = jitter(base);
            assert!(d >= Duration::from_millis(800), "{d:?} below -20%");
            assert!(d < Duration::from_millis(1200), "{d:?} above +20%");
        }
    }

    #[test]
    fn test_spread_tiny_delay_unchanged() {
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
        assert_eq!(jitter(Duration::from_micros(4)), Duration::from_micros(4));
    }

    #[test]
    fn test_spread_actually_varies() {
        let base = Duration::from_secs(10);
        let first = jitter(base);
        assert!((0..50).map(|_| jitter(base)).any(|d| d != first));
    }

    #[test]
    fn test_full_and_equal_bounds() {
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(base) <= base);
            let eq = JitterPolicy::Equal.apply(base);
            assert!(eq >= Duration::from_millis(500) && eq <= base);
        }
        assert_eq!(JitterPolicy::None.apply(base), base);
    }
}
