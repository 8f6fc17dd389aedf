//! # Heartbeat tick.
//!
//! A [`Tick`] is what every participant broadcasts on the heartbeat topic:
//! its instance id and the wall-clock time its engine run started. The earliest
//! `started_at` wins the election.
//!
//! A fresh tick is minted per engine run (not per process), so re-running the
//! engine resets its place in the tie-break order.

use std::sync::Arc;
use std::time::SystemTime;

use rand::Rng;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Heartbeat record `{instance id, start time}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tick {
    /// Opaque, randomly minted instance id.
    pub instance_id: Arc<str>,
    /// Wall-clock time at which the owning engine run started.
    pub started_at: SystemTime,
}

impl Tick {
    /// Creates a tick from explicit parts.
    pub fn new(instance_id: impl Into<Arc<str>>, started_at: SystemTime) -> Self {
        Self {
            instance_id: instance_id.into(),
            started_at,
        }
    }

    /// Mints a tick with a random id, started now.
    pub fn mint() -> Self {
        Self::new(random_id(), SystemTime::now())
    }

    /// Returns `true` if `other` comes from a different participant that started
    /// strictly before this one.
    ///
    /// Identical timestamps are not ordered: both sides stay eligible.
    pub fn defers_to(&self, other: &Tick) -> bool {
        other.instance_id != self.instance_id && other.started_at < self.started_at
    }
}

/// Base-36 rendering of a random 63-bit integer.
fn random_id() -> String {
    let mut n: u64 = rand::rng().random_range(0..=i64::MAX as u64);
    let mut out = Vec::with_capacity(13);
    loop {
        out.push(ID_ALPHABET[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
