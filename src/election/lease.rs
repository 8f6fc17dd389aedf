//! # Lease queue.
//!
//! A lease is the expiry instant recorded when a tick from an older peer is
//! observed. Only the number of unexpired leases matters, so leases are not
//! deduplicated per peer. With a fixed lease duration, expiries are pushed in
//! ascending order and pruning only ever inspects the front.

use std::collections::VecDeque;

use tokio::time::Instant;

/// Time-ordered queue of lease expiries.
#[derive(Debug, Default)]
pub(crate) struct Leases {
    expiries: VecDeque<Instant>,
}

impl Leases {
    /// Records a lease expiring at `expiry`.
    pub(crate) fn grant(&mut self, expiry: Instant) {
        self.expiries.push_back(expiry);
    }

    /// Discards leases that expired before `now`.
    pub(crate) fn prune(&mut self, now: Instant) {
        while self.expiries.front().is_some_and(|expiry| *expiry < now) {
            self.expiries.pop_front();
        }
    }

    /// Number of leases held (call [`prune`](Self::prune) first for an unexpired count).
    pub(crate) fn len(&self) -> usize {
        self.expiries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn prune_drops_only_expired_front() {
        let t0 = Instant::now();
        let mut leases = Leases::default();
        leases.grant(t0 + Duration::from_secs(1));
        leases.grant(t0 + Duration::from_secs(2));
        leases.grant(t0 + Duration::from_secs(3));

        leases.prune(t0);
        assert_eq!(leases.len(), 3);

        leases.prune(t0 + Duration::from_millis(2500));
        assert_eq!(leases.len(), 1);

        leases.prune(t0 + Duration::from_secs(10));
        assert!(leases.is_empty());
    }

    #[test]
    fn lease_expiring_exactly_now_is_kept() {
        let t0 = Instant::now();
        let mut leases = Leases::default();
        leases.grant(t0);
        leases.prune(t0);
        assert_eq!(leases.len(), 1);
    }
}
