//! # Runtime configuration.
//!
//! Provides the settings for the three runtime pieces:
//! - [`ElectionConfig`] for [`Engine`](crate::Engine)
//! - [`StreamConfig`] for [`StreamSupervisor`](crate::StreamSupervisor)
//! - [`NoticeConfig`] for [`Processor`](crate::Processor)
//!
//! ## Sentinel values
//! - zero durations are clamped to [`MIN_PERIOD`] wherever a periodic timer needs them
//! - `batch_size = 0` is treated as 1

use std::time::Duration;

use crate::policies::{JitterPolicy, RestartBackoff, RestartPolicy};

/// Smallest period handed to a timer.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Configuration for the singleton election engine.
///
/// ## Field semantics
/// - `interval`: heartbeat period (each tick jittered ±20%)
/// - `elections`: election evaluation period, should exceed `interval`
/// - `lease`: how long an observed older peer is deferred to
/// - `backoff`: restart delay schedule for yielding tasks
/// - `restart`: restart cap
/// - `jitter`: randomization of heartbeat and election periods
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct ElectionConfig {
    /// Heartbeat broadcast period.
    pub interval: Duration,
    /// Election evaluation period.
    pub elections: Duration,
    /// Lease duration granted to an older peer per observed tick.
    pub lease: Duration,
    /// Delay schedule before restarting a task that yielded.
    pub backoff: RestartBackoff,
    /// Maximum consecutive restarts per leadership term.
    pub restart: RestartPolicy,
    /// Randomization applied to heartbeat and election periods.
    pub jitter: JitterPolicy,
    /// Capacity of the engine's event bus when it creates its own.
    pub bus_capacity: usize,
}

impl ElectionConfig {
    /// Jittered delay until the next heartbeat.
    #[inline]
    pub fn next_heartbeat(&self) -> Duration {
        self.jitter.apply(self.interval).max(MIN_PERIOD)
    }

    /// Jittered delay until the next election evaluation.
    #[inline]
    pub fn next_election(&self) -> Duration {
        self.jitter.apply(self.elections).max(MIN_PERIOD)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a config whose restart base tier follows `interval`.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self.backoff.base = interval;
        self
    }

    /// Returns a new config with updated election period.
    pub fn with_elections(mut self, elections: Duration) -> Self {
        self.elections = elections;
        self
    }

    /// Returns a new config with updated lease duration.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Returns a new config with updated restart cap.
    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }
}

impl Default for ElectionConfig {
    /// Default configuration:
    ///
    /// - `interval = 3s`
    /// - `elections = 13s`
    /// - `lease = 13min`
    /// - `backoff = RestartBackoff::default()` (3s / 3min / 15min)
    /// - `restart = RestartPolicy::Unlimited`
    /// - `jitter = JitterPolicy::Spread`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            elections: Duration::from_secs(13),
            lease: Duration::from_secs(13 * 60),
            backoff: RestartBackoff::default(),
            restart: RestartPolicy::default(),
            jitter: JitterPolicy::Spread,
            bus_capacity: 1024,
        }
    }
}

/// Configuration for the checkpointed stream supervisor.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Maximum records read per poll.
    pub batch_size: usize,
    /// Minimum time between two checkpoint commits.
    pub commit_interval: Duration,
    /// Fallback poll period when no `check()` hint arrives.
    pub poll_interval: Duration,
}

impl StreamConfig {
    /// Batch size clamped to a minimum of 1.
    #[inline]
    pub fn batch_size_clamped(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Poll period clamped to [`MIN_PERIOD`].
    #[inline]
    pub fn poll_period(&self) -> Duration {
        self.poll_interval.max(MIN_PERIOD)
    }
}

impl Default for StreamConfig {
    /// Default configuration:
    ///
    /// - `batch_size = 100`
    /// - `commit_interval = 3s`
    /// - `poll_interval = 60s`
    fn default() -> Self {
        Self {
            batch_size: 100,
            commit_interval: Duration::from_secs(3),
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// What the notice processor does with a notice whose aggregate is already in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Discard without acknowledging; the sender never gets a reply.
    #[default]
    Drop,
    /// Discard but close the notice so a waiting sender is released.
    Acknowledge,
}

/// Configuration for the notice dedup processor.
#[derive(Clone, Debug, Default)]
pub struct NoticeConfig {
    /// Handling of duplicates that arrive while their aggregate is in flight.
    pub duplicates: DuplicatePolicy,
}
