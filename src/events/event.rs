//! # Runtime events emitted by the engine, the stream supervisor and the notice processor.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Election events**: heartbeats, leases, leadership changes, task lifecycle
//! - **Stream events**: checkpoint load/commit, reads, publishes
//! - **Notice events**: accepted, duplicate, finished, drained
//!
//! The [`Event`] struct carries metadata such as the task name, instance id,
//! checkpoint key, offset and restart counters.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use singlevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RestartScheduled)
//!     .with_task("relay")
//!     .with_restarts(3)
//!     .with_delay(Duration::from_secs(3));
//!
//! assert_eq!(ev.kind, EventKind::RestartScheduled);
//! assert_eq!(ev.task.as_deref(), Some("relay"));
//! assert_eq!(ev.delay_ms, Some(3000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Election events ===
    /// Engine run started and minted its tick.
    ///
    /// Sets: `task`, `instance`
    InstanceStarted,

    /// A tick from an older peer was observed; a lease was recorded.
    ///
    /// Sets: `task`, `instance` (the peer), `count` (unexpired leases)
    LeaseGranted,

    /// Publishing our own tick failed (the next heartbeat retries).
    ///
    /// Sets: `task`, `instance`, `reason`
    HeartbeatPublishFailed,

    /// This instance became leader.
    ///
    /// Sets: `task`, `instance`
    ElectedLeader,

    /// This instance stepped down because an older peer holds a lease.
    ///
    /// Sets: `task`, `instance`, `count` (unexpired leases)
    LeadershipLost,

    /// The supervised task is being spawned.
    ///
    /// Sets: `task`, `restarts`
    TaskStarting,

    /// The supervised task exited without error (or observed cancellation).
    ///
    /// Sets: `task`, `restarts`
    TaskStopped,

    /// The supervised task returned an error or panicked.
    ///
    /// Sets: `task`, `reason`
    TaskFailed,

    /// A yielding task will be restarted after `delay_ms`.
    ///
    /// Sets: `task`, `restarts`, `delay_ms`
    RestartScheduled,

    /// Engine run loop returned.
    ///
    /// Sets: `task`, `instance`, `reason` (only when stopping on error)
    EngineStopped,

    // === Stream events ===
    /// Starting offset loaded from the checkpoint store.
    ///
    /// Sets: `key`, `offset`
    CheckpointLoaded,

    /// Loading the starting offset failed (retried next poll).
    ///
    /// Sets: `key`, `reason`
    LoadFailed,

    /// Reading a batch failed (retried next poll).
    ///
    /// Sets: `key`, `offset` (read position), `reason`
    ReadFailed,

    /// A batch was published downstream.
    ///
    /// Sets: `key`, `offset` (new position), `count`
    RecordsPublished,

    /// Publishing a record failed; the offset stays before it.
    ///
    /// Sets: `key`, `offset` (failed record), `reason`
    PublishFailed,

    /// Offset persisted to the checkpoint store.
    ///
    /// Sets: `key`, `offset`
    CheckpointCommitted,

    /// Persisting the offset failed (retried at next commit window).
    ///
    /// Sets: `key`, `offset`, `reason`
    CommitFailed,

    /// Stream supervisor drained and stopped.
    ///
    /// Sets: `key`, `offset`
    StreamStopped,

    // === Notice events ===
    /// A notice was accepted and a handler spawned.
    ///
    /// Sets: `key` (aggregate id), `count` (in flight)
    NoticeAccepted,

    /// A notice was dropped because its aggregate is already in flight.
    ///
    /// Sets: `key` (aggregate id), `reason` (`dropped` / `acknowledged`)
    NoticeDuplicate,

    /// A handler finished.
    ///
    /// Sets: `key` (aggregate id)
    NoticeFinished,

    /// A handler panicked (the notice is still closed).
    ///
    /// Sets: `key` (aggregate id), `reason`
    NoticePanicked,

    /// Processor stopped accepting and all handlers completed.
    ProcessorDrained,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the supervised task, if applicable.
    pub task: Option<Arc<str>>,
    /// Instance id of the tick owner.
    pub instance: Option<Arc<str>>,
    /// Checkpoint key or aggregate id.
    pub key: Option<Arc<str>>,
    /// Stream offset.
    pub offset: Option<u64>,
    /// Consecutive restarts in the current leadership term.
    pub restarts: Option<u32>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Generic counter (leases, records, in-flight notices).
    pub count: Option<usize>,
    /// Human-readable reason (errors, drop details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            instance: None,
            key: None,
            offset: None,
            restarts: None,
            delay_ms: None,
            count: None,
            reason: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an instance id.
    #[inline]
    pub fn with_instance(mut self, instance: impl Into<Arc<str>>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Attaches a checkpoint key or aggregate id.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a stream offset.
    #[inline]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Attaches a restart counter.
    #[inline]
    pub fn with_restarts(mut self, n: u32) -> Self {
        self.restarts = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns `true` for events that report a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::HeartbeatPublishFailed
                | EventKind::TaskFailed
                | EventKind::LoadFailed
                | EventKind::ReadFailed
                | EventKind::PublishFailed
                | EventKind::CommitFailed
                | EventKind::NoticePanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::ElectedLeader);
        let b = Event::new(EventKind::LeadershipLost);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_is_clamped_to_u32_millis() {
        let ev = Event::new(EventKind::RestartScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn failure_classification() {
        assert!(Event::new(EventKind::CommitFailed).is_failure());
        assert!(!Event::new(EventKind::CheckpointCommitted).is_failure());
    }
}
