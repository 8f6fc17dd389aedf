//! # LogWriter - events rendered through `tracing`
//!
//! A subscriber that turns every [`Event`] into a structured `tracing` record.
//! Leadership changes log at `info`, failures at `warn`, routine progress at
//! `debug`. Install any `tracing` subscriber in the host process to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO singlevisor: elected leader task="relay" instance="3k9x1d0q2m"
//! WARN singlevisor: publish failed key="stan:prod.orders" offset=42 reason="broker down"
//! INFO singlevisor: leadership lost task="relay" leases=1
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let instance = e.instance.as_deref().unwrap_or("-");
        let key = e.key.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::InstanceStarted => {
                info!(target: "singlevisor", task, instance, "instance started");
            }
            EventKind::LeaseGranted => {
                debug!(target: "singlevisor", task, peer = instance, leases = ?e.count, "lease granted");
            }
            EventKind::HeartbeatPublishFailed => {
                warn!(target: "singlevisor", task, instance, reason, "heartbeat publish failed");
            }
            EventKind::ElectedLeader => {
                info!(target: "singlevisor", task, instance, "elected leader");
            }
            EventKind::LeadershipLost => {
                info!(target: "singlevisor", task, instance, leases = ?e.count, "leadership lost");
            }
            EventKind::TaskStarting => {
                debug!(target: "singlevisor", task, restarts = ?e.restarts, "task starting");
            }
            EventKind::TaskStopped => {
                debug!(target: "singlevisor", task, restarts = ?e.restarts, "task stopped");
            }
            EventKind::TaskFailed => {
                warn!(target: "singlevisor", task, reason, "task failed");
            }
            EventKind::RestartScheduled => {
                info!(target: "singlevisor", task, restarts = ?e.restarts, delay_ms = ?e.delay_ms, "restart scheduled");
            }
            EventKind::EngineStopped => {
                info!(target: "singlevisor", task, instance, reason, "engine stopped");
            }
            EventKind::CheckpointLoaded => {
                debug!(target: "singlevisor", key, offset = ?e.offset, "checkpoint loaded");
            }
            EventKind::LoadFailed => {
                warn!(target: "singlevisor", key, reason, "checkpoint load failed");
            }
            EventKind::ReadFailed => {
                warn!(target: "singlevisor", key, offset = ?e.offset, reason, "read failed");
            }
            EventKind::RecordsPublished => {
                debug!(target: "singlevisor", key, offset = ?e.offset, records = ?e.count, "records published");
            }
            EventKind::PublishFailed => {
                warn!(target: "singlevisor", key, offset = ?e.offset, reason, "publish failed");
            }
            EventKind::CheckpointCommitted => {
                debug!(target: "singlevisor", key, offset = ?e.offset, "checkpoint committed");
            }
            EventKind::CommitFailed => {
                warn!(target: "singlevisor", key, offset = ?e.offset, reason, "checkpoint commit failed");
            }
            EventKind::StreamStopped => {
                info!(target: "singlevisor", key, offset = ?e.offset, "stream stopped");
            }
            EventKind::NoticeAccepted => {
                debug!(target: "singlevisor", aggregate = key, in_flight = ?e.count, "notice accepted");
            }
            EventKind::NoticeDuplicate => {
                debug!(target: "singlevisor", aggregate = key, reason, "notice duplicate");
            }
            EventKind::NoticeFinished => {
                debug!(target: "singlevisor", aggregate = key, "notice finished");
            }
            EventKind::NoticePanicked => {
                warn!(target: "singlevisor", aggregate = key, reason, "notice handler panicked");
            }
            EventKind::ProcessorDrained => {
                info!(target: "singlevisor", "notice processor drained");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
