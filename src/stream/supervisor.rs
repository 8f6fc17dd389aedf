//! # StreamSupervisor: poll loop with throttled checkpoints.
//!
//! ## Poll cycle
//! ```text
//! check_once()
//!   ├─► offset unset? → store.load(key)              (once; failure → retry next poll)
//!   ├─► source.read(offset, batch_size)              (failure → retry next poll)
//!   ├─► for record in batch: publisher.publish()     (first failure stops the batch)
//!   │       └─► offset = record.offset
//!   └─► commit window elapsed and offset moved? → store.save(key, offset)
//! ```
//!
//! ## Rules
//! - The offset never moves past a record that was not published.
//! - At most one commit per `commit_interval`, except the final one on close.
//! - A failed commit keeps the previous commit time, so the next poll retries.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::handle::StreamHandle;
use super::record::{Publisher, RecordSource};
use crate::{
    checkpoint::CheckpointStore,
    config::StreamConfig,
    events::{Bus, Event, EventKind},
};

/// Replays a [`RecordSource`] to a [`Publisher`] from a persisted checkpoint.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use singlevisor::{MemoryCheckpointStore, Publisher, Record, RecordSource, StreamError, StreamSupervisor};
///
/// struct Empty;
///
/// #[async_trait]
/// impl RecordSource for Empty {
///     async fn read(&self, _after: u64, _limit: usize) -> Result<Vec<Record>, StreamError> {
///         Ok(Vec::new())
///     }
/// }
///
/// struct Discard;
///
/// #[async_trait]
/// impl Publisher for Discard {
///     async fn publish(&self, _record: &Record) -> Result<(), StreamError> {
///         Ok(())
///     }
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let ctx = CancellationToken::new();
///     let handle = StreamSupervisor::new(
///         Arc::new(Discard),
///         Arc::new(Empty),
///         Arc::new(MemoryCheckpointStore::new()),
///         "orders",
///     )
///     .spawn(&ctx);
///
///     handle.check();
///     handle.close().await.unwrap();
///     assert!(handle.is_done());
/// }
/// ```
pub struct StreamSupervisor {
    publisher: Arc<dyn Publisher>,
    source: Arc<dyn RecordSource>,
    store: Arc<dyn CheckpointStore>,
    key: Arc<str>,
    cfg: StreamConfig,
    bus: Bus,
}

/// Loop-local progress.
struct Cursor {
    offset: Option<u64>,
    committed: u64,
    committed_at: Option<Instant>,
    watch: watch::Sender<Option<u64>>,
}

impl Cursor {
    fn load(&mut self, offset: u64) {
        self.committed = offset;
        self.advance(offset);
    }

    fn advance(&mut self, offset: u64) {
        self.offset = Some(offset);
        self.watch.send_replace(Some(offset));
    }
}

impl StreamSupervisor {
    /// Creates a supervisor for the stream identified by `key`.
    pub fn new(
        publisher: Arc<dyn Publisher>,
        source: Arc<dyn RecordSource>,
        store: Arc<dyn CheckpointStore>,
        key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            publisher,
            source,
            store,
            key: key.into(),
            cfg: StreamConfig::default(),
            bus: Bus::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: StreamConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Replaces the event bus.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }

    /// Starts the poll loop under a child of `ctx`.
    ///
    /// Cancelling `ctx` has the same effect as [`StreamHandle::close`] without
    /// waiting for the drain.
    pub fn spawn(self, ctx: &CancellationToken) -> StreamHandle {
        let token = ctx.child_token();
        let done = CancellationToken::new();
        let (checks_tx, checks_rx) = mpsc::channel(1);
        let (offset_tx, offset_rx) = watch::channel(None);

        let key = self.key.clone();
        let join = tokio::spawn(self.run(token.clone(), done.clone(), checks_rx, offset_tx));
        StreamHandle::new(key, checks_tx, offset_rx, token, done, join)
    }

    async fn run(
        self,
        token: CancellationToken,
        done: CancellationToken,
        mut checks: mpsc::Receiver<()>,
        offset: watch::Sender<Option<u64>>,
    ) {
        let _done = done.drop_guard();
        let mut cursor = Cursor {
            offset: None,
            committed: 0,
            committed_at: None,
            watch: offset,
        };

        let period = self.cfg.poll_period();
        let mut poll = time::interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                Some(()) = checks.recv() => self.check_once(&mut cursor).await,
                _ = poll.tick() => self.check_once(&mut cursor).await,
            }
        }

        self.check_once(&mut cursor).await;
        self.commit(&mut cursor, true).await;

        let mut stopped = self.event(EventKind::StreamStopped);
        if let Some(offset) = cursor.offset {
            stopped = stopped.with_offset(offset);
        }
        self.bus.publish(stopped);
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_key(self.key.clone())
    }

    async fn check_once(&self, cursor: &mut Cursor) {
        let Some(after) = self.start_offset(cursor).await else {
            return;
        };

        let records = match self.source.read(after, self.cfg.batch_size_clamped()).await {
            Ok(records) => records,
            Err(e) => {
                self.bus.publish(
                    self.event(EventKind::ReadFailed)
                        .with_offset(after)
                        .with_reason(e.to_string()),
                );
                return;
            }
        };

        let mut published = 0;
        for record in &records {
            if let Err(e) = self.publisher.publish(record).await {
                self.bus.publish(
                    self.event(EventKind::PublishFailed)
                        .with_offset(record.offset)
                        .with_reason(e.to_string()),
                );
                self.report_published(cursor, published);
                return;
            }
            cursor.advance(record.offset);
            published += 1;
        }
        self.report_published(cursor, published);
        self.commit(cursor, false).await;
    }

    /// Current offset, loading it from the store on first use.
    async fn start_offset(&self, cursor: &mut Cursor) -> Option<u64> {
        if cursor.offset.is_some() {
            return cursor.offset;
        }
        match self.store.load(&self.key).await {
            Ok(offset) => {
                cursor.load(offset);
                self.bus
                    .publish(self.event(EventKind::CheckpointLoaded).with_offset(offset));
                Some(offset)
            }
            Err(e) => {
                self.bus
                    .publish(self.event(EventKind::LoadFailed).with_reason(e.to_string()));
                None
            }
        }
    }

    fn report_published(&self, cursor: &Cursor, count: usize) {
        if let (Some(offset), true) = (cursor.offset, count > 0) {
            self.bus.publish(
                self.event(EventKind::RecordsPublished)
                    .with_offset(offset)
                    .with_count(count),
            );
        }
    }

    async fn commit(&self, cursor: &mut Cursor, force: bool) {
        let Some(offset) = cursor.offset else {
            return;
        };
        if offset == cursor.committed {
            return;
        }
        let due = force
            || cursor
                .committed_at
                .is_none_or(|at| at.elapsed() > self.cfg.commit_interval);
        if !due {
            return;
        }

        match self.store.save(&self.key, offset).await {
            Ok(()) => {
                cursor.committed = offset;
                cursor.committed_at = Some(Instant::now());
                self.bus
                    .publish(self.event(EventKind::CheckpointCommitted).with_offset(offset));
            }
            Err(e) => {
                self.bus.publish(
                    self.event(EventKind::CommitFailed)
                        .with_offset(offset)
                        .with_reason(e.to_string()),
                );
            }
        }
    }
}
