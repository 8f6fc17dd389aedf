//! # Wiring: election around a stream supervisor.
//!
//! ```text
//!  writer ─► NotifyingPublisher ─► hints (broadcast<Arc<str>>)
//!                                      │
//!  Engine ─► stream_task ─► StreamSupervisor ◄── relay_hints ── check()
//! ```
//!
//! - [`stream_task`] builds the [`TaskRef`] an [`Engine`](crate::Engine) runs:
//!   each term of leadership opens a fresh supervisor and closes it on step-down.
//! - [`relay_hints`] turns a low-latency hint topic into `check()` calls.
//! - [`NotifyingPublisher`] is the producer side of that topic.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{StreamError, TaskError};
use crate::stream::{Publisher, Record, StreamHandle};
use crate::tasks::{TaskFn, TaskRef};

/// Hint topic carrying aggregate ids.
pub type Hints = broadcast::Sender<Arc<str>>;

/// Builds a task that runs a stream supervisor for as long as it is leader.
///
/// `open` is called once per run with the run's context and must spawn the
/// supervisor (usually [`StreamSupervisor::spawn`](crate::StreamSupervisor::spawn)).
/// The run ends when its context is cancelled or the supervisor stops; the
/// supervisor is then closed (final poll and commit) and the run returns
/// `Ok(())`, so the engine treats it as a yield.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use singlevisor::{wiring, MemoryCheckpointStore, StreamSupervisor};
/// # use async_trait::async_trait;
/// # use singlevisor::{Publisher, Record, RecordSource, StreamError};
/// # struct Log;
/// # #[async_trait]
/// # impl RecordSource for Log {
/// #     async fn read(&self, _after: u64, _limit: usize) -> Result<Vec<Record>, StreamError> { Ok(vec![]) }
/// # }
/// # struct Sink;
/// # #[async_trait]
/// # impl Publisher for Sink {
/// #     async fn publish(&self, _record: &Record) -> Result<(), StreamError> { Ok(()) }
/// # }
///
/// let store = Arc::new(MemoryCheckpointStore::new());
/// let task = wiring::stream_task("orders-relay", move |ctx| {
///     StreamSupervisor::new(Arc::new(Sink), Arc::new(Log), store.clone(), "orders").spawn(ctx)
/// });
/// assert_eq!(task.name(), "orders-relay");
/// ```
pub fn stream_task<F>(name: impl Into<Cow<'static, str>>, open: F) -> TaskRef
where
    F: Fn(&CancellationToken) -> StreamHandle + Send + Sync + 'static,
{
    build(name.into(), open, None)
}

/// Like [`stream_task`], additionally relaying every hint on `hints` into
/// [`StreamHandle::check`] while the supervisor runs.
pub fn stream_task_with_hints<F>(
    name: impl Into<Cow<'static, str>>,
    hints: Hints,
    open: F,
) -> TaskRef
where
    F: Fn(&CancellationToken) -> StreamHandle + Send + Sync + 'static,
{
    build(name.into(), open, Some(hints))
}

fn build<F>(name: Cow<'static, str>, open: F, hints: Option<Hints>) -> TaskRef
where
    F: Fn(&CancellationToken) -> StreamHandle + Send + Sync + 'static,
{
    TaskFn::arc(name, move |ctx: CancellationToken| {
        let handle = open(&ctx);
        let relay = hints
            .as_ref()
            .map(|hints| relay_hints(handle.clone(), hints.subscribe()));

        async move {
            tokio::select! {
                _ = ctx.cancelled() => {}
                _ = handle.done() => {}
            }
            let closed = handle.close().await;
            if let Some(relay) = relay {
                let _ = relay.await;
            }
            closed.map_err(|e| TaskError::Fail {
                error: e.to_string(),
            })
        }
    })
}

/// Calls [`StreamHandle::check`] for every hint until the stream is done or
/// the topic closes. A lagged receiver counts as a hint.
pub fn relay_hints<T>(handle: StreamHandle, mut hints: broadcast::Receiver<T>) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = handle.done() => break,
                msg = hints.recv() => match msg {
                    Ok(_) | Err(RecvError::Lagged(_)) => handle.check(),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}

/// [`Publisher`] decorator that announces each published aggregate id.
pub struct NotifyingPublisher<P> {
    inner: P,
    hints: Hints,
}

impl<P: Publisher> NotifyingPublisher<P> {
    /// Wraps `inner` with a hint topic buffering `capacity` ids (minimum 1).
    pub fn new(inner: P, capacity: usize) -> Self {
        let (hints, _rx) = broadcast::channel(capacity.max(1));
        Self { inner, hints }
    }

    /// Sender side of the hint topic (to subscribe or share).
    pub fn hints(&self) -> Hints {
        self.hints.clone()
    }

    /// Subscribes to the hint topic.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.hints.subscribe()
    }
}

#[async_trait]
impl<P: Publisher> Publisher for NotifyingPublisher<P> {
    async fn publish(&self, record: &Record) -> Result<(), StreamError> {
        self.inner.publish(record).await?;
        let _ = self.hints.send(Arc::from(record.aggregate_id.as_str()));
        Ok(())
    }
}
