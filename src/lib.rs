//! # singlevisor
//!
//! **Singlevisor** keeps exactly one instance of a long-lived task running
//! across a fleet of peer processes that share nothing but a lossy
//! publish/subscribe topic. No lock service, no consensus: the oldest live
//! participant wins, others defer to it through soft leases.
//!
//! The task it usually runs is a checkpointed stream supervisor that replays an
//! ordered log to a downstream publisher and persists its offset, so a new
//! leader resumes near where the previous one stopped.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   process A                 process B                 process C
//! ┌────────────┐            ┌────────────┐            ┌────────────┐
//! │  Engine    │            │  Engine    │            │  Engine    │
//! │  (leader)  │            │ (follower) │            │ (follower) │
//! └─────┬──────┘            └─────┬──────┘            └─────┬──────┘
//!       │   Tick{id, started_at}  │                         │
//!       └─────────────────────────┼─────────────────────────┘
//!                                 ▼
//!                     Heartbeat topic (lossy, ordered per publisher)
//!
//!   leader runs TaskRef ──► stream_task ──► StreamSupervisor
//!                                              ├─► RecordSource::read
//!                                              ├─► Publisher::publish
//!                                              └─► CheckpointStore::save
//! ```
//!
//! ### Observability
//! ```text
//! Engine / StreamSupervisor / Processor ──► Bus ──► SubscriberSet ──► LogWriter (tracing)
//! ```
//!
//! ## Features
//! | Area               | Description                                                 | Key types / traits                              |
//! |--------------------|-------------------------------------------------------------|-------------------------------------------------|
//! | **Election**       | Earliest-start-wins singleton with leases and backoff.      | [`Engine`], [`Heartbeat`], [`Tick`]              |
//! | **Streams**        | Offset-tracked replay with throttled commits.               | [`StreamSupervisor`], [`StreamHandle`]           |
//! | **Notices**        | At most one concurrent handler per aggregate id.            | [`Processor`], [`Notice`], [`NoticeHandler`]     |
//! | **Tasks**          | Cancelable units of work and combinators.                   | [`Task`], [`TaskFn`], [`filters`]                |
//! | **Policies**       | Jitter, tiered restart backoff, restart cap.                | [`RestartBackoff`], [`RestartPolicy`], [`jitter`]|
//! | **Subscriber API** | Hook into runtime events (logging, metrics, custom).        | [`Subscribe`], [`SubscriberSet`], [`LogWriter`]  |
//! | **Errors**         | Typed errors for the runtime, tasks and collaborators.      | [`RuntimeError`], [`TaskError`]                  |
//! | **Configuration**  | Plain structs with defaults.                                | [`ElectionConfig`], [`StreamConfig`]             |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use singlevisor::{ElectionConfig, Engine, LocalHeartbeat, LogWriter, Subscribe, SubscriberSet, TaskError, TaskFn, TaskRef};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = ElectionConfig::default()
//!         .with_interval(Duration::from_millis(5))
//!         .with_elections(Duration::from_millis(15));
//!     let engine = Engine::new(cfg);
//!
//!     // Render runtime events through `tracing`.
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let set = Arc::new(SubscriberSet::new(subs));
//!     let ctx = CancellationToken::new();
//!     let listener = Arc::clone(&set).listen(engine.bus(), ctx.clone());
//!
//!     let hello: TaskRef = TaskFn::arc("hello", |ctx: CancellationToken| async move {
//!         ctx.cancelled().await;
//!         Ok::<_, TaskError>(())
//!     });
//!
//!     let stop = ctx.clone();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_millis(50)).await;
//!         stop.cancel();
//!     });
//!
//!     let heartbeat = LocalHeartbeat::default();
//!     engine.run(ctx, &heartbeat, hello).await?;
//!     listener.await?;
//!     Ok(())
//! }
//! ```
mod checkpoint;
mod config;
mod election;
mod error;
mod events;
mod heartbeat;
mod notice;
mod policies;
mod stream;
mod subscribers;
mod tasks;
mod tick;

pub mod filters;
pub mod wiring;

// ---- Public re-exports ----

pub use checkpoint::{CheckpointStore, MemoryCheckpointStore};
pub use config::{DuplicatePolicy, ElectionConfig, MIN_PERIOD, NoticeConfig, StreamConfig};
pub use election::{Engine, run};
pub use error::{CheckpointError, HeartbeatError, RuntimeError, StreamError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use heartbeat::{Heartbeat, LocalHeartbeat};
pub use notice::{Notice, NoticeHandler, Processor};
pub use policies::{JitterPolicy, RestartBackoff, RestartPolicy, jitter};
pub use stream::{Publisher, Record, RecordSource, StreamHandle, StreamSupervisor};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{BoxTaskFuture, Task, TaskFn, TaskRef};
pub use tick::Tick;
