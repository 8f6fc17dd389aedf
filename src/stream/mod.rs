//! # Checkpointed stream supervisor.
//!
//! Replays an ordered record log to a [`Publisher`], persisting progress in a
//! [`CheckpointStore`](crate::CheckpointStore) so that a new leader resumes
//! near where the previous one stopped.
//!
//! ## Architecture
//! ```text
//!  check() ──► [cap 1] ─┐
//!                        ├─► loop ─► check_once() ─► RecordSource::read(after, limit)
//!  poll timer ───────────┘                 │
//!                                          ├─► Publisher::publish(record)   (in order)
//!                                          └─► CheckpointStore::save()      (throttled)
//! ```
//!
//! Delivery is at-least-once: the offset only moves past records that were
//! published, and a crash between publish and commit replays them.

mod handle;
mod record;
mod supervisor;

pub use handle::StreamHandle;
pub use record::{Publisher, Record, RecordSource};
pub use supervisor::StreamSupervisor;
