//! # Election role.
//!
//! ```text
//!            election tick, no leases
//!  Follower ───────────────────────────► Leader { Running, restarts: 0 }
//!     ▲                                      │            ▲
//!     │ heartbeat tick, lease held           │ task yields│ backoff elapsed
//!     └──────────────────────────────────────┤            │
//!                                            ▼            │
//!                                 Leader { Waiting(until), restarts + 1 }
//! ```
//!
//! The restart counter lives inside `Leader`, so it starts from zero on every
//! fresh election and cannot leak across leadership terms.

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// A spawned run of the supervised task.
pub(crate) struct Running {
    pub(crate) token: CancellationToken,
    pub(crate) join: JoinHandle<Result<(), TaskError>>,
}

/// What a leader is doing with its task.
pub(crate) enum Slot {
    /// The task is running.
    Running(Running),
    /// The task yielded; it restarts at the given instant.
    Waiting(Instant),
}

/// Role of this participant.
pub(crate) enum Role {
    Follower,
    Leader { slot: Slot, restarts: u32 },
}

impl Role {
    pub(crate) fn is_leader(&self) -> bool {
        matches!(self, Role::Leader { .. })
    }

    /// Join handle of the running task, if any.
    pub(crate) fn running_mut(&mut self) -> Option<&mut JoinHandle<Result<(), TaskError>>> {
        match self {
            Role::Leader {
                slot: Slot::Running(run),
                ..
            } => Some(&mut run.join),
            _ => None,
        }
    }

    /// Instant at which a waiting leader restarts its task.
    pub(crate) fn restart_at(&self) -> Option<Instant> {
        match self {
            Role::Leader {
                slot: Slot::Waiting(until),
                ..
            } => Some(*until),
            _ => None,
        }
    }

    /// Leaves leadership, returning the running task if there is one.
    pub(crate) fn step_down(&mut self) -> Option<Running> {
        match std::mem::replace(self, Role::Follower) {
            Role::Leader {
                slot: Slot::Running(run),
                ..
            } => Some(run),
            _ => None,
        }
    }
}
