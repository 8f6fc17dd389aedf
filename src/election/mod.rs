//! # Singleton election.
//!
//! [`Engine`] keeps one supervised task running on the oldest live participant
//! of a fleet, using only a lossy [`Heartbeat`](crate::Heartbeat) topic.

mod engine;
mod lease;
mod role;

pub use engine::{Engine, run};
