//! Restart and timing policies.
//!
//! This module groups the knobs that control **whether** a yielding task is
//! restarted and **how long** every periodic trigger waits.
//!
//! ## Contents
//! - [`jitter`]         ±20% randomization shared by every periodic trigger
//! - [`JitterPolicy`]   selectable randomization strategy
//! - [`RestartBackoff`] tiered restart delay (base / medium / long)
//! - [`RestartPolicy`]  restart cap (unlimited / limited)
//!
//! ## Quick wiring
//! ```text
//! ElectionConfig { backoff: RestartBackoff, restart: RestartPolicy, .. }
//!      └─► election::Engine uses:
//!           - restart.allows(n) to decide restart/fail
//!           - backoff.next(n) to schedule the restart
//!           - jitter(interval) for heartbeat and election ticks
//! ```

mod backoff;
mod jitter_policy;
mod restart;

pub use backoff::RestartBackoff;
pub use jitter_policy::{JitterPolicy, jitter};
pub use restart::RestartPolicy;
