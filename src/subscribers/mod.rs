//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Engine / Stream / Processor ── publish(Event) ──► Bus
//!                                                   │
//!                                    SubscriberSet::listen
//!                                                   │
//!                                     ┌─────────────┼──────────┐
//!                                     ▼             ▼          ▼
//!                                 LogWriter      Metrics    Custom
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
