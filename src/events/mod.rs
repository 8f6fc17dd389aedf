//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `election::Engine`, `stream::StreamSupervisor`,
//!   `notice::Processor` and its workers.
//! - **Consumers**: `SubscriberSet::listen` (fans out to subscribers such as
//!   `LogWriter`) or any direct `Bus::subscribe` receiver.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
