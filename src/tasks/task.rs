//! # Task abstraction.
//!
//! A [`Task`] is the cancelable unit of work the election engine runs while it
//! is leader. The common handle type is [`TaskRef`], an `Arc<dyn Task>`.
//!
//! A task receives a [`CancellationToken`] and must exit promptly once it is
//! cancelled (step-down or shutdown). Returning:
//! - `Ok(())` or `Err(TaskError::Canceled)` yields control: the leader restarts it after backoff;
//! - any other error is fatal for the engine.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Boxed future returned by [`Task::spawn`].
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancelable unit.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use singlevisor::{BoxTaskFuture, Task};
///
/// struct Demo;
///
/// impl Task for Demo {
///     fn name(&self) -> &str { "demo" }
///
///     fn spawn(&self, ctx: CancellationToken) -> BoxTaskFuture {
///         Box::pin(async move {
///             ctx.cancelled().await;
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Creates a fresh future for one run of the task.
    ///
    /// Called once per election or restart; the future owns its state.
    fn spawn(&self, ctx: CancellationToken) -> BoxTaskFuture;
}
