//! # Task filters.
//!
//! Combinators that wrap a [`TaskRef`] into a new one, keeping the wrapped
//! task's name:
//!
//! - [`stop_after`] cancels a run once a deadline passes;
//! - [`retry`] re-runs a failing task a bounded number of times;
//! - [`forever`] re-runs a task until its context is cancelled;
//! - [`restart_between`] re-runs a task only inside a daily time window.
//!
//! Filters compose, e.g. `forever(delay, stop_after(limit, task))`. Under an
//! [`Engine`](crate::Engine), `stop_after(limit, task)` rotates the task every
//! `limit`: the deadline cancels the run, the run returns, the engine restarts it.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use singlevisor::{filters, TaskError, TaskFn, TaskRef};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let slow: TaskRef = TaskFn::arc("slow", |ctx: CancellationToken| async move {
//!     ctx.cancelled().await;
//!     Ok::<_, TaskError>(())
//! });
//!
//! let bounded = filters::stop_after(Duration::from_millis(10), slow);
//! assert!(bounded.spawn(CancellationToken::new()).await.is_ok());
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::policies::jitter;
use crate::tasks::{TaskFn, TaskRef};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Runs `task` with a deadline.
///
/// When `timeout` elapses first, the run's context is cancelled and the run's
/// own result is returned once it exits.
pub fn stop_after(timeout: Duration, task: TaskRef) -> TaskRef {
    let name = task.name().to_string();
    TaskFn::arc(name, move |ctx: CancellationToken| {
        let task = task.clone();
        async move { run_until(&task, &ctx, timeout).await }
    })
}

/// Re-runs `task` after a retryable error, up to `retries` extra times.
///
/// Non-retryable errors ([`TaskError::Fatal`], [`TaskError::Canceled`]) are
/// returned at once. Cancellation during the delay returns
/// [`TaskError::Canceled`].
pub fn retry(retries: u32, delay: Duration, task: TaskRef) -> TaskRef {
    let name = task.name().to_string();
    TaskFn::arc(name, move |ctx: CancellationToken| {
        let task = task.clone();
        async move {
            let mut attempt = 0;
            loop {
                match task.spawn(ctx.clone()).await {
                    Ok(()) => return Ok(()),
                    Err(e) if !e.is_retryable() || attempt >= retries => return Err(e),
                    Err(_) => attempt += 1,
                }

                tokio::select! {
                    _ = ctx.cancelled() => return Err(TaskError::Canceled),
                    _ = time::sleep(delay) => {}
                }
            }
        }
    })
}

/// Re-runs `task` until `ctx` is cancelled, sleeping `jitter(delay)` between
/// runs. Errors are logged and otherwise ignored; the result is always `Ok`.
pub fn forever(delay: Duration, task: TaskRef) -> TaskRef {
    let name = task.name().to_string();
    TaskFn::arc(name, move |ctx: CancellationToken| {
        let task = task.clone();
        async move {
            loop {
                if let Err(error) = task.spawn(ctx.clone()).await {
                    tracing::debug!(task = task.name(), %error, "run failed, repeating");
                }

                tokio::select! {
                    _ = ctx.cancelled() => return Ok::<_, TaskError>(()),
                    _ = time::sleep(jitter(delay)) => {}
                }
            }
        }
    })
}

/// Time of day in whole seconds since midnight (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    /// Builds a time of day; values past `23:59:59` wrap around midnight.
    pub const fn from_hms(hour: u32, minute: u32, second: u32) -> Self {
        Self(((hour as u64 * 3600 + minute as u64 * 60 + second as u64) % SECONDS_PER_DAY) as u32)
    }

    /// Current wall-clock time of day.
    pub fn now() -> Self {
        Self(wall_clock().as_secs() as u32)
    }

    /// Seconds since midnight.
    pub fn seconds(self) -> u32 {
        self.0
    }

    fn offset(self) -> Duration {
        Duration::from_secs(u64::from(self.0))
    }
}

/// Re-runs `task` while the wall clock lies within `[from, to]`.
///
/// Each run is cancelled when `to` is reached; runs are separated by
/// `jitter(delay)`. Returns `Ok(())` once the clock is outside the window or
/// `ctx` is cancelled, and the first error a run returns. Windows crossing
/// midnight are treated as empty.
pub fn restart_between(from: TimeOfDay, to: TimeOfDay, delay: Duration, task: TaskRef) -> TaskRef {
    within_window(from, to, delay, task, wall_clock)
}

fn within_window<C>(from: TimeOfDay, to: TimeOfDay, delay: Duration, task: TaskRef, clock: C) -> TaskRef
where
    C: Fn() -> Duration + Send + Sync + 'static,
{
    let name = task.name().to_string();
    let clock = Arc::new(clock);
    TaskFn::arc(name, move |ctx: CancellationToken| {
        let task = task.clone();
        let clock = clock.clone();
        async move {
            loop {
                let now = clock();
                let second = now.as_secs();
                if u64::from(from.0) > second || u64::from(to.0) < second {
                    return Ok(());
                }

                let remaining = to.offset().saturating_sub(now);
                if remaining.is_zero() {
                    return Ok(());
                }
                run_until(&task, &ctx, remaining).await?;

                tokio::select! {
                    _ = ctx.cancelled() => return Ok(()),
                    _ = time::sleep(jitter(delay)) => {}
                }
            }
        }
    })
}

/// Runs one instance of `task` under a child of `ctx`, cancelling it after `limit`.
async fn run_until(task: &TaskRef, ctx: &CancellationToken, limit: Duration) -> Result<(), TaskError> {
    let child = ctx.child_token();
    let mut run = task.spawn(child.clone());

    tokio::select! {
        res = &mut run => res,
        _ = time::sleep(limit) => {
            child.cancel();
            run.await
        }
    }
}

/// Time elapsed since midnight UTC.
fn wall_clock() -> Duration {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Duration::new(since_epoch.as_secs() % SECONDS_PER_DAY, since_epoch.subsec_nanos())
}
