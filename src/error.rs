//! Error types used by the election engine, the stream supervisor and their collaborators.
//!
//! This module defines:
//!
//! - [`RuntimeError`] - fatal errors surfaced by [`Engine::run`](crate::Engine::run)
//!   and [`StreamHandle::close`](crate::StreamHandle::close).
//! - [`TaskError`] - errors returned by supervised tasks.
//! - [`HeartbeatError`], [`CheckpointError`], [`StreamError`] - errors reported by
//!   the external collaborators.
//!
//! Every enum provides `as_label` (a stable snake_case label for logs/metrics).
//! Collaborator errors are transient by contract: the runtime reports them as
//! events and retries, it never returns them to the caller.

use std::time::Duration;
use thiserror::Error;

/// # Fatal errors produced by the runtime.
///
/// Only these ever leave [`Engine::run`](crate::Engine::run). Losing an
/// election is not an error.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Subscribing to the heartbeat topic failed at startup.
    #[error("heartbeat subscription failed: {error}")]
    Subscribe {
        /// Underlying transport error.
        error: HeartbeatError,
    },

    /// The inbound tick channel closed while the engine was still running.
    #[error("heartbeat channel closed; peers are no longer visible")]
    HeartbeatClosed,

    /// The supervised task returned an error while this instance was leader.
    #[error("task {task:?} failed while leader: {error}")]
    TaskFailed {
        /// Task name.
        task: String,
        /// Error returned by the task.
        error: TaskError,
    },

    /// The supervised task panicked while this instance was leader.
    #[error("task {task:?} panicked while leader")]
    TaskPanicked {
        /// Task name.
        task: String,
    },

    /// The task kept yielding and the configured restart cap was exceeded.
    #[error("task {task:?} exceeded restart cap after {restarts} restarts")]
    RestartsExhausted {
        /// Task name.
        task: String,
        /// Consecutive restarts performed before giving up.
        restarts: u32,
    },

    /// The stream supervisor loop panicked instead of draining.
    #[error("stream supervisor for {key:?} panicked")]
    SupervisorPanicked {
        /// Checkpoint key of the stream.
        key: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use singlevisor::RuntimeError;
    ///
    /// let err = RuntimeError::HeartbeatClosed;
    /// assert_eq!(err.as_label(), "runtime_heartbeat_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Subscribe { .. } => "runtime_subscribe_failed",
            RuntimeError::HeartbeatClosed => "runtime_heartbeat_closed",
            RuntimeError::TaskFailed { .. } => "runtime_task_failed",
            RuntimeError::TaskPanicked { .. } => "runtime_task_panicked",
            RuntimeError::RestartsExhausted { .. } => "runtime_restarts_exhausted",
            RuntimeError::SupervisorPanicked { .. } => "runtime_supervisor_panicked",
        }
    }
}

/// # Errors returned by a supervised task.
///
/// [`TaskError::Canceled`] is a graceful exit: the engine treats it exactly like `Ok(())`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task gave up waiting on something with a deadline (retryable).
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable fatal error (should not be retried).
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Task execution failed but may succeed if retried.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task observed cancellation of its context.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use singlevisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `true` for [`TaskError::Fail`] and [`TaskError::Timeout`].
    ///
    /// # Example
    /// ```
    /// use singlevisor::TaskError;
    ///
    /// assert!(TaskError::Fail { error: "boom".into() }.is_retryable());
    /// assert!(!TaskError::Fatal { error: "nope".into() }.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Fail { .. } | TaskError::Timeout { .. })
    }

    /// Returns `true` for [`TaskError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// Errors reported by a [`Heartbeat`](crate::Heartbeat) transport.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HeartbeatError {
    /// Subscription to the topic could not be established.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// A tick could not be published.
    #[error("publish failed: {0}")]
    Publish(String),

    /// A tick publish did not finish within one heartbeat interval.
    #[error("publish timed out after {timeout:?}")]
    PublishTimeout { timeout: Duration },
}

impl HeartbeatError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HeartbeatError::Subscribe(_) => "heartbeat_subscribe_failed",
            HeartbeatError::Publish(_) => "heartbeat_publish_failed",
            HeartbeatError::PublishTimeout { .. } => "heartbeat_publish_timeout",
        }
    }
}

/// Errors reported by a [`CheckpointStore`](crate::CheckpointStore).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// The write would move the stored offset backwards and was rejected.
    #[error("checkpoint {key:?} regression: stored {stored}, attempted {attempted}")]
    Regression {
        /// Checkpoint key.
        key: String,
        /// Offset currently persisted.
        stored: u64,
        /// Offset that was refused.
        attempted: u64,
    },

    /// The backing store failed.
    #[error("checkpoint backend error: {0}")]
    Backend(String),
}

impl CheckpointError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CheckpointError::Regression { .. } => "checkpoint_regression",
            CheckpointError::Backend(_) => "checkpoint_backend",
        }
    }
}

/// Errors reported by a [`RecordSource`](crate::RecordSource) or [`Publisher`](crate::Publisher).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StreamError {
    /// Reading a batch from the record source failed.
    #[error("read failed: {0}")]
    Read(String),

    /// Publishing a record downstream failed.
    #[error("publish failed: {0}")]
    Publish(String),
}

impl StreamError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::Read(_) => "stream_read_failed",
            StreamError::Publish(_) => "stream_publish_failed",
        }
    }
}
