use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeError;

/// Handle to a running [`StreamSupervisor`](crate::StreamSupervisor).
///
/// Cheap to clone; all clones drive the same supervisor.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<Inner>,
}

struct Inner {
    key: Arc<str>,
    checks: mpsc::Sender<()>,
    offset: watch::Receiver<Option<u64>>,
    token: CancellationToken,
    done: CancellationToken,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl StreamHandle {
    pub(crate) fn new(
        key: Arc<str>,
        checks: mpsc::Sender<()>,
        offset: watch::Receiver<Option<u64>>,
        token: CancellationToken,
        done: CancellationToken,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                key,
                checks,
                offset,
                token,
                done,
                join: Mutex::new(Some(join)),
            }),
        }
    }

    /// Checkpoint key of the stream.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Requests a poll as soon as possible.
    ///
    /// Never blocks: while a request is already pending, further calls
    /// coalesce into it.
    pub fn check(&self) {
        let _ = self.inner.checks.try_send(());
    }

    /// Last published offset, or `None` before the checkpoint was loaded.
    pub fn offset(&self) -> Option<u64> {
        *self.inner.offset.borrow()
    }

    /// Resolves once the supervisor loop has drained and stopped.
    pub async fn done(&self) {
        self.inner.done.cancelled().await;
    }

    /// Returns `true` once the supervisor loop has stopped.
    pub fn is_done(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    /// Stops the supervisor and waits until it has drained.
    ///
    /// The loop performs one final poll and commits its offset before it
    /// stops. Safe to call from several clones; later callers wait for the
    /// same drain.
    pub async fn close(&self) -> Result<(), RuntimeError> {
        self.inner.token.cancel();

        let join = self.inner.join.lock().await.take();
        match join {
            Some(join) => match join.await {
                Err(e) if e.is_panic() => Err(RuntimeError::SupervisorPanicked {
                    key: self.inner.key.to_string(),
                }),
                _ => Ok(()),
            },
            None => {
                self.done().await;
                Ok(())
            }
        }
    }
}
