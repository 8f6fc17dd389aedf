//! # Heartbeat transport.
//!
//! [`Heartbeat`] is the narrow publish/subscribe contract the election engine
//! consumes. One logical topic is used per supervised task. Delivery may be
//! lossy, but a single publisher's ticks must not be reordered.
//!
//! [`LocalHeartbeat`] is an in-process topic over [`tokio::sync::broadcast`],
//! suitable for tests and for several engines inside one process.
//!
//! ## Architecture
//! ```text
//! Engine A ─ publish(Tick) ─┐                 ┌─► forwarder ─► mpsc ─► Engine A
//! Engine B ─ publish(Tick) ─┼─► broadcast ────┼─► forwarder ─► mpsc ─► Engine B
//! Engine C ─ publish(Tick) ─┘   (ring buffer) └─► forwarder ─► mpsc ─► Engine C
//! ```

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::HeartbeatError;
use crate::tick::Tick;

/// Capacity of the per-subscriber delivery queue.
const DELIVERY_CAPACITY: usize = 16;

/// Publish/subscribe primitive carrying [`Tick`]s on one topic.
#[async_trait]
pub trait Heartbeat: Send + Sync {
    /// Broadcasts a tick to all current subscribers.
    async fn publish(&self, tick: Tick) -> Result<(), HeartbeatError>;

    /// Subscribes to the topic.
    ///
    /// Ticks are delivered on the returned receiver until `ctx` is cancelled,
    /// which unsubscribes and closes the receiver.
    async fn receive(&self, ctx: CancellationToken) -> Result<mpsc::Receiver<Tick>, HeartbeatError>;
}

/// In-process heartbeat topic.
///
/// ### Properties
/// - **Lossy**: a subscriber whose queue is full, or that lags behind the ring
///   buffer, misses ticks.
/// - **Ordered**: ticks from one publisher arrive in publish order.
/// - **Cloneable**: clones share the same topic.
#[derive(Clone, Debug)]
pub struct LocalHeartbeat {
    tx: broadcast::Sender<Tick>,
}

impl LocalHeartbeat {
    /// Creates a topic whose ring buffer holds `capacity` ticks (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Number of live subscriptions.
    pub fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalHeartbeat {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Heartbeat for LocalHeartbeat {
    async fn publish(&self, tick: Tick) -> Result<(), HeartbeatError> {
        // No subscribers is not an error: the tick is simply unobserved.
        let _ = self.tx.send(tick);
        Ok(())
    }

    async fn receive(&self, ctx: CancellationToken) -> Result<mpsc::Receiver<Tick>, HeartbeatError> {
        let mut rx = self.tx.subscribe();
        let (out, inbound) = mpsc::channel(DELIVERY_CAPACITY);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(tick) => {
                            if let Err(mpsc::error::TrySendError::Closed(_)) = out.try_send(tick) {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            // Unsubscribe before closing delivery so receivers observe both together.
            drop(rx);
            drop(out);
        });

        Ok(inbound)
    }
}
