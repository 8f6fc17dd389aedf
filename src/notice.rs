//! # Notice dedup processor.
//!
//! Consumes keyed "aggregate changed" notices and runs at most one handler per
//! aggregate id at a time.
//!
//! ## Flow
//! ```text
//! inbound ─► loop ─┬─ id not in flight → insert, spawn worker ─► handler.handle()
//!                  │                                              └─► notice.close()
//!                  ├─ id in flight     → duplicate (DuplicatePolicy)
//!                  └─ worker finished  → remove id
//!
//! ctx cancelled / inbound closed → stop accepting, cancel handlers,
//!                                  join every worker, return
//! ```
//!
//! The in-flight set is owned by the loop; workers report back through the
//! loop's [`JoinSet`], which also serves as the in-flight counter.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{DuplicatePolicy, NoticeConfig},
    events::{Bus, Event, EventKind},
};

/// A keyed change notification.
#[async_trait]
pub trait Notice: Send + Sync + 'static {
    /// Aggregate the notice refers to (the dedup key).
    fn aggregate_id(&self) -> &str;

    /// Acknowledges the notice to its originator.
    async fn close(self);
}

/// Work performed for an accepted notice.
#[async_trait]
pub trait NoticeHandler<N: Notice>: Send + Sync + 'static {
    /// Handles one notice. Should return promptly once `ctx` is cancelled.
    async fn handle(&self, ctx: CancellationToken, notice: &N);
}

/// What a worker reports back to the loop.
enum Finished {
    Handled { id: String, panic: Option<String> },
    Acknowledged,
}

/// Runs handlers for incoming notices, one per aggregate id at a time.
pub struct Processor {
    cfg: NoticeConfig,
    bus: Bus,
}

impl Processor {
    /// Creates a processor with its own event bus.
    pub fn new(cfg: NoticeConfig) -> Self {
        Self {
            cfg,
            bus: Bus::default(),
        }
    }

    /// Replaces the event bus.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }

    /// Event bus the processor reports to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Processes `inbound` until `ctx` is cancelled or the channel closes, then
    /// cancels every in-flight handler and waits for it before returning.
    pub async fn process<N, H>(
        &self,
        ctx: CancellationToken,
        mut inbound: mpsc::Receiver<N>,
        handler: Arc<H>,
    ) where
        N: Notice,
        H: NoticeHandler<N> + ?Sized,
    {
        let handlers = ctx.child_token();
        let mut in_flight: HashSet<String> = HashSet::new();
        let mut workers: JoinSet<Finished> = JoinSet::new();

        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,

                Some(res) = workers.join_next(), if !workers.is_empty() => {
                    self.finish(&mut in_flight, res);
                }

                msg = inbound.recv() => match msg {
                    Some(notice) => self.accept(&handlers, &mut in_flight, &mut workers, &handler, notice),
                    None => break,
                },
            }
        }

        inbound.close();
        handlers.cancel();
        while let Some(res) = workers.join_next().await {
            self.finish(&mut in_flight, res);
        }
        self.bus.publish(Event::new(EventKind::ProcessorDrained));
    }

    fn accept<N, H>(
        &self,
        ctx: &CancellationToken,
        in_flight: &mut HashSet<String>,
        workers: &mut JoinSet<Finished>,
        handler: &Arc<H>,
        notice: N,
    ) where
        N: Notice,
        H: NoticeHandler<N> + ?Sized,
    {
        let id = notice.aggregate_id().to_string();

        if in_flight.contains(&id) {
            let acknowledge = self.cfg.duplicates == DuplicatePolicy::Acknowledge;
            self.bus.publish(
                Event::new(EventKind::NoticeDuplicate)
                    .with_key(id)
                    .with_reason(if acknowledge { "acknowledged" } else { "dropped" }),
            );
            if acknowledge {
                workers.spawn(async move {
                    notice.close().await;
                    Finished::Acknowledged
                });
            }
            return;
        }

        in_flight.insert(id.clone());
        self.bus.publish(
            Event::new(EventKind::NoticeAccepted)
                .with_key(id.as_str())
                .with_count(in_flight.len()),
        );

        let handler = Arc::clone(handler);
        let ctx = ctx.clone();
        workers.spawn(async move {
            let outcome = AssertUnwindSafe(handler.handle(ctx, &notice))
                .catch_unwind()
                .await;
            notice.close().await;
            Finished::Handled {
                id,
                panic: outcome.err().map(panic_reason),
            }
        });
    }

    fn finish(&self, in_flight: &mut HashSet<String>, res: Result<Finished, JoinError>) {
        let Ok(Finished::Handled { id, panic }) = res else {
            return;
        };
        in_flight.remove(&id);

        let event = match panic {
            Some(reason) => Event::new(EventKind::NoticePanicked).with_reason(reason),
            None => Event::new(EventKind::NoticeFinished),
        };
        self.bus.publish(event.with_key(id));
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(NoticeConfig::default())
    }
}

fn panic_reason(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time;

    type Log = Arc<Mutex<Vec<String>>>;

    struct TestNotice {
        id: String,
        closed: Log,
    }

    #[async_trait]
    impl Notice for TestNotice {
        fn aggregate_id(&self) -> &str {
            &self.id
        }

        async fn close(self) {
            self.closed.lock().unwrap().push(self.id);
        }
    }

    /// Handler that records calls and blocks until the gate opens.
    struct Gated {
        calls: Log,
        gate: watch::Receiver<bool>,
    }

    #[async_trait]
    impl NoticeHandler<TestNotice> for Gated {
        async fn handle(&self, _ctx: CancellationToken, notice: &TestNotice) {
            self.calls.lock().unwrap().push(notice.id.clone());
            let mut gate = self.gate.clone();
            let _ = gate.wait_for(|open| *open).await;
        }
    }

    struct Harness {
        tx: mpsc::Sender<TestNotice>,
        calls: Log,
        closed: Log,
        gate: watch::Sender<bool>,
    }

    impl Harness {
        fn start(
            cfg: NoticeConfig,
            ctx: CancellationToken,
        ) -> (Self, tokio::task::JoinHandle<()>, tokio::sync::broadcast::Receiver<Event>) {
            let (tx, rx) = mpsc::channel(16);
            let (gate, gate_rx) = watch::channel(false);
            let calls = Log::default();
            let handler = Arc::new(Gated {
                calls: calls.clone(),
                gate: gate_rx,
            });

            let processor = Processor::new(cfg);
            let events = processor.bus().subscribe();
            let join = tokio::spawn(async move { processor.process(ctx, rx, handler).await });

            let harness = Self {
                tx,
                calls,
                closed: Log::default(),
                gate,
            };
            (harness, join, events)
        }

        async fn send(&self, id: &str) {
            let notice = TestNotice {
                id: id.to_string(),
                closed: self.closed.clone(),
            };
            self.tx.send(notice).await.unwrap();
            time::sleep(Duration::from_millis(1)).await;
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn closed(&self) -> Vec<String> {
            self.closed.lock().unwrap().clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_in_flight_is_dropped() {
        let (h, join, _events) = Harness::start(NoticeConfig::default(), CancellationToken::new());

        h.send("abc").await;
        h.send("abc").await;
        assert_eq!(h.calls(), vec!["abc"]);

        h.gate.send_replace(true);
        drop(h.tx);
        join.await.unwrap();

        assert_eq!(h.calls.lock().unwrap().len(), 1);
        assert_eq!(h.closed.lock().unwrap().as_slice(), ["abc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledge_policy_closes_duplicates() {
        let cfg = NoticeConfig {
            duplicates: DuplicatePolicy::Acknowledge,
        };
        let (h, join, _events) = Harness::start(cfg, CancellationToken::new());

        h.send("abc").await;
        h.send("abc").await;
        assert_eq!(h.calls(), vec!["abc"]);
        assert_eq!(h.closed(), vec!["abc"]);

        h.gate.send_replace(true);
        drop(h.tx);
        join.await.unwrap();
        assert_eq!(h.closed.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_ids_run_concurrently_and_ids_are_reusable() {
        let (h, join, _events) = Harness::start(NoticeConfig::default(), CancellationToken::new());

        h.send("a").await;
        h.send("b").await;
        assert_eq!(h.calls(), vec!["a", "b"]);

        h.gate.send_replace(true);
        time::sleep(Duration::from_millis(1)).await;
        h.send("a").await;
        assert_eq!(h.calls(), vec!["a", "b", "a"]);

        drop(h.tx);
        join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_waits_for_in_flight_handler() {
        let ctx = CancellationToken::new();
        let (h, join, mut events) = Harness::start(NoticeConfig::default(), ctx.clone());

        h.send("abc").await;
        ctx.cancel();
        time::sleep(Duration::from_millis(50)).await;
        assert!(!join.is_finished());
        assert!(h.closed().is_empty());

        h.gate.send_replace(true);
        join.await.unwrap();
        assert_eq!(h.closed(), vec!["abc"]);

        let mut kinds = Vec::new();
        while let Ok(ev) = events.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::NoticeAccepted,
                EventKind::NoticeFinished,
                EventKind::ProcessorDrained,
            ]
        );
    }

    struct Panicking;

    #[async_trait]
    impl NoticeHandler<TestNotice> for Panicking {
        async fn handle(&self, _ctx: CancellationToken, notice: &TestNotice) {
            if notice.id == "bad" {
                panic!("handler failed for {}", notice.id);
            }
        }
    }

    #[tokio::test]
    async fn panicking_handler_still_closes_and_frees_id() {
        let processor = Processor::default();
        let mut events = processor.bus().subscribe();
        let closed = Log::default();
        let (tx, rx) = mpsc::channel(4);

        for id in ["bad", "ok"] {
            tx.send(TestNotice {
                id: id.to_string(),
                closed: closed.clone(),
            })
            .await
            .unwrap();
        }
        drop(tx);
        processor
            .process(CancellationToken::new(), rx, Arc::new(Panicking))
            .await;

        let mut done = closed.lock().unwrap().clone();
        done.sort();
        assert_eq!(done, vec!["bad", "ok"]);

        let mut panicked = None;
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::NoticePanicked {
                panicked = ev.reason.clone();
            }
        }
        assert_eq!(panicked.as_deref(), Some("handler failed for bad"));
    }

    struct UntilCancelled;

    #[async_trait]
    impl NoticeHandler<TestNotice> for UntilCancelled {
        async fn handle(&self, ctx: CancellationToken, _notice: &TestNotice) {
            ctx.cancelled().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn closed_inbound_cancels_in_flight_handlers() {
        let processor = Processor::default();
        let closed = Log::default();
        let (tx, rx) = mpsc::channel(4);

        tx.send(TestNotice {
            id: "abc".to_string(),
            closed: closed.clone(),
        })
        .await
        .unwrap();
        drop(tx);

        let ctx = CancellationToken::new();
        time::timeout(
            Duration::from_secs(2),
            processor.process(ctx.clone(), rx, Arc::new(UntilCancelled)),
        )
        .await
        .expect("drain finished");

        assert_eq!(closed.lock().unwrap().as_slice(), ["abc"]);
        assert!(!ctx.is_cancelled());
    }
}
