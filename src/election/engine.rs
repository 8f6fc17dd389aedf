//! # Engine: singleton election over a heartbeat topic.
//!
//! Runs one supervised [`Task`](crate::Task) on at most one participant of a
//! fleet that shares only a lossy [`Heartbeat`] topic.
//!
//! ## Protocol
//! ```text
//! run()
//!   ├─► mint Tick { id, started_at }
//!   ├─► heartbeat.receive()            (failure → RuntimeError::Subscribe)
//!   └─► loop {
//!         select! {
//!           ctx cancelled      → shutdown, Ok(())
//!           heartbeat timer    → publish own tick, prune leases,
//!                                leader with leases → step down (cancel task)
//!           inbound tick       → older peer → grant lease (now + lease)
//!           election timer     → follower without leases → elect, spawn task
//!           task exit          → error → fatal; Ok/Canceled → Waiting(backoff)
//!           restart deadline   → respawn task
//!         }
//!       }
//! ```
//!
//! ## Rules
//! - All election state is owned by the loop; nothing is shared or locked.
//! - The loop never awaits network I/O inline: a tick publish is polled as one
//!   more branch, and a new publish starts only after the previous one finished,
//!   so our own ticks stay ordered. A publish is abandoned after one heartbeat
//!   interval and reported as failed.
//! - Earliest `started_at` wins; identical timestamps are not tie-broken.
//! - A stepped-down task drains in the background; no new task is started
//!   until it has exited, so one engine never runs two copies.
//! - Results of stepped-down tasks are discarded.

use futures::future::{BoxFuture, OptionFuture};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::lease::Leases;
use super::role::{Role, Running, Slot};
use crate::{
    config::ElectionConfig,
    error::{HeartbeatError, RuntimeError, TaskError},
    events::{Bus, Event, EventKind},
    heartbeat::Heartbeat,
    tasks::TaskRef,
    tick::Tick,
};

/// Singleton election engine.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use singlevisor::{ElectionConfig, Engine, LocalHeartbeat, TaskError, TaskFn, TaskRef};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let heartbeat = LocalHeartbeat::default();
///     let task: TaskRef = TaskFn::arc("relay", |ctx: CancellationToken| async move {
///         ctx.cancelled().await;
///         Ok::<_, TaskError>(())
///     });
///
///     let ctx = CancellationToken::new();
///     let stop = ctx.clone();
///     tokio::spawn(async move {
///         tokio::time::sleep(Duration::from_millis(50)).await;
///         stop.cancel();
///     });
///
///     let cfg = ElectionConfig::default()
///         .with_interval(Duration::from_millis(5))
///         .with_elections(Duration::from_millis(15));
///     Engine::new(cfg).run(ctx, &heartbeat, task).await?;
///     Ok(())
/// }
/// ```
pub struct Engine {
    cfg: ElectionConfig,
    bus: Bus,
}

impl Engine {
    /// Creates an engine with its own event bus.
    pub fn new(cfg: ElectionConfig) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self { cfg, bus }
    }

    /// Replaces the event bus (to share one bus between components).
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }

    /// Event bus the engine reports to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Engine configuration.
    pub fn config(&self) -> &ElectionConfig {
        &self.cfg
    }

    /// Runs the election until `ctx` is cancelled or a fatal error occurs.
    ///
    /// ### Returns
    /// - `Ok(())` once `ctx` is cancelled (the running task is cancelled and joined first)
    /// - `Err(Subscribe)` if the heartbeat subscription fails at startup
    /// - `Err(TaskFailed | TaskPanicked)` if the task fails while this instance leads
    /// - `Err(RestartsExhausted)` if the restart cap is exceeded
    /// - `Err(HeartbeatClosed)` if the inbound tick channel closes
    pub async fn run<H>(
        &self,
        ctx: CancellationToken,
        heartbeat: &H,
        task: TaskRef,
    ) -> Result<(), RuntimeError>
    where
        H: Heartbeat + ?Sized,
    {
        self.run_as(ctx, heartbeat, task, Tick::mint()).await
    }

    /// Runs the election with an explicit identity.
    pub(crate) async fn run_as<H>(
        &self,
        ctx: CancellationToken,
        heartbeat: &H,
        task: TaskRef,
        me: Tick,
    ) -> Result<(), RuntimeError>
    where
        H: Heartbeat + ?Sized,
    {
        let subscription = ctx.child_token();
        let mut inbound = match heartbeat.receive(subscription.clone()).await {
            Ok(rx) => rx,
            Err(error) => return Err(RuntimeError::Subscribe { error }),
        };

        let mut election = Election {
            cfg: &self.cfg,
            bus: &self.bus,
            task,
            me,
            ctx: ctx.clone(),
            leases: Leases::default(),
            role: Role::Follower,
            retiring: JoinSet::new(),
        };
        election.emit(EventKind::InstanceStarted);

        let heartbeat_timer = time::sleep(self.cfg.next_heartbeat());
        let election_timer = time::sleep(self.cfg.next_election());
        tokio::pin!(heartbeat_timer, election_timer);
        let mut publishing: Option<BoxFuture<'_, Result<(), HeartbeatError>>> = None;

        let result = loop {
            let restart_at = election.role.restart_at();

            tokio::select! {
                _ = ctx.cancelled() => break Ok(()),

                _ = &mut heartbeat_timer => {
                    heartbeat_timer.as_mut().reset(Instant::now() + self.cfg.next_heartbeat());
                    if publishing.is_none() {
                        let publish = heartbeat.publish(election.me.clone());
                        let timeout = self.cfg.interval;
                        publishing = Some(Box::pin(async move {
                            time::timeout(timeout, publish)
                                .await
                                .unwrap_or(Err(HeartbeatError::PublishTimeout { timeout }))
                        }));
                    }
                    election.on_heartbeat();
                }

                Some(res) = OptionFuture::from(publishing.as_mut()) => {
                    publishing = None;
                    if let Err(e) = res {
                        election.on_publish_failed(&e);
                    }
                }

                msg = inbound.recv() => match msg {
                    Some(tick) => election.on_tick(&tick),
                    None => break Err(RuntimeError::HeartbeatClosed),
                },

                _ = &mut election_timer => {
                    election_timer.as_mut().reset(Instant::now() + self.cfg.next_election());
                    election.on_election();
                }

                Some(res) = OptionFuture::from(election.role.running_mut()) => {
                    if let Err(e) = election.on_task_exit(res) {
                        break Err(e);
                    }
                }

                Some(()) = OptionFuture::from(restart_at.map(time::sleep_until)) => {
                    election.restart();
                }

                Some(_) = election.retiring.join_next(), if !election.retiring.is_empty() => {}
            }
        };

        drop(publishing);
        election.shutdown().await;
        subscription.cancel();

        let mut stopped = election.event(EventKind::EngineStopped);
        if let Err(e) = &result {
            stopped = stopped.with_reason(e.as_label());
        }
        self.bus.publish(stopped);
        result
    }
}

/// Runs a singleton election with a fresh [`Engine`] (see [`Engine::run`]).
pub async fn run<H>(
    ctx: CancellationToken,
    heartbeat: &H,
    task: TaskRef,
    cfg: ElectionConfig,
) -> Result<(), RuntimeError>
where
    H: Heartbeat + ?Sized,
{
    Engine::new(cfg).run(ctx, heartbeat, task).await
}

/// Loop-local election state (single writer).
struct Election<'a> {
    cfg: &'a ElectionConfig,
    bus: &'a Bus,
    task: TaskRef,
    me: Tick,
    ctx: CancellationToken,
    leases: Leases,
    role: Role,
    retiring: JoinSet<()>,
}

impl Election<'_> {
    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_task(self.task.name())
            .with_instance(self.me.instance_id.clone())
    }

    fn emit(&self, kind: EventKind) {
        self.bus.publish(self.event(kind));
    }

    fn on_heartbeat(&mut self) {
        self.leases.prune(Instant::now());
        if self.role.is_leader() && !self.leases.is_empty() {
            self.step_down();
        }
    }

    fn on_publish_failed(&self, err: &HeartbeatError) {
        self.bus.publish(
            self.event(EventKind::HeartbeatPublishFailed)
                .with_reason(err.to_string()),
        );
    }

    fn on_tick(&mut self, tick: &Tick) {
        if !self.me.defers_to(tick) {
            return;
        }
        self.leases.grant(Instant::now() + self.cfg.lease);
        self.bus.publish(
            Event::new(EventKind::LeaseGranted)
                .with_task(self.task.name())
                .with_instance(tick.instance_id.clone())
                .with_count(self.leases.len()),
        );
    }

    fn on_election(&mut self) {
        self.leases.prune(Instant::now());
        let blocked = self.role.is_leader() || !self.leases.is_empty();
        if blocked || !self.retiring.is_empty() {
            return;
        }

        self.emit(EventKind::ElectedLeader);
        let run = self.start(0);
        self.role = Role::Leader {
            slot: Slot::Running(run),
            restarts: 0,
        };
    }

    fn step_down(&mut self) {
        if let Some(run) = self.role.step_down() {
            run.token.cancel();
            self.retiring.spawn(async move {
                let _ = run.join.await;
            });
        }
        self.bus.publish(
            self.event(EventKind::LeadershipLost)
                .with_count(self.leases.len()),
        );
    }

    fn start(&self, restarts: u32) -> Running {
        let token = self.ctx.child_token();
        self.bus.publish(
            Event::new(EventKind::TaskStarting)
                .with_task(self.task.name())
                .with_restarts(restarts),
        );
        let join = tokio::spawn(self.task.spawn(token.clone()));
        Running { token, join }
    }

    fn on_task_exit(
        &mut self,
        res: Result<Result<(), TaskError>, JoinError>,
    ) -> Result<(), RuntimeError> {
        let task = self.task.name().to_string();
        let failure = match res {
            Ok(Ok(())) | Ok(Err(TaskError::Canceled)) => None,
            Ok(Err(error)) => Some(RuntimeError::TaskFailed { task, error }),
            Err(e) if e.is_panic() => Some(RuntimeError::TaskPanicked { task }),
            Err(_) => None,
        };

        if let Some(err) = failure {
            self.role = Role::Follower;
            self.bus.publish(
                Event::new(EventKind::TaskFailed)
                    .with_task(self.task.name())
                    .with_reason(err.to_string()),
            );
            return Err(err);
        }
        self.schedule_restart()
    }

    fn schedule_restart(&mut self) -> Result<(), RuntimeError> {
        let Role::Leader { slot, restarts } = &mut self.role else {
            return Ok(());
        };
        let performed = *restarts;
        let next = performed.saturating_add(1);

        self.bus.publish(
            Event::new(EventKind::TaskStopped)
                .with_task(self.task.name())
                .with_restarts(performed),
        );

        if !self.cfg.restart.allows(next) {
            self.role = Role::Follower;
            return Err(RuntimeError::RestartsExhausted {
                task: self.task.name().to_string(),
                restarts: performed,
            });
        }

        let delay = self.cfg.backoff.next(next);
        *slot = Slot::Waiting(Instant::now() + delay);
        *restarts = next;

        self.bus.publish(
            Event::new(EventKind::RestartScheduled)
                .with_task(self.task.name())
                .with_restarts(next)
                .with_delay(delay),
        );
        Ok(())
    }

    fn restart(&mut self) {
        let Role::Leader { restarts, .. } = self.role else {
            return;
        };
        let run = self.start(restarts);
        self.role = Role::Leader {
            slot: Slot::Running(run),
            restarts,
        };
    }

    async fn shutdown(&mut self) {
        if let Some(run) = self.role.step_down() {
            run.token.cancel();
            let _ = run.join.await;
        }
        while self.retiring.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeartbeatError;
    use crate::heartbeat::LocalHeartbeat;
    use crate::policies::{JitterPolicy, RestartPolicy};
    use crate::tasks::TaskFn;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, SystemTime};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn test_config() -> ElectionConfig {
        let mut cfg = ElectionConfig {
            jitter: JitterPolicy::None,
            ..ElectionConfig::default()
        }
        .with_interval(ms(50))
        .with_elections(ms(200))
        .with_lease(ms(1000));
        cfg.backoff.jitter = JitterPolicy::None;
        cfg
    }

    fn aged(id: &str, secs: u64) -> Tick {
        Tick::new(id, SystemTime::now() - Duration::from_secs(secs))
    }

    #[derive(Clone, Default)]
    struct Tracker {
        running: Arc<Mutex<Vec<String>>>,
        starts: Arc<AtomicUsize>,
    }

    impl Tracker {
        fn task(&self, name: &'static str) -> TaskRef {
            let tracker = self.clone();
            TaskFn::arc(name, move |ctx: CancellationToken| {
                let tracker = tracker.clone();
                async move {
                    tracker.starts.fetch_add(1, Ordering::SeqCst);
                    tracker.running.lock().unwrap().push(name.to_string());
                    ctx.cancelled().await;
                    tracker.running.lock().unwrap().retain(|n| n != name);
                    Ok::<_, TaskError>(())
                }
            })
        }

        fn running(&self) -> Vec<String> {
            self.running.lock().unwrap().clone()
        }

        fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }
    }

    fn participant(
        hb: &LocalHeartbeat,
        cfg: ElectionConfig,
        me: Tick,
        task: TaskRef,
        ctx: CancellationToken,
    ) -> JoinHandle<Result<(), RuntimeError>> {
        let hb = hb.clone();
        tokio::spawn(async move {
            let engine = Engine::new(cfg);
            engine.run_as(ctx, &hb, task, me).await
        })
    }

    struct FailingHeartbeat;

    #[async_trait]
    impl Heartbeat for FailingHeartbeat {
        async fn publish(&self, _tick: Tick) -> Result<(), HeartbeatError> {
            Ok(())
        }

        async fn receive(
            &self,
            _ctx: CancellationToken,
        ) -> Result<mpsc::Receiver<Tick>, HeartbeatError> {
            Err(HeartbeatError::Subscribe("broker down".into()))
        }
    }

    struct ClosedHeartbeat;

    #[async_trait]
    impl Heartbeat for ClosedHeartbeat {
        async fn publish(&self, _tick: Tick) -> Result<(), HeartbeatError> {
            Err(HeartbeatError::Publish("closed".into()))
        }

        async fn receive(
            &self,
            _ctx: CancellationToken,
        ) -> Result<mpsc::Receiver<Tick>, HeartbeatError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lone_participant_becomes_leader_and_stops_cleanly() {
        let hb = LocalHeartbeat::default();
        let tracker = Tracker::default();
        let ctx = CancellationToken::new();
        let engine = participant(&hb, test_config(), Tick::mint(), tracker.task("solo"), ctx.clone());

        time::sleep(ms(300)).await;
        assert_eq!(tracker.running(), vec!["solo"]);

        ctx.cancel();
        engine.await.unwrap().unwrap();
        assert!(tracker.running().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn earliest_started_participant_wins() {
        let hb = LocalHeartbeat::default();
        let tracker = Tracker::default();
        let (ctx_a, ctx_b, ctx_c) = (
            CancellationToken::new(),
            CancellationToken::new(),
            CancellationToken::new(),
        );

        let b = participant(&hb, test_config(), aged("b", 20), tracker.task("b"), ctx_b.clone());
        let c = participant(&hb, test_config(), aged("c", 10), tracker.task("c"), ctx_c.clone());
        time::sleep(ms(500)).await;
        assert_eq!(tracker.running(), vec!["b"]);

        // An older participant joins and takes over.
        let a = participant(&hb, test_config(), aged("a", 30), tracker.task("a"), ctx_a.clone());
        time::sleep(ms(1000)).await;
        assert_eq!(tracker.running(), vec!["a"]);

        // It leaves; the next oldest takes over once its leases expire.
        ctx_a.cancel();
        a.await.unwrap().unwrap();
        time::sleep(ms(2000)).await;
        assert_eq!(tracker.running(), vec!["b"]);

        ctx_b.cancel();
        ctx_c.cancel();
        b.await.unwrap().unwrap();
        c.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn older_tick_steps_leader_down_within_one_heartbeat() {
        let hb = LocalHeartbeat::default();
        let tracker = Tracker::default();
        let ctx = CancellationToken::new();
        let engine = participant(&hb, test_config(), aged("solo", 10), tracker.task("solo"), ctx.clone());

        time::sleep(ms(300)).await;
        assert_eq!(tracker.running(), vec!["solo"]);

        hb.publish(aged("elder", 60)).await.unwrap();
        time::sleep(ms(60)).await;
        assert!(tracker.running().is_empty());

        // Lease still held: no re-election.
        time::sleep(ms(500)).await;
        assert!(tracker.running().is_empty());

        // Lease expired: elected again.
        time::sleep(ms(1000)).await;
        assert_eq!(tracker.running(), vec!["solo"]);
        assert_eq!(tracker.starts(), 2);

        ctx.cancel();
        engine.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn younger_follower_leaving_and_rejoining_keeps_leader() {
        let hb = LocalHeartbeat::default();
        let tracker = Tracker::default();
        let ctx_a = CancellationToken::new();
        let a = participant(&hb, test_config(), aged("a", 30), tracker.task("a"), ctx_a.clone());
        let ctx_b = CancellationToken::new();
        let b = participant(&hb, test_config(), aged("b", 10), tracker.task("b"), ctx_b.clone());

        time::sleep(ms(500)).await;
        assert_eq!(tracker.running(), vec!["a"]);

        ctx_b.cancel();
        b.await.unwrap().unwrap();
        time::sleep(ms(300)).await;
        assert_eq!(tracker.running(), vec!["a"]);

        let ctx_b = CancellationToken::new();
        let b = participant(&hb, test_config(), aged("b", 5), tracker.task("b"), ctx_b.clone());
        time::sleep(ms(1500)).await;
        assert_eq!(tracker.running(), vec!["a"]);
        assert_eq!(tracker.starts(), 1);

        ctx_a.cancel();
        ctx_b.cancel();
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn no_leader_between_step_down_and_next_election() {
        let hb = LocalHeartbeat::default();
        let tracker = Tracker::default();
        let ctx = CancellationToken::new();

        // b leads alone; its heartbeats fall on multiples of 50ms.
        let b = participant(&hb, test_config(), aged("b", 10), tracker.task("b"), ctx.clone());
        time::sleep(ms(500)).await;
        assert_eq!(tracker.running(), vec!["b"]);

        // a joins at 500ms: ticks from 550ms, first election at 700ms.
        let a = participant(&hb, test_config(), aged("a", 30), tracker.task("a"), ctx.clone());
        time::sleep(ms(120)).await;
        assert!(tracker.running().is_empty());

        time::sleep(ms(70)).await;
        assert!(tracker.running().is_empty());

        time::sleep(ms(60)).await;
        assert_eq!(tracker.running(), vec!["a"]);
        assert_eq!(tracker.starts(), 2);

        ctx.cancel();
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn younger_ticks_are_ignored() {
        let hb = LocalHeartbeat::default();
        let tracker = Tracker::default();
        let ctx = CancellationToken::new();
        let engine = participant(&hb, test_config(), aged("solo", 10), tracker.task("solo"), ctx.clone());

        time::sleep(ms(300)).await;
        hb.publish(aged("junior", 1)).await.unwrap();
        time::sleep(ms(200)).await;
        assert_eq!(tracker.running(), vec!["solo"]);
        assert_eq!(tracker.starts(), 1);

        ctx.cancel();
        engine.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn task_error_while_leader_is_fatal() {
        let hb = LocalHeartbeat::default();
        let task: TaskRef = TaskFn::arc("broken", |_ctx: CancellationToken| async {
            Err::<(), _>(TaskError::Fail {
                error: "boom".into(),
            })
        });

        let err = Engine::new(test_config())
            .run(CancellationToken::new(), &hb, task)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::TaskFailed { ref task, .. } if task == "broken"));
    }

    #[tokio::test(start_paused = true)]
    async fn canceled_error_is_treated_as_yield() {
        let hb = LocalHeartbeat::default();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task: TaskRef = TaskFn::arc("yield", move |_ctx: CancellationToken| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(TaskError::Canceled) }
        });

        let cfg = test_config().with_restart(RestartPolicy::Limited { max: 1 });
        let err = Engine::new(cfg)
            .run(CancellationToken::new(), &hb, task)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::RestartsExhausted { restarts: 1, .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_wrapped_task_is_restarted() {
        let hb = LocalHeartbeat::default();
        let tracker = Tracker::default();
        let task = crate::filters::stop_after(ms(100), tracker.task("rotating"));

        let cfg = test_config().with_restart(RestartPolicy::Limited { max: 2 });
        let err = Engine::new(cfg)
            .run(CancellationToken::new(), &hb, task)
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::RestartsExhausted { restarts: 2, .. }));
        assert_eq!(tracker.starts(), 3);
    }

    #[tokio::test]
    async fn subscription_failure_is_fatal() {
        let task: TaskRef = TaskFn::arc("never", |_ctx: CancellationToken| async { Ok::<_, TaskError>(()) });
        let err = Engine::new(test_config())
            .run(CancellationToken::new(), &FailingHeartbeat, task)
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "runtime_subscribe_failed");
    }

    #[tokio::test(start_paused = true)]
    async fn closed_inbound_channel_is_fatal() {
        let tracker = Tracker::default();
        let err = Engine::new(test_config())
            .run(CancellationToken::new(), &ClosedHeartbeat, tracker.task("blind"))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::HeartbeatClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn yielding_task_restarts_until_cap() {
        let hb = LocalHeartbeat::default();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task: TaskRef = TaskFn::arc("yield", move |_ctx: CancellationToken| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, TaskError>(()) }
        });

        let cfg = test_config().with_restart(RestartPolicy::Limited { max: 3 });
        let err = Engine::new(cfg)
            .run(CancellationToken::new(), &hb, task)
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::RestartsExhausted { restarts: 3, .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_delay_rises_after_twenty_yields() {
        let hb = LocalHeartbeat::default();
        let task: TaskRef = TaskFn::arc("yield", |_ctx: CancellationToken| async { Ok::<_, TaskError>(()) });

        let mut cfg = test_config().with_restart(RestartPolicy::Limited { max: 101 });
        cfg.backoff.medium = ms(100);
        cfg.backoff.long = ms(150);

        let engine = Engine::new(cfg);
        let mut rx = engine.bus().subscribe();
        let drain = tokio::spawn(async move {
            let mut delays = Vec::new();
            while let Ok(ev) = rx.recv().await {
                match ev.kind {
                    EventKind::RestartScheduled => {
                        delays.push((ev.restarts.unwrap_or(0), ev.delay_ms.unwrap_or(0)));
                    }
                    EventKind::EngineStopped => break,
                    _ => {}
                }
            }
            delays
        });

        let err = engine
            .run(CancellationToken::new(), &hb, task)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::RestartsExhausted { restarts: 101, .. }));

        let delays = drain.await.unwrap();
        assert_eq!(delays.len(), 101);
        for (restarts, delay) in delays {
            match restarts {
                0..=19 => assert_eq!(delay, 50, "restart {restarts}"),
                20..=99 => assert_eq!(delay, 100, "restart {restarts}"),
                _ => assert_eq!(delay, 150, "restart {restarts}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failures_are_reported_not_fatal() {
        let engine = Engine::new(test_config());
        let mut rx = engine.bus().subscribe();
        let ctx = CancellationToken::new();
        let stop = ctx.clone();

        tokio::spawn(async move {
            time::sleep(ms(120)).await;
            stop.cancel();
        });
        let task: TaskRef = TaskFn::arc("quiet", |_ctx: CancellationToken| async { Ok::<_, TaskError>(()) });

        struct LossyPublish(LocalHeartbeat);

        #[async_trait]
        impl Heartbeat for LossyPublish {
            async fn publish(&self, _tick: Tick) -> Result<(), HeartbeatError> {
                Err(HeartbeatError::Publish("dropped".into()))
            }

            async fn receive(
                &self,
                ctx: CancellationToken,
            ) -> Result<mpsc::Receiver<Tick>, HeartbeatError> {
                self.0.receive(ctx).await
            }
        }

        engine
            .run(ctx, &LossyPublish(LocalHeartbeat::default()), task)
            .await
            .unwrap();

        let mut failures = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::HeartbeatPublishFailed {
                failures += 1;
            }
        }
        assert_eq!(failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_publish_times_out_and_is_reported() {
        struct Hanging(LocalHeartbeat);

        #[async_trait]
        impl Heartbeat for Hanging {
            async fn publish(&self, _tick: Tick) -> Result<(), HeartbeatError> {
                futures::future::pending().await
            }

            async fn receive(
                &self,
                ctx: CancellationToken,
            ) -> Result<mpsc::Receiver<Tick>, HeartbeatError> {
                self.0.receive(ctx).await
            }
        }

        let engine = Engine::new(test_config());
        let mut rx = engine.bus().subscribe();
        let ctx = CancellationToken::new();
        let stop = ctx.clone();
        tokio::spawn(async move {
            time::sleep(ms(260)).await;
            stop.cancel();
        });
        let tracker = Tracker::default();

        engine
            .run(ctx, &Hanging(LocalHeartbeat::default()), tracker.task("quiet"))
            .await
            .unwrap();

        let mut timeouts = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::HeartbeatPublishFailed {
                assert_eq!(ev.reason.as_deref(), Some("publish timed out after 50ms"));
                timeouts += 1;
            }
        }
        assert!(timeouts >= 2, "timeouts: {timeouts}");
    }
}
