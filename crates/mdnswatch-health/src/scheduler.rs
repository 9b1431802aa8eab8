//! Scheduler: drives a [`Task`] at a fixed interval, single-flight.
//!
//! ```text
//! interval ticker ──try_send──▶ [one slot] ──recv──▶ drive loop ──▶ Task::run
//!   (extra ticks dropped)
//! ```
//!
//! The first tick fires immediately. While a cycle runs, at most one tick
//! waits in the slot, so an overrunning cycle is followed by exactly one
//! more cycle rather than a burst of catch-up runs.
//!
//! Cycle outcomes are broadcast as [`CycleEvent`]s. Failures caused by
//! deliberate cancellation are never reported.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::check::Check;
use crate::error::{
    CheckError, ConfigError, SchedulerError, SchedulerResult, SharedCheckError,
};
use crate::ports::{Probe, Publisher};
use crate::scope::Scope;

/// Capacity of the cycle event channel. Slow subscribers lag, the
/// scheduler never waits for them.
const EVENT_CAPACITY: usize = 64;

/// Work executed once per tick.
pub trait Task: Send + Sync + 'static {
    fn run(&self, scope: &Scope) -> impl Future<Output = Result<(), CheckError>> + Send;
}

/// A [`Check`] bound to the static host list it probes each cycle.
pub struct CheckTask<P, B> {
    check: Check<P, B>,
    hosts: Vec<String>,
}

impl<P: Probe, B: Publisher> CheckTask<P, B> {
    pub fn new(check: Check<P, B>, hosts: Vec<String>) -> Self {
        Self { check, hosts }
    }
}

impl<P: Probe, B: Publisher> Task for CheckTask<P, B> {
    async fn run(&self, scope: &Scope) -> Result<(), CheckError> {
        self.check.execute(scope, &self.hosts).await.map(|_| ())
    }
}

/// Lifecycle of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
}

/// Outcome notifications for each cycle.
#[derive(Debug, Clone)]
pub enum CycleEvent {
    Started {
        trace_id: Uuid,
    },
    Completed {
        trace_id: Uuid,
        elapsed: Duration,
    },
    Failed {
        trace_id: Uuid,
        elapsed: Duration,
        error: SharedCheckError,
    },
}

/// Single-flight periodic driver.
pub struct Scheduler<T> {
    task: Arc<T>,
    interval: Duration,
    cycle_timeout: Option<Duration>,
    state: watch::Sender<RunState>,
    shutdown: Scope,
    events: broadcast::Sender<CycleEvent>,
}

impl<T: Task> Scheduler<T> {
    /// Create a scheduler running `task` every `interval`.
    pub fn new(task: Arc<T>, interval: Duration) -> SchedulerResult<Self> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval.into());
        }
        let (state, _) = watch::channel(RunState::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            task,
            interval,
            cycle_timeout: None,
            state,
            shutdown: Scope::new(),
            events,
        })
    }

    /// Bound every cycle by `timeout`. Probes still running when it
    /// elapses fail the cycle.
    pub fn with_cycle_timeout(mut self, timeout: Duration) -> SchedulerResult<Self> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroCycleTimeout.into());
        }
        self.cycle_timeout = Some(timeout);
        Ok(self)
    }

    /// Subscribe to cycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.events.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    pub async fn start(&self) -> SchedulerResult<()> {
        self.start_with(&Scope::new()).await
    }

    /// Run until `scope` ends or [`shutdown`](Self::shutdown) is called.
    ///
    /// Fails immediately if another run is active. When `scope` ends the
    /// scheduler returns to [`RunState::Idle`] and may be started again.
    pub async fn start_with(&self, scope: &Scope) -> SchedulerResult<()> {
        let mut rejected = None;
        self.state.send_if_modified(|state| match *state {
            RunState::Idle => {
                *state = RunState::Running;
                true
            }
            RunState::Running => {
                rejected = Some(SchedulerError::AlreadyRunning);
                false
            }
            RunState::Stopped => {
                rejected = Some(SchedulerError::Stopped);
                false
            }
        });
        if let Some(err) = rejected {
            return Err(err);
        }

        let run = Scope::new();
        let forward = {
            let run = run.clone();
            let scope = scope.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = scope.done() => {}
                    _ = shutdown.done() => {}
                }
                run.cancel();
            })
        };

        let _guard = RunGuard {
            state: &self.state,
            shutdown: &self.shutdown,
            forward,
        };

        debug!(interval = ?self.interval, "scheduler running");
        self.drive(&run).await;
        Ok(())
    }

    /// Request the scheduler to stop and wait for the active run to exit,
    /// for no longer than `scope` allows.
    ///
    /// Idempotent. After shutdown the scheduler cannot be started again.
    pub async fn shutdown(&self, scope: &Scope) -> SchedulerResult<()> {
        self.shutdown.cancel();
        self.state.send_if_modified(|state| {
            if *state == RunState::Idle {
                *state = RunState::Stopped;
                true
            } else {
                false
            }
        });

        let mut state = self.state.subscribe();
        tokio::select! {
            result = state.wait_for(|s| *s != RunState::Running) => {
                result.map(|_| ()).map_err(|_| SchedulerError::Stopped)
            }
            _ = scope.done() => Err(SchedulerError::ShutdownTimeout),
        }
    }

    async fn drive(&self, run: &Scope) {
        let mut ticker = Ticker::new(self.interval);

        loop {
            tokio::select! {
                biased;
                _ = run.done() => break,
                tick = ticker.recv() => {
                    if tick.is_none() {
                        break;
                    }
                    self.run_cycle(run).await;
                }
            }
        }
    }

    async fn run_cycle(&self, run: &Scope) {
        let trace_id = Uuid::now_v7();
        let cycle = match self.cycle_timeout {
            Some(timeout) => run.with_timeout(timeout),
            None => run.child(),
        };
        let started = Instant::now();
        let _ = self.events.send(CycleEvent::Started { trace_id });

        let result = self
            .task
            .run(&cycle)
            .instrument(info_span!("cycle", %trace_id))
            .await;
        cycle.cancel();
        let elapsed = started.elapsed();

        let event = match result {
            Ok(()) => CycleEvent::Completed { trace_id, elapsed },
            Err(e) if e.is_cancellation() => {
                debug!(%trace_id, "cycle cancelled");
                return;
            }
            Err(e) => CycleEvent::Failed {
                trace_id,
                elapsed,
                error: Arc::new(e),
            },
        };
        let _ = self.events.send(event);
    }
}

/// Leaves the running state when a run ends, including when the `start`
/// future is dropped mid-run.
struct RunGuard<'a> {
    state: &'a watch::Sender<RunState>,
    shutdown: &'a Scope,
    forward: JoinHandle<()>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.forward.abort();
        // Read the shutdown flag under the state lock so a concurrent
        // shutdown always ends in Stopped.
        let shutdown = self.shutdown;
        self.state.send_modify(|state| {
            *state = if shutdown.is_done() {
                RunState::Stopped
            } else {
                RunState::Idle
            };
            debug!(state = ?*state, "scheduler loop exited");
        });
    }
}

/// Fixed-interval tick source with an immediate first tick and a single
/// buffered slot.
struct Ticker {
    rx: mpsc::Receiver<Instant>,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn new(period: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let handle = tokio::spawn(async move {
            loop {
                let at = interval.tick().await;
                match tx.try_send(at) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!("previous tick still pending, dropping tick");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        });

        Self { rx, handle }
    }

    async fn recv(&mut self) -> Option<Instant> {
        self.rx.recv().await
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
