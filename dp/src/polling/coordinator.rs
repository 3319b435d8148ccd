//! Main polling coordinator task
//!
//! One task owns the registry, the scheduler and the round guard. Requests
//! from handles, timer ticks, visibility transitions and round completions
//! are all handled on this task, so none of that state needs a lock.

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use super::config::PollingConfig;
use super::executor::{RoundReport, execute_round, invoke_registered};
use super::handle::PollingHandle;
use super::messages::{PollRequest, PollingMetrics, PollingState};
use super::registry::Registry;
use super::scheduler::{Scheduler, Transition};
use super::visibility::{Visibility, VisibilityMonitor};
use crate::events::{EventBus, PollEvent, Trigger};

/// A round that has been started and not yet settled
struct InFlightRound {
    round: u64,
    trigger: Trigger,
    task: JoinHandle<RoundReport>,
}

/// Wait for the in-flight round; never resolves when idle
async fn settled(round: &mut Option<InFlightRound>) -> Result<RoundReport, JoinError> {
    match round.as_mut() {
        Some(in_flight) => (&mut in_flight.task).await,
        None => std::future::pending().await,
    }
}

/// Let a round outlive the coordinator, then publish its completion
///
/// Callbacks are never aborted on teardown, so `is_loading` clears once they
/// settle rather than staying stuck.
fn apply_detached(in_flight: InFlightRound, state_tx: watch::Sender<PollingState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = in_flight.task.await {
            warn!(round = in_flight.round, error = %e, "Detached round task did not complete");
        }
        state_tx.send_modify(|state| state.finish_round(Utc::now()));
        debug!(round = in_flight.round, "Detached round settled");
    })
}

/// Whether the run loop keeps going after a request
enum Flow {
    Continue,
    Stop(Option<oneshot::Sender<()>>),
}

/// State owned by the running coordinator task
struct Engine {
    registry: Registry,
    scheduler: Scheduler,
    round: Option<InFlightRound>,
    next_round: u64,
    metrics: PollingMetrics,
    state_tx: watch::Sender<PollingState>,
    events: EventBus,
}

impl Engine {
    fn new(config: &PollingConfig, state_tx: watch::Sender<PollingState>, events: EventBus) -> Self {
        Self {
            registry: Registry::new(),
            scheduler: Scheduler::new(config.interval()),
            round: None,
            next_round: 1,
            metrics: PollingMetrics::default(),
            state_tx,
            events,
        }
    }

    fn handle_request(&mut self, req: PollRequest) -> Flow {
        match req {
            PollRequest::Register { id, token, callback } => {
                let replaced = self.registry.insert(id.clone(), token, callback);
                debug!(%id, replaced, "Registered callback");
                self.metrics.registered_callbacks = self.registry.len();
                self.events.emit(PollEvent::Registered {
                    id: id.clone(),
                    replaced,
                });

                if let Some(entry) = self.registry.get(&id).cloned() {
                    self.metrics.registration_invocations += 1;
                    // Detached: the first fetch runs outside the round guard
                    drop(invoke_registered(entry, self.events.clone()));
                }
            }

            PollRequest::Unregister { id } => {
                if self.registry.remove(&id) {
                    debug!(%id, "Unregistered callback");
                    self.metrics.registered_callbacks = self.registry.len();
                    self.events.emit(PollEvent::Unregistered { id });
                }
            }

            PollRequest::Release { id, token } => {
                if self.registry.remove_owned(&id, token) {
                    debug!(%id, %token, "Released callback");
                    self.metrics.registered_callbacks = self.registry.len();
                    self.events.emit(PollEvent::Unregistered { id });
                }
            }

            PollRequest::Refresh => self.manual_refresh(),

            PollRequest::GetMetrics { reply_tx } => {
                let _ = reply_tx.send(self.metrics.clone());
            }

            PollRequest::Shutdown { reply_tx } => return Flow::Stop(reply_tx),
        }
        Flow::Continue
    }

    /// Start a round unless one is already in flight
    ///
    /// A trigger that lands mid-round is dropped, never queued.
    fn execute_all(&mut self, trigger: Trigger) {
        if let Some(in_flight) = &self.round {
            debug!(%trigger, in_flight = in_flight.round, "Round in flight, dropping trigger");
            self.metrics.dropped_triggers += 1;
            self.events.emit(PollEvent::TriggerDropped {
                trigger,
                in_flight: in_flight.round,
            });
            return;
        }

        let round = self.next_round;
        self.next_round += 1;

        let entries = self.registry.snapshot();
        debug!(round, %trigger, callbacks = entries.len(), "Starting round");

        self.state_tx.send_modify(|state| state.begin_round());
        self.metrics.rounds_started += 1;
        self.events.emit(PollEvent::RoundStarted {
            round,
            trigger,
            callbacks: entries.len(),
        });

        let task = tokio::spawn(execute_round(round, trigger, entries, self.events.clone()));
        self.round = Some(InFlightRound { round, trigger, task });
    }

    fn finish_round(&mut self, result: Result<RoundReport, JoinError>) {
        let Some(in_flight) = self.round.take() else {
            return;
        };

        let report = result.unwrap_or_else(|e| {
            warn!(round = in_flight.round, error = %e, "Round task did not complete");
            RoundReport {
                round: in_flight.round,
                trigger: in_flight.trigger,
                succeeded: 0,
                failed: 0,
                elapsed: Default::default(),
            }
        });

        self.state_tx.send_modify(|state| state.finish_round(Utc::now()));
        self.metrics.rounds_completed += 1;
        self.metrics.callback_failures += report.failed as u64;

        debug!(
            round = report.round,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Round settled"
        );
        self.events.emit(PollEvent::RoundCompleted {
            round: report.round,
            trigger: report.trigger,
            succeeded: report.succeeded,
            failed: report.failed,
            elapsed_ms: report.elapsed.as_millis() as u64,
        });
    }

    fn on_tick(&mut self, visible: bool) {
        if !visible {
            debug!("Tick while hidden, skipping");
            return;
        }
        self.execute_all(Trigger::Tick);
    }

    fn manual_refresh(&mut self) {
        self.execute_all(Trigger::Refresh);
        if self.scheduler.is_active() {
            self.scheduler.start_interval();
        }
    }

    fn on_visibility(&mut self, visibility: Visibility) {
        match self.scheduler.transition(visibility) {
            Transition::StopTimer => {
                info!("Page hidden, polling paused");
                self.events.emit(PollEvent::Paused);
            }
            Transition::RunOnceThenStart => {
                info!("Page visible, polling resumed");
                self.execute_all(Trigger::Resume);
                self.scheduler.start_interval();
                self.events.emit(PollEvent::Resumed);
            }
            Transition::Unchanged => {}
        }
    }

    fn snapshot_metrics(&mut self, visible: bool) {
        self.metrics.timer_active = self.scheduler.timer_active();
        self.metrics.visible = visible;
    }
}

/// The polling coordinator
///
/// Build it, hand out [`PollingHandle`]s, then drive it with [`run`] or
/// [`spawn`]. It stops on [`PollingHandle::shutdown`] or once every handle
/// has been dropped.
///
/// [`run`]: PollingCoordinator::run
/// [`spawn`]: PollingCoordinator::spawn
pub struct PollingCoordinator {
    config: PollingConfig,
    tx: mpsc::UnboundedSender<PollRequest>,
    rx: mpsc::UnboundedReceiver<PollRequest>,
    monitor: VisibilityMonitor,
    state_tx: watch::Sender<PollingState>,
    events: EventBus,
}

impl PollingCoordinator {
    /// Create a coordinator observing the given visibility monitor
    pub fn new(config: PollingConfig, monitor: VisibilityMonitor) -> Self {
        debug!(?config, "PollingCoordinator::new: called");
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(PollingState::new(Utc::now()));
        let events = EventBus::new(config.event_capacity);
        Self {
            config,
            tx,
            rx,
            monitor,
            state_tx,
            events,
        }
    }

    /// Create a handle for panels
    pub fn handle(&self) -> PollingHandle {
        PollingHandle::new(self.tx.clone(), self.state_tx.subscribe(), self.events.clone())
    }

    /// Spawn the coordinator task
    pub fn spawn(self) -> (PollingHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// Run the coordinator until shutdown
    pub async fn run(self) {
        let Self {
            config,
            tx,
            mut rx,
            mut monitor,
            state_tx,
            events,
        } = self;
        // Only handles keep the request channel open
        drop(tx);

        let mut engine = Engine::new(&config, state_tx, events);
        engine.scheduler.mount(monitor.current());
        let mut visibility_open = true;
        let mut shutdown_reply = None;

        info!(
            interval_ms = config.interval_ms,
            visible = monitor.is_visible(),
            "Polling coordinator started"
        );

        loop {
            tokio::select! {
                req = rx.recv() => {
                    let Some(req) = req else {
                        debug!("All handles dropped");
                        break;
                    };
                    if let PollRequest::GetMetrics { .. } = req {
                        engine.snapshot_metrics(monitor.is_visible());
                    }
                    if let Flow::Stop(reply_tx) = engine.handle_request(req) {
                        shutdown_reply = reply_tx;
                        break;
                    }
                }

                _ = engine.scheduler.tick() => {
                    engine.on_tick(monitor.is_visible());
                }

                change = monitor.changed(), if visibility_open => {
                    match change {
                        Some(visibility) => engine.on_visibility(visibility),
                        None => {
                            debug!("Visibility source dropped, keeping last value");
                            visibility_open = false;
                        }
                    }
                }

                result = settled(&mut engine.round) => {
                    engine.finish_round(result);
                }
            }
        }

        engine.scheduler.unmount();
        if let Some(in_flight) = engine.round.take() {
            debug!(round = in_flight.round, "Detaching in-flight round");
            drop(apply_detached(in_flight, engine.state_tx));
        }
        engine.events.emit(PollEvent::Stopped);
        info!("Polling coordinator stopped");

        if let Some(reply_tx) = shutdown_reply {
            let _ = reply_tx.send(());
        }
    }
}
