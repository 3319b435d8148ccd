//! PollingHandle - panel-facing interface to the coordinator

use std::future::Future;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use super::messages::{PollRequest, PollingError, PollingMetrics, PollingState};
use super::registry::{PollCallback, poll_fn};
use crate::events::{EventBus, PollEvent};

/// Handle for panels to interact with the polling coordinator
///
/// Cloneable. `register`, `unregister` and `refresh` are fire-and-forget:
/// they never fail and never block. Against a stopped coordinator they log a
/// warning and do nothing.
#[derive(Debug, Clone)]
pub struct PollingHandle {
    tx: mpsc::UnboundedSender<PollRequest>,
    state: watch::Receiver<PollingState>,
    events: EventBus,
}

impl PollingHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<PollRequest>,
        state: watch::Receiver<PollingState>,
        events: EventBus,
    ) -> Self {
        debug!("PollingHandle::new: called");
        Self { tx, state, events }
    }

    fn send(&self, req: PollRequest) {
        if let Err(e) = self.tx.send(req) {
            warn!(request = ?e.0, "Polling coordinator is not running, request ignored");
        }
    }

    /// Register a callback under `id`, replacing any previous one
    ///
    /// The callback is invoked once right away, independent of the timer.
    pub fn register(&self, id: impl Into<String>, callback: PollCallback) {
        self.register_with_token(id.into(), Uuid::now_v7(), callback);
    }

    /// Register an async closure under `id`
    pub fn register_fn<F, Fut>(&self, id: impl Into<String>, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        self.register(id, poll_fn(f));
    }

    fn register_with_token(&self, id: String, token: Uuid, callback: PollCallback) {
        debug!(%id, %token, "PollingHandle::register: called");
        self.send(PollRequest::Register { id, token, callback });
    }

    /// Remove the callback registered under `id`; no-op if absent
    pub fn unregister(&self, id: &str) {
        debug!(%id, "PollingHandle::unregister: called");
        self.send(PollRequest::Unregister { id: id.to_string() });
    }

    /// Register a callback for as long as the returned guard lives
    ///
    /// Dropping the guard unregisters `id`, unless something registered
    /// under the same id since.
    pub fn attach(&self, id: impl Into<String>, callback: PollCallback) -> Registration {
        let id = id.into();
        let token = Uuid::now_v7();
        debug!(%id, %token, "PollingHandle::attach: called");
        self.register_with_token(id.clone(), token, callback);
        Registration {
            tx: self.tx.clone(),
            id,
            token,
        }
    }

    /// Run a round now and push the next scheduled tick a full interval out
    ///
    /// Dropped if a round is already in flight.
    pub fn refresh(&self) {
        debug!("PollingHandle::refresh: called");
        self.send(PollRequest::Refresh);
    }

    /// Completion time of the latest round
    pub fn last_update(&self) -> DateTime<Utc> {
        self.state.borrow().last_update
    }

    /// True only while a round is in flight
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    /// Snapshot of the aggregated state
    pub fn state(&self) -> PollingState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes whenever the aggregated state changes
    pub fn watch_state(&self) -> watch::Receiver<PollingState> {
        self.state.clone()
    }

    /// Subscribe to coordinator events
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.events.subscribe()
    }

    /// Get current coordinator metrics
    pub async fn metrics(&self) -> Result<PollingMetrics, PollingError> {
        debug!("PollingHandle::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PollRequest::GetMetrics { reply_tx })
            .map_err(|_| PollingError::CoordinatorClosed)?;
        reply_rx.await.map_err(|_| PollingError::ReplyDropped)
    }

    /// Stop the coordinator and wait until its timer is cleared
    pub async fn shutdown(&self) -> Result<(), PollingError> {
        debug!("PollingHandle::shutdown: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PollRequest::Shutdown {
                reply_tx: Some(reply_tx),
            })
            .map_err(|_| PollingError::CoordinatorClosed)?;
        reply_rx.await.map_err(|_| PollingError::ReplyDropped)
    }

    /// True once the coordinator task has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Keeps a callback registered; unregisters it on drop
#[derive(Debug)]
#[must_use = "dropping a Registration unregisters its callback"]
pub struct Registration {
    tx: mpsc::UnboundedSender<PollRequest>,
    id: String,
    token: Uuid,
}

impl Registration {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        debug!(id = %self.id, token = %self.token, "Registration::drop: releasing");
        // Coordinator may already be gone; nothing left to release then
        let _ = self.tx.send(PollRequest::Release {
            id: std::mem::take(&mut self.id),
            token: self.token,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_handle() -> (PollingHandle, mpsc::UnboundedReceiver<PollRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (_state_tx, state_rx) = watch::channel(PollingState::new(Utc::now()));
        (PollingHandle::new(tx, state_rx, EventBus::new(8)), rx)
    }

    #[tokio::test]
    async fn test_requests_are_forwarded() {
        let (handle, mut rx) = detached_handle();

        handle.register_fn("cpu", || async { Ok(()) });
        handle.unregister("cpu");
        handle.refresh();

        assert!(matches!(rx.recv().await, Some(PollRequest::Register { id, .. }) if id == "cpu"));
        assert!(matches!(rx.recv().await, Some(PollRequest::Unregister { id }) if id == "cpu"));
        assert!(matches!(rx.recv().await, Some(PollRequest::Refresh)));
    }

    #[tokio::test]
    async fn test_fire_and_forget_on_closed_coordinator() {
        let (handle, rx) = detached_handle();
        drop(rx);

        assert!(handle.is_closed());
        // None of these may panic or fail
        handle.register_fn("cpu", || async { Ok(()) });
        handle.unregister("cpu");
        handle.refresh();

        assert_eq!(handle.metrics().await, Err(PollingError::CoordinatorClosed));
        assert_eq!(handle.shutdown().await, Err(PollingError::CoordinatorClosed));
    }

    #[tokio::test]
    async fn test_registration_releases_with_matching_token() {
        let (handle, mut rx) = detached_handle();

        let registration = handle.attach("cpu", poll_fn(|| async { Ok(()) }));
        assert_eq!(registration.id(), "cpu");

        let Some(PollRequest::Register { token: registered, .. }) = rx.recv().await else {
            panic!("Expected Register");
        };

        drop(registration);

        match rx.recv().await {
            Some(PollRequest::Release { id, token }) => {
                assert_eq!(id, "cpu");
                assert_eq!(token, registered);
            }
            other => panic!("Expected Release, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_state_accessors() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let start = Utc::now();
        let (state_tx, state_rx) = watch::channel(PollingState::new(start));
        let handle = PollingHandle::new(tx, state_rx, EventBus::new(8));

        assert!(!handle.is_loading());
        assert_eq!(handle.last_update(), start);

        state_tx.send_modify(|s| s.begin_round());
        assert!(handle.is_loading());
        assert!(handle.state().is_loading);
    }
}
