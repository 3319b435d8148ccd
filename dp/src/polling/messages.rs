//! Message and state types for the polling coordinator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::registry::PollCallback;

/// Errors from request/reply operations on a [`PollingHandle`]
///
/// [`PollingHandle`]: super::PollingHandle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollingError {
    #[error("Polling coordinator is not running")]
    CoordinatorClosed,

    #[error("Polling coordinator shut down before replying")]
    ReplyDropped,
}

/// Aggregated state published to panels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingState {
    /// True only while a round is in flight
    #[serde(rename = "is-loading")]
    pub is_loading: bool,

    /// Completion time of the latest round; never moves backwards
    #[serde(rename = "last-update")]
    pub last_update: DateTime<Utc>,

    /// Number of rounds that have settled
    #[serde(rename = "rounds-completed")]
    pub rounds_completed: u64,
}

impl PollingState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            is_loading: false,
            last_update: now,
            rounds_completed: 0,
        }
    }

    pub(crate) fn begin_round(&mut self) {
        self.is_loading = true;
    }

    pub(crate) fn finish_round(&mut self, now: DateTime<Utc>) {
        self.is_loading = false;
        self.last_update = self.last_update.max(now);
        self.rounds_completed += 1;
    }
}

/// Coordinator counters for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingMetrics {
    pub registered_callbacks: usize,
    pub rounds_started: u64,
    pub rounds_completed: u64,
    pub dropped_triggers: u64,
    pub callback_failures: u64,
    pub registration_invocations: u64,
    pub timer_active: bool,
    pub visible: bool,
}

/// Internal requests to the coordinator task
pub enum PollRequest {
    /// Insert or overwrite a callback, then invoke it once
    Register {
        id: String,
        token: Uuid,
        callback: PollCallback,
    },

    /// Remove a callback
    Unregister { id: String },

    /// Remove a callback if it still belongs to `token`
    Release { id: String, token: Uuid },

    /// Run a round now and restart the timer
    Refresh,

    /// Get current metrics
    GetMetrics {
        reply_tx: oneshot::Sender<PollingMetrics>,
    },

    /// Shut the coordinator down
    Shutdown { reply_tx: Option<oneshot::Sender<()>> },
}

impl std::fmt::Debug for PollRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollRequest::Register { id, token, .. } => f
                .debug_struct("Register")
                .field("id", id)
                .field("token", token)
                .finish_non_exhaustive(),
            PollRequest::Unregister { id } => f.debug_struct("Unregister").field("id", id).finish(),
            PollRequest::Release { id, token } => {
                f.debug_struct("Release").field("id", id).field("token", token).finish()
            }
            PollRequest::Refresh => f.write_str("Refresh"),
            PollRequest::GetMetrics { .. } => f.write_str("GetMetrics"),
            PollRequest::Shutdown { .. } => f.write_str("Shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_finish_round_advances() {
        let start = Utc::now();
        let mut state = PollingState::new(start);

        state.begin_round();
        assert!(state.is_loading);

        state.finish_round(start + Duration::seconds(5));
        assert!(!state.is_loading);
        assert_eq!(state.last_update, start + Duration::seconds(5));
        assert_eq!(state.rounds_completed, 1);
    }

    #[test]
    fn test_last_update_never_moves_backwards() {
        let start = Utc::now();
        let mut state = PollingState::new(start);

        state.begin_round();
        state.finish_round(start - Duration::seconds(30));

        assert_eq!(state.last_update, start);
        assert_eq!(state.rounds_completed, 1);
    }

    #[test]
    fn test_state_serialization() {
        let state = PollingState::new(Utc::now());
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("is-loading"));
        assert!(json.contains("last-update"));
    }

    #[test]
    fn test_request_debug_hides_callback() {
        let req = PollRequest::Unregister { id: "cpu".to_string() };
        assert_eq!(format!("{req:?}"), "Unregister { id: \"cpu\" }");
        assert_eq!(format!("{:?}", PollRequest::Refresh), "Refresh");
    }
}
