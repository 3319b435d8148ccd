//! Event type definitions for the polling engine

use serde::{Deserialize, Serialize};

/// What caused a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    /// Scheduled timer tick
    Tick,
    /// Manual refresh
    Refresh,
    /// Page became visible again
    Resume,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trigger::Tick => "tick",
            Trigger::Refresh => "refresh",
            Trigger::Resume => "resume",
        };
        write!(f, "{s}")
    }
}

/// Events emitted by the polling coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PollEvent {
    /// A callback was added or replaced
    Registered { id: String, replaced: bool },

    /// A callback was removed
    Unregistered { id: String },

    /// A round started
    RoundStarted {
        round: u64,
        trigger: Trigger,
        callbacks: usize,
    },

    /// Every callback of a round has settled
    RoundCompleted {
        round: u64,
        trigger: Trigger,
        succeeded: usize,
        failed: usize,
        #[serde(rename = "elapsed-ms")]
        elapsed_ms: u64,
    },

    /// A trigger arrived while a round was in flight and was discarded
    TriggerDropped {
        trigger: Trigger,
        #[serde(rename = "in-flight")]
        in_flight: u64,
    },

    /// A callback returned an error or panicked
    ///
    /// `round` is `None` for the invocation that follows registration.
    CallbackFailed {
        id: String,
        round: Option<u64>,
        error: String,
    },

    /// Page went hidden; timer stopped
    Paused,

    /// Page became visible; timer restarted
    Resumed,

    /// Coordinator shut down
    Stopped,
}

impl PollEvent {
    /// Short event name, for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            PollEvent::Registered { .. } => "registered",
            PollEvent::Unregistered { .. } => "unregistered",
            PollEvent::RoundStarted { .. } => "round-started",
            PollEvent::RoundCompleted { .. } => "round-completed",
            PollEvent::TriggerDropped { .. } => "trigger-dropped",
            PollEvent::CallbackFailed { .. } => "callback-failed",
            PollEvent::Paused => "paused",
            PollEvent::Resumed => "resumed",
            PollEvent::Stopped => "stopped",
        }
    }

    /// Round number, if the event belongs to one
    pub fn round(&self) -> Option<u64> {
        match self {
            PollEvent::RoundStarted { round, .. } | PollEvent::RoundCompleted { round, .. } => Some(*round),
            PollEvent::CallbackFailed { round, .. } => *round,
            _ => None,
        }
    }
}
