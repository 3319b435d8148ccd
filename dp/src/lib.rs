//! dashpoll - shared refresh coordinator for dashboard panels
//!
//! Dashboard panels each need near-real-time data, but none of them should
//! own a timer. dashpoll runs one coordinator task that owns a single shared
//! timer and refreshes every registered panel on it.
//!
//! # Core Concepts
//!
//! - **One timer**: every panel refreshes on the same tick
//! - **Rounds never overlap**: a trigger that lands mid-round is dropped
//! - **Settle-all**: one failing panel never blocks or fails the others
//! - **Visibility-aware**: hidden pauses the timer, visible refreshes at once
//!
//! # Modules
//!
//! - [`polling`] - Registry, scheduler, round execution and the public handle
//! - [`events`] - Broadcast stream of coordinator events
//! - [`panels`] - HTTP-backed panels used by the CLI
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod events;
pub mod panels;
pub mod polling;

// Re-export commonly used types
pub use config::Config;
pub use events::{EventBus, PollEvent, Trigger};
pub use panels::{HttpPanel, PanelConfig, PanelStatus};
pub use polling::{
    PollCallback, PollingConfig, PollingCoordinator, PollingError, PollingHandle, PollingMetrics, PollingState,
    Registration, Visibility, VisibilityMonitor, VisibilitySource, poll_fn, visibility_channel,
};
