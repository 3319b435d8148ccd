//! Shared refresh coordination
//!
//! Panels register a refresh callback; one coordinator task runs every
//! registered callback on a single shared timer:
//! - **Register:** insert/overwrite a callback, which fires once right away
//! - **Round:** fan out to a snapshot of all callbacks, settle-all, never overlapping
//! - **Visibility:** pause the timer while hidden, run once and restart on resume
//! - **Refresh:** run a round now and restart the timer

mod config;
mod coordinator;
mod executor;
mod handle;
mod messages;
mod registry;
mod scheduler;
mod visibility;

pub use config::PollingConfig;
pub use coordinator::PollingCoordinator;
pub use executor::{RoundReport, execute_round};
pub use handle::{PollingHandle, Registration};
pub use messages::{PollRequest, PollingError, PollingMetrics, PollingState};
pub use registry::{CallbackEntry, PollCallback, Registry, poll_fn};
pub use scheduler::{Scheduler, SchedulerMode, Transition};
pub use visibility::{Visibility, VisibilityMonitor, VisibilitySource, visibility_channel};
