//! Engine event stream
//!
//! The coordinator emits a [`PollEvent`] for every lifecycle step: rounds
//! starting and settling, dropped triggers, callback failures and
//! pause/resume. Consumers subscribe through
//! [`PollingHandle::subscribe`](crate::polling::PollingHandle::subscribe).
//!
//! ```rust,ignore
//! let mut rx = handle.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use types::{PollEvent, Trigger};
