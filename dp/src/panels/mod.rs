//! Dashboard panels
//!
//! Panels are consumers of the polling engine: each one owns its fetch and
//! its own success/error state, and hands the coordinator an opaque refresh
//! callback.

mod http;

pub use http::{HttpPanel, PanelConfig, PanelError, PanelStatus};
