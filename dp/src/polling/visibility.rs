//! Page visibility signal
//!
//! The host drives a [`VisibilitySource`]; the coordinator holds the matching
//! [`VisibilityMonitor`]. Reading the current value never awaits, and
//! [`VisibilityMonitor::changed`] only resolves on real transitions.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Foreground/background state of the host page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}

/// Host side of the visibility signal
#[derive(Debug)]
pub struct VisibilitySource {
    tx: watch::Sender<Visibility>,
}

impl VisibilitySource {
    /// Create a source that starts out visible
    pub fn new() -> Self {
        Self::with_initial(Visibility::Visible)
    }

    pub fn with_initial(initial: Visibility) -> Self {
        debug!(?initial, "VisibilitySource::with_initial: called");
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a visibility value
    ///
    /// Returns true if this was a transition. Repeating the current value
    /// does not wake any monitor.
    pub fn set(&self, visibility: Visibility) -> bool {
        debug!(?visibility, "VisibilitySource::set: called");
        self.tx.send_if_modified(|current| {
            if *current == visibility {
                false
            } else {
                *current = visibility;
                true
            }
        })
    }

    pub fn show(&self) -> bool {
        self.set(Visibility::Visible)
    }

    pub fn hide(&self) -> bool {
        self.set(Visibility::Hidden)
    }

    pub fn current(&self) -> Visibility {
        *self.tx.borrow()
    }

    /// Create a monitor observing this source
    pub fn monitor(&self) -> VisibilityMonitor {
        VisibilityMonitor::new(self.tx.subscribe())
    }
}

impl Default for VisibilitySource {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a visible source together with a monitor on it
pub fn visibility_channel() -> (VisibilitySource, VisibilityMonitor) {
    let source = VisibilitySource::new();
    let monitor = source.monitor();
    (source, monitor)
}

/// Coordinator side of the visibility signal
#[derive(Debug, Clone)]
pub struct VisibilityMonitor {
    rx: watch::Receiver<Visibility>,
    last: Visibility,
}

impl VisibilityMonitor {
    fn new(rx: watch::Receiver<Visibility>) -> Self {
        let last = *rx.borrow();
        Self { rx, last }
    }

    /// A monitor for hosts without a visibility signal; always visible
    pub fn always_visible() -> Self {
        let (_, rx) = watch::channel(Visibility::Visible);
        Self::new(rx)
    }

    pub fn current(&self) -> Visibility {
        *self.rx.borrow()
    }

    pub fn is_visible(&self) -> bool {
        self.current().is_visible()
    }

    /// Wait for the next transition
    ///
    /// Returns `None` once the source has been dropped; the monitor keeps
    /// reporting the last value it saw.
    pub async fn changed(&mut self) -> Option<Visibility> {
        loop {
            self.rx.changed().await.ok()?;
            let visibility = *self.rx.borrow_and_update();
            if visibility != self.last {
                debug!(from = ?self.last, to = ?visibility, "VisibilityMonitor::changed: transition");
                self.last = visibility;
                return Some(visibility);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_is_visible() {
        let (source, monitor) = visibility_channel();
        assert_eq!(source.current(), Visibility::Visible);
        assert!(monitor.is_visible());
        assert_eq!(Visibility::default(), Visibility::Visible);
    }

    #[test]
    fn test_set_reports_transitions_only() {
        let source = VisibilitySource::new();
        assert!(!source.show());
        assert!(source.hide());
        assert!(!source.hide());
        assert!(source.show());
    }

    #[tokio::test]
    async fn test_changed_yields_transition() {
        let (source, mut monitor) = visibility_channel();
        source.hide();
        assert_eq!(monitor.changed().await, Some(Visibility::Hidden));
        assert!(!monitor.is_visible());

        source.show();
        assert_eq!(monitor.changed().await, Some(Visibility::Visible));
    }

    #[tokio::test]
    async fn test_changed_skips_flapping_back_to_same_value() {
        let (source, mut monitor) = visibility_channel();
        source.hide();
        source.show();

        // Net state equals the last observed value, so no transition yet
        let pending = tokio::time::timeout(Duration::from_millis(20), monitor.changed()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_changed_returns_none_when_source_dropped() {
        let (source, mut monitor) = visibility_channel();
        source.hide();
        drop(source);

        assert_eq!(monitor.changed().await, Some(Visibility::Hidden));
        assert_eq!(monitor.changed().await, None);
        assert!(!monitor.is_visible());
    }

    #[tokio::test]
    async fn test_always_visible() {
        let mut monitor = VisibilityMonitor::always_visible();
        assert!(monitor.is_visible());
        assert_eq!(monitor.changed().await, None);
    }
}
