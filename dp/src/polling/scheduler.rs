//! Shared refresh timer
//!
//! One repeating timer for every panel. Visibility drives an explicit
//! two-state process:
//!
//! ```text
//!            hidden / StopTimer
//!   ACTIVE ---------------------> PAUSED
//!      ^                            |
//!      +----------------------------+
//!        visible / RunOnceThenStart
//! ```

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

use super::visibility::Visibility;

/// Scheduler mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    Active,
    Paused,
}

/// Action the owner must carry out after a visibility transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Timer already cleared; nothing else to do
    StopTimer,
    /// Run one round now, then start the timer
    RunOnceThenStart,
    /// Input did not change the mode
    Unchanged,
}

/// Owns the single repeating timer
#[derive(Debug)]
pub struct Scheduler {
    period: Duration,
    mode: SchedulerMode,
    timer: Option<Interval>,
}

impl Scheduler {
    /// Create a paused scheduler with no timer
    pub fn new(period: Duration) -> Self {
        debug!(?period, "Scheduler::new: called");
        Self {
            period,
            mode: SchedulerMode::Paused,
            timer: None,
        }
    }

    /// Enter the initial mode for the given visibility
    pub fn mount(&mut self, visibility: Visibility) {
        debug!(?visibility, "Scheduler::mount: called");
        if visibility.is_visible() {
            self.mode = SchedulerMode::Active;
            self.start_interval();
        } else {
            self.mode = SchedulerMode::Paused;
            self.stop_interval();
        }
    }

    /// Clear the timer on teardown
    pub fn unmount(&mut self) {
        debug!("Scheduler::unmount: called");
        self.mode = SchedulerMode::Paused;
        self.stop_interval();
    }

    /// Replace any running timer with a fresh one
    ///
    /// The first tick lands one full period from now.
    pub fn start_interval(&mut self) {
        debug!(period = ?self.period, "Scheduler::start_interval: called");
        let mut timer = tokio::time::interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
    }

    pub fn stop_interval(&mut self) {
        debug!(had_timer = self.timer.is_some(), "Scheduler::stop_interval: called");
        self.timer = None;
    }

    /// Apply a visibility transition
    ///
    /// Going hidden clears the timer here. Going visible leaves the timer
    /// stopped; the owner runs a round and then calls [`start_interval`].
    ///
    /// [`start_interval`]: Scheduler::start_interval
    pub fn transition(&mut self, visibility: Visibility) -> Transition {
        debug!(mode = ?self.mode, ?visibility, "Scheduler::transition: called");
        match (self.mode, visibility) {
            (SchedulerMode::Active, Visibility::Hidden) => {
                self.mode = SchedulerMode::Paused;
                self.stop_interval();
                Transition::StopTimer
            }
            (SchedulerMode::Paused, Visibility::Visible) => {
                self.mode = SchedulerMode::Active;
                Transition::RunOnceThenStart
            }
            _ => Transition::Unchanged,
        }
    }

    /// Wait for the next tick; never resolves while the timer is stopped
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.mode == SchedulerMode::Active
    }

    pub fn timer_active(&self) -> bool {
        self.timer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_secs(10);

    #[test]
    fn test_new_is_paused_without_timer() {
        let scheduler = Scheduler::new(PERIOD);
        assert_eq!(scheduler.mode(), SchedulerMode::Paused);
        assert!(!scheduler.timer_active());
    }

    #[tokio::test]
    async fn test_mount_visible_starts_timer() {
        let mut scheduler = Scheduler::new(PERIOD);
        scheduler.mount(Visibility::Visible);
        assert!(scheduler.is_active());
        assert!(scheduler.timer_active());
    }

    #[tokio::test]
    async fn test_mount_hidden_stays_paused() {
        let mut scheduler = Scheduler::new(PERIOD);
        scheduler.mount(Visibility::Hidden);
        assert_eq!(scheduler.mode(), SchedulerMode::Paused);
        assert!(!scheduler.timer_active());
    }

    #[tokio::test]
    async fn test_transitions() {
        let mut scheduler = Scheduler::new(PERIOD);
        scheduler.mount(Visibility::Visible);

        assert_eq!(scheduler.transition(Visibility::Visible), Transition::Unchanged);
        assert_eq!(scheduler.transition(Visibility::Hidden), Transition::StopTimer);
        assert!(!scheduler.timer_active());

        assert_eq!(scheduler.transition(Visibility::Hidden), Transition::Unchanged);
        assert_eq!(scheduler.transition(Visibility::Visible), Transition::RunOnceThenStart);
        assert!(scheduler.is_active());
        // Owner starts the timer after the resume round
        assert!(!scheduler.timer_active());
    }

    #[tokio::test]
    async fn test_unmount_clears_timer() {
        let mut scheduler = Scheduler::new(PERIOD);
        scheduler.mount(Visibility::Visible);
        scheduler.unmount();
        assert!(!scheduler.timer_active());
        assert_eq!(scheduler.mode(), SchedulerMode::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_one_full_period_away() {
        let mut scheduler = Scheduler::new(PERIOD);
        let start = Instant::now();
        scheduler.start_interval();

        scheduler.tick().await;
        assert_eq!(start.elapsed(), PERIOD);

        scheduler.tick().await;
        assert_eq!(start.elapsed(), PERIOD * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_pushes_next_tick_out() {
        let mut scheduler = Scheduler::new(PERIOD);
        let start = Instant::now();
        scheduler.start_interval();

        tokio::time::sleep(Duration::from_secs(4)).await;
        scheduler.start_interval();

        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_pending_without_timer() {
        let mut scheduler = Scheduler::new(PERIOD);
        let result = tokio::time::timeout(PERIOD * 5, scheduler.tick()).await;
        assert!(result.is_err());
    }
}
