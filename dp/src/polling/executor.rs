//! Round execution
//!
//! A round fans out to a snapshot of callbacks and waits for every one of
//! them to settle. Each callback runs in its own task, so an error or a panic
//! in one never cancels or delays its siblings. Failures stop here: they are
//! logged, emitted as events and counted, never returned.

use std::time::Duration;

use futures::future::join_all;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::registry::CallbackEntry;
use crate::events::{EventBus, PollEvent, Trigger};

/// Outcome of one settled round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u64,
    pub trigger: Trigger,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl RoundReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Invoke every entry concurrently and wait for all of them to settle
pub async fn execute_round(round: u64, trigger: Trigger, entries: Vec<CallbackEntry>, events: EventBus) -> RoundReport {
    debug!(round, %trigger, callbacks = entries.len(), "execute_round: called");
    let started = Instant::now();

    let (ids, tasks): (Vec<String>, Vec<JoinHandle<eyre::Result<()>>>) = entries
        .into_iter()
        .map(|entry| {
            let callback = entry.callback;
            (entry.id, tokio::spawn(async move { callback().await }))
        })
        .unzip();

    let results = join_all(tasks).await;

    let mut succeeded = 0;
    let mut failed = 0;
    for (id, result) in ids.into_iter().zip(results) {
        match settle(result) {
            Ok(()) => succeeded += 1,
            Err(error) => {
                failed += 1;
                warn!(%id, round, %error, "Callback failed");
                events.emit(PollEvent::CallbackFailed {
                    id,
                    round: Some(round),
                    error,
                });
            }
        }
    }

    let report = RoundReport {
        round,
        trigger,
        succeeded,
        failed,
        elapsed: started.elapsed(),
    };
    debug!(?report, "execute_round: settled");
    report
}

/// Invoke a freshly registered callback once, outside any round
///
/// Does not take the round guard. The returned handle resolves after the
/// callback settles; dropping it detaches the invocation.
pub fn invoke_registered(entry: CallbackEntry, events: EventBus) -> JoinHandle<()> {
    debug!(id = %entry.id, "invoke_registered: called");
    let CallbackEntry { id, callback, .. } = entry;
    let task = tokio::spawn(async move { callback().await });

    tokio::spawn(async move {
        if let Err(error) = settle(task.await) {
            warn!(%id, %error, "Initial callback invocation failed");
            events.emit(PollEvent::CallbackFailed { id, round: None, error });
        }
    })
}

fn settle(result: Result<eyre::Result<()>, JoinError>) -> Result<(), String> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(e) if e.is_panic() => Err("callback panicked".to_string()),
        Err(e) => Err(e.to_string()),
    }
}
