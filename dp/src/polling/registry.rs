//! Callback registry
//!
//! Maps callback ids to the refresh callbacks panels supply. The registry is
//! owned by the coordinator task; rounds iterate an owned snapshot so the
//! registry can keep changing while a round is in flight.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;
use uuid::Uuid;

/// A zero-argument refresh callback
///
/// The returned future resolves once the callback's own fetch has finished.
/// An `Err` is the callback's business: the coordinator logs it and moves on.
pub type PollCallback = Arc<dyn Fn() -> BoxFuture<'static, eyre::Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`PollCallback`]
pub fn poll_fn<F, Fut>(f: F) -> PollCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = eyre::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// A registered callback
#[derive(Clone)]
pub struct CallbackEntry {
    pub id: String,
    /// Identifies this particular registration of `id`
    pub token: Uuid,
    pub callback: PollCallback,
}

impl fmt::Debug for CallbackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackEntry")
            .field("id", &self.id)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Mapping of callback id to callback
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, CallbackEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `id`
    ///
    /// Returns true when an existing entry was replaced.
    pub fn insert(&mut self, id: impl Into<String>, token: Uuid, callback: PollCallback) -> bool {
        let id = id.into();
        debug!(%id, %token, "Registry::insert: called");
        let entry = CallbackEntry {
            id: id.clone(),
            token,
            callback,
        };
        self.entries.insert(id, entry).is_some()
    }

    /// Remove the entry for `id`; no-op if absent
    pub fn remove(&mut self, id: &str) -> bool {
        debug!(%id, "Registry::remove: called");
        self.entries.remove(id).is_some()
    }

    /// Remove the entry for `id` only if it still belongs to `token`
    ///
    /// A later registration under the same id keeps its entry.
    pub fn remove_owned(&mut self, id: &str, token: Uuid) -> bool {
        debug!(%id, %token, "Registry::remove_owned: called");
        match self.entries.get(id) {
            Some(entry) if entry.token == token => self.entries.remove(id).is_some(),
            _ => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&CallbackEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy of every entry, in unspecified order
    pub fn snapshot(&self) -> Vec<CallbackEntry> {
        self.entries.values().cloned().collect()
    }
}
