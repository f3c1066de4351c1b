//! Keyed cache of async request results.
//!
//! One [`RequestCache`] is shared by navigation and every panel. Entries are
//! addressed by a composite [`QueryKey`] (operation tag followed by its
//! parameters, e.g. `["content", "1", "src/app.py"]`) and track
//! loading/success/error state for that key.
//!
//! Two access patterns go through it:
//!
//! - [`query`](RequestCache::query): cached idempotent fetch. A `Success` or
//!   `Pending` entry that has not been invalidated is reused: the producer is
//!   not invoked again, concurrent callers join the request already in flight.
//! - [`mutate`](RequestCache::mutate): explicit command. The producer always
//!   runs.
//!
//! Both bump a per-key generation counter before calling the producer. When a
//! response comes back and a newer request for the same key has been issued
//! in the meantime, the response is discarded and the caller receives
//! [`Outcome::Stale`]. Superseded requests are never aborted; they run to
//! completion and are then ignored.
//!
//! [`invalidate`](RequestCache::invalidate) marks every entry under a key
//! prefix stale so the next `query` re-runs its producer.
//! [`evict`](RequestCache::evict) drops settled entries under a prefix
//! outright; owners call it when a project is left so a long session does
//! not keep every file and analysis it ever loaded.
//!
//! The entry map sits behind a `std::sync::Mutex` that is never held across
//! an `.await`, so every status transition is atomic with respect to the
//! scheduler.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;

use crate::error::ClientError;

/// Composite cache key: an operation tag followed by parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new(operation: &str) -> Self {
        QueryKey(vec![operation.to_string()])
    }

    /// Append a parameter.
    pub fn with(mut self, part: impl ToString) -> Self {
        self.0.push(part.to_string());
        self
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Whether `prefix`'s parts are a leading subsequence of this key's.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Pending,
    Success,
    Error,
}

/// How a request through the cache resolved, from the caller's view.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ready(T),
    Failed(ClientError),
    /// A newer request for the same key superseded this one. Not an error;
    /// the caller must leave visible state alone.
    Stale,
}

impl<T> Outcome<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Outcome::Stale)
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// `None` for a stale outcome.
    pub fn into_result(self) -> Option<Result<T, ClientError>> {
        match self {
            Outcome::Ready(value) => Some(Ok(value)),
            Outcome::Failed(err) => Some(Err(err)),
            Outcome::Stale => None,
        }
    }
}

/// Point-in-time view of one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub status: Status,
    pub generation: u64,
    pub stale: bool,
    pub error: Option<ClientError>,
}

type Payload = Arc<dyn Any + Send + Sync>;

struct Entry {
    status: Status,
    /// Last successful payload; kept while a refetch is pending.
    data: Option<Payload>,
    error: Option<ClientError>,
    generation: u64,
    stale: bool,
    /// Latest generation that settled; wakes callers joined on a pending
    /// request.
    settled: watch::Sender<u64>,
}

impl Entry {
    fn new() -> Self {
        let (settled, _) = watch::channel(0);
        Self {
            status: Status::Idle,
            data: None,
            error: None,
            generation: 0,
            stale: false,
            settled,
        }
    }

    fn value<T: Clone + 'static>(&self) -> Option<T> {
        let payload: &(dyn Any + Send + Sync) = self.data.as_deref()?;
        payload.downcast_ref::<T>().cloned()
    }

    fn outcome<T: Clone + 'static>(&self) -> Outcome<T> {
        match self.status {
            Status::Success => self.value().map(Outcome::Ready).unwrap_or(Outcome::Stale),
            Status::Error => self
                .error
                .clone()
                .map(Outcome::Failed)
                .unwrap_or(Outcome::Stale),
            Status::Idle | Status::Pending => Outcome::Stale,
        }
    }
}

/// Shared arena of request entries. See the module docs.
pub struct RequestCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cached fetch.
    ///
    /// Returns the stored value for a fresh `Success` entry, joins the
    /// request in flight for a fresh `Pending` entry, and otherwise invokes
    /// `producer`.
    pub async fn query<T, F, Fut>(&self, key: &QueryKey, producer: F) -> Outcome<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let joined = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            match (entry.status, entry.stale) {
                (Status::Success, false) => {
                    if let Some(value) = entry.value::<T>() {
                        debug!(key = %key, "cache hit");
                        return Outcome::Ready(value);
                    }
                    None
                }
                (Status::Pending, false) => Some((entry.generation, entry.settled.subscribe())),
                _ => None,
            }
        };

        if let Some((generation, mut settled)) = joined {
            debug!(key = %key, generation, "joining request in flight");
            let _ = settled.wait_for(|done| *done >= generation).await;
            return self.current(key);
        }

        self.run(key, producer).await
    }

    /// Always-fresh command. Invokes `producer` regardless of the entry's
    /// state; the generation guard still applies.
    pub async fn mutate<T, F, Fut>(&self, key: &QueryKey, producer: F) -> Outcome<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        debug!(key = %key, "mutate");
        self.run(key, producer).await
    }

    /// Mark every entry whose key starts with `prefix` as stale. Returns the
    /// number of entries marked.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let mut marked = 0;
        for (_, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            entry.stale = true;
            marked += 1;
        }
        debug!(prefix = %prefix, marked, "invalidated");
        marked
    }

    /// Remove every entry under `prefix` that has no request in flight.
    /// Returns the number of entries removed.
    pub fn evict(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, entry| !key.starts_with(prefix) || entry.status == Status::Pending);
        let removed = before - entries.len();
        debug!(prefix = %prefix, removed, "evicted");
        removed
    }

    /// Last successful value stored under `key`, if any, regardless of
    /// whether it is stale or a refetch is pending.
    pub fn peek<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        self.lock().get(key).and_then(Entry::value)
    }

    pub fn snapshot(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        self.lock().get(key).map(|entry| EntrySnapshot {
            status: entry.status,
            generation: entry.generation,
            stale: entry.stale,
            error: entry.error.clone(),
        })
    }

    fn current<T: Clone + 'static>(&self, key: &QueryKey) -> Outcome<T> {
        self.lock()
            .get(key)
            .map(Entry::outcome)
            .unwrap_or(Outcome::Stale)
    }

    async fn run<T, F, Fut>(&self, key: &QueryKey, producer: F) -> Outcome<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let generation = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.generation += 1;
            entry.status = Status::Pending;
            entry.stale = false;
            entry.error = None;
            entry.generation
        };

        let mut in_flight = InFlight {
            cache: self,
            key,
            generation,
            settled: false,
        };
        let result = producer().await;
        in_flight.settled = true;

        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return Outcome::Stale;
        };
        if entry.generation != generation {
            debug!(
                key = %key,
                generation,
                latest = entry.generation,
                "discarding superseded response"
            );
            return Outcome::Stale;
        }

        let outcome = match result {
            Ok(value) => {
                entry.status = Status::Success;
                entry.data = Some(Arc::new(value.clone()));
                Outcome::Ready(value)
            }
            Err(err) => {
                entry.status = Status::Error;
                entry.error = Some(err.clone());
                Outcome::Failed(err)
            }
        };
        entry.settled.send_replace(generation);
        outcome
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Resets an entry whose request future was dropped before the producer
/// finished, so joined callers are released and the next query re-runs.
struct InFlight<'a> {
    cache: &'a RequestCache,
    key: &'a QueryKey,
    generation: u64,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut entries = self.cache.lock();
        if let Some(entry) = entries.get_mut(self.key) {
            if entry.generation == self.generation && entry.status == Status::Pending {
                entry.status = Status::Idle;
                entry.settled.send_replace(self.generation);
            }
        }
    }
}
