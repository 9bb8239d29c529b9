//! The query cache engine.
//!
//! [`QueryCache`] is the single source of truth mapping [`QueryKey`] to the
//! most recent fetch result for the lifetime of a client session. It is an
//! explicitly owned object (cheap to clone, clones share state) rather than
//! a global singleton, so each session or test constructs its own.
//!
//! Guarantees:
//! - at most one entry per key;
//! - concurrent reads of the same key share one in-flight fetch;
//! - per-key last-write-wins by fetch *issue* order: a late result from a
//!   superseded fetch is discarded;
//! - a failed fetch keeps the last-known-good value and records the error.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::entry::{QueryEntry, QueryStatus};
use super::key::QueryKey;
use crate::error::{Error, Result};

/// One cache slot, owned exclusively by the cache.
struct Slot {
  value: Option<Value>,
  updated_at: Option<Instant>,
  status: QueryStatus,
  error: Option<String>,
  /// Set by `invalidate`, cleared when a fetch is issued
  invalidated: bool,
  /// Issue-order counter of the most recently issued fetch
  generation: u64,
  /// Completion signal of the in-flight fetch, shared by waiting readers
  inflight: Option<watch::Receiver<()>>,
  subscribers: Vec<mpsc::UnboundedSender<()>>,
}

impl Default for Slot {
  fn default() -> Self {
    Self {
      value: None,
      updated_at: None,
      status: QueryStatus::Idle,
      error: None,
      invalidated: false,
      generation: 0,
      inflight: None,
      subscribers: Vec::new(),
    }
  }
}

impl Slot {
  fn snapshot(&self) -> QueryEntry {
    QueryEntry {
      value: self.value.clone(),
      updated_at: self.updated_at,
      status: self.status,
      error: self.error.clone(),
      stale: self.invalidated,
    }
  }

  fn is_fresh(&self, stale_after: Duration) -> bool {
    self.value.is_some()
      && !self.invalidated
      && self.error.is_none()
      && self
        .updated_at
        .map(|t| t.elapsed() < stale_after)
        .unwrap_or(false)
  }

  /// Notify subscribers, dropping any whose receiver has gone away.
  fn notify(&mut self) {
    self.subscribers.retain(|tx| tx.send(()).is_ok());
  }
}

/// Handle returned by [`QueryCache::subscribe`].
///
/// Yields a unit signal every time the subscribed key changes (value
/// applied, error recorded, invalidated). Dropping it unsubscribes.
pub struct Subscription {
  rx: mpsc::UnboundedReceiver<()>,
}

impl Subscription {
  /// Wait for the next change. Returns `false` once the cache entry was
  /// torn down and no further changes can arrive.
  pub async fn changed(&mut self) -> bool {
    self.rx.recv().await.is_some()
  }

  /// Non-blocking check for a pending change signal.
  pub fn try_changed(&mut self) -> bool {
    self.rx.try_recv().is_ok()
  }
}

/// Saved entry state used to roll back optimistic mutations.
pub struct CacheSnapshot {
  entries: Vec<(QueryKey, SavedEntry)>,
}

struct SavedEntry {
  value: Option<Value>,
  updated_at: Option<Instant>,
  status: QueryStatus,
  error: Option<String>,
  invalidated: bool,
}

/// Outcome of the locked decision phase of `ensure_fresh`.
enum ReadPlan {
  /// Entry is fresh, return it as-is
  Fresh(QueryEntry),
  /// A suitable fetch is already in flight; share it
  Share {
    stale: Option<QueryEntry>,
    rx: watch::Receiver<()>,
  },
  /// Issue a new fetch under the given generation
  Issue {
    generation: u64,
    stale: Option<QueryEntry>,
    rx: watch::Receiver<()>,
    tx: watch::Sender<()>,
  },
}

#[derive(Clone)]
pub struct QueryCache {
  slots: Arc<Mutex<HashMap<QueryKey, Slot>>>,
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new()
  }
}

impl QueryCache {
  pub fn new() -> Self {
    Self {
      slots: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  // Slots stay structurally valid across a panicking holder, so a poisoned
  // lock is recovered instead of propagated.
  fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Snapshot of the current entry, without fetching.
  pub fn get(&self, key: &QueryKey) -> Option<QueryEntry> {
    self.lock().get(key).map(Slot::snapshot)
  }

  /// Number of entries currently held.
  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  /// Return the cached entry for `key`, refreshing it when needed.
  ///
  /// - Fresh value (younger than `stale_after`, not invalidated, not in
  ///   error): returned as-is, no request.
  /// - Stale or errored value: returned immediately while a background
  ///   refetch replaces it (read-while-stale).
  /// - No value yet: waits for the fetch and returns the completed entry.
  ///
  /// Concurrent calls for the same key share a single in-flight request,
  /// unless the entry was invalidated after that request was issued — then
  /// a new fetch supersedes it and the old result is discarded on arrival.
  ///
  /// A failed fetch is reported through the entry (`status == Error`), not
  /// as a return-path error; the previous value is retained.
  pub async fn ensure_fresh<T, F, Fut>(
    &self,
    key: &QueryKey,
    stale_after: Duration,
    fetch: F,
  ) -> QueryEntry
  where
    T: Serialize + Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let plan = {
      let mut slots = self.lock();
      let slot = slots.entry(key.clone()).or_default();

      if slot.is_fresh(stale_after) {
        ReadPlan::Fresh(slot.snapshot())
      } else if let (Some(rx), false) = (slot.inflight.clone(), slot.invalidated) {
        let stale = slot.value.is_some().then(|| slot.snapshot());
        ReadPlan::Share { stale, rx }
      } else {
        slot.generation += 1;
        slot.status = QueryStatus::Fetching;
        slot.invalidated = false;
        let (tx, rx) = watch::channel(());
        slot.inflight = Some(rx.clone());
        let stale = slot.value.is_some().then(|| slot.snapshot());
        ReadPlan::Issue {
          generation: slot.generation,
          stale,
          rx,
          tx,
        }
      }
    };

    let wait_rx = match plan {
      ReadPlan::Fresh(entry) => return entry,
      ReadPlan::Share { stale, rx } => match stale {
        Some(entry) => return entry,
        None => rx,
      },
      ReadPlan::Issue {
        generation,
        stale,
        rx,
        tx,
      } => {
        // The fetcher runs outside the lock; the slot is already marked
        // Fetching so later readers share this request.
        debug!(key = %key, generation, "issuing fetch");
        let future = fetch();
        let cache = self.clone();
        let task_key = key.clone();
        tokio::spawn(async move {
          let result = future.await.and_then(|data| {
            serde_json::to_value(&data).map_err(|e| Error::Decode(e.to_string()))
          });
          cache.complete_fetch(&task_key, generation, result);
          let _ = tx.send(());
        });
        match stale {
          Some(entry) => return entry,
          None => rx,
        }
      }
    };

    self.wait_for_value(key, wait_rx).await
  }

  /// Wait until the entry holds a value or reaches a terminal state,
  /// chaining onto successive in-flight fetches if ours was superseded.
  async fn wait_for_value(&self, key: &QueryKey, mut rx: watch::Receiver<()>) -> QueryEntry {
    loop {
      // Err just means the sender side finished and dropped; re-check state
      // either way.
      let _ = rx.changed().await;

      let mut slots = self.lock();
      let Some(slot) = slots.get_mut(key) else {
        // Cache was cleared while the fetch was in flight
        return QueryEntry {
          value: None,
          updated_at: None,
          status: QueryStatus::Idle,
          error: None,
          stale: false,
        };
      };

      if slot.value.is_some() || matches!(slot.status, QueryStatus::Success | QueryStatus::Error) {
        return slot.snapshot();
      }
      // A live fetch drops its sender only after reporting through
      // `complete_fetch`, so a closed sender still registered here means
      // the fetch task died (panicked) without a result. Treat that as
      // terminal instead of re-waiting on a dead channel.
      let task_died = matches!(&slot.inflight, Some(next) if next.has_changed().is_err());
      if task_died {
        warn!(key = %key, "fetch task terminated without reporting a result");
        slot.inflight = None;
        slot.status = QueryStatus::Error;
        slot.error = Some("fetch aborted before completing".to_string());
        slot.notify();
        return slot.snapshot();
      }
      match &slot.inflight {
        Some(next) => rx = next.clone(),
        None => return slot.snapshot(),
      }
    }
  }

  /// Apply a fetch result, unless a newer fetch for the key has since been
  /// issued (last-write-wins by issue order) or the cache was torn down.
  fn complete_fetch(&self, key: &QueryKey, generation: u64, result: Result<Value>) {
    let mut slots = self.lock();
    let Some(slot) = slots.get_mut(key) else {
      return;
    };
    if slot.generation != generation {
      debug!(key = %key, generation, "dropping superseded fetch result");
      return;
    }
    slot.inflight = None;
    match result {
      Ok(value) => {
        slot.value = Some(value);
        slot.updated_at = Some(Instant::now());
        slot.status = QueryStatus::Success;
        slot.error = None;
        debug!(key = %key, generation, "fetch applied");
      }
      Err(e) => {
        // Keep the last-known-good value alongside the error
        slot.status = QueryStatus::Error;
        slot.error = Some(e.to_string());
        warn!(key = %key, generation, error = %e, "fetch failed");
      }
    }
    slot.notify();
  }

  /// Direct cache write, used by mutation patches. The entry becomes a
  /// fresh success; subscribers are notified. No request is issued.
  pub fn set_value<T: Serialize>(&self, key: &QueryKey, value: &T) -> Result<()> {
    let value = serde_json::to_value(value).map_err(|e| Error::Decode(e.to_string()))?;
    let mut slots = self.lock();
    let slot = slots.entry(key.clone()).or_default();
    slot.value = Some(value);
    slot.updated_at = Some(Instant::now());
    slot.status = QueryStatus::Success;
    slot.error = None;
    slot.notify();
    Ok(())
  }

  /// Edit the cached value for one key in place. Returns `true` if the
  /// entry existed and held a value.
  pub fn patch(&self, key: &QueryKey, f: impl FnOnce(&mut Value)) -> bool {
    let mut slots = self.lock();
    if let Some(slot) = slots.get_mut(key) {
      if let Some(value) = slot.value.as_mut() {
        f(value);
        slot.updated_at = Some(Instant::now());
        slot.notify();
        return true;
      }
    }
    false
  }

  /// Edit every cached value under `prefix` in place. Returns the number of
  /// entries edited.
  pub fn patch_prefix(&self, prefix: &QueryKey, mut f: impl FnMut(&QueryKey, &mut Value)) -> usize {
    let mut slots = self.lock();
    let mut patched = 0;
    for (key, slot) in slots.iter_mut() {
      if !key.starts_with(prefix) {
        continue;
      }
      if let Some(value) = slot.value.as_mut() {
        f(key, value);
        slot.updated_at = Some(Instant::now());
        slot.notify();
        patched += 1;
      }
    }
    patched
  }

  /// Mark every entry whose key starts with `prefix` as stale. Values are
  /// kept; the next read of a marked key issues a refetch, superseding any
  /// fetch already in flight for it.
  pub fn invalidate(&self, prefix: &QueryKey) {
    self.invalidate_where(prefix, |_| true);
  }

  /// Mark the entries under `prefix` that satisfy `pred` as stale.
  pub fn invalidate_where(&self, prefix: &QueryKey, pred: impl Fn(&QueryKey) -> bool) {
    let mut slots = self.lock();
    for (key, slot) in slots.iter_mut() {
      if key.starts_with(prefix) && pred(key) {
        slot.invalidated = true;
        debug!(key = %key, "invalidated");
        slot.notify();
      }
    }
  }

  /// Subscribe to changes of one key. The slot is created if absent so a
  /// subscriber can watch a key before its first read.
  pub fn subscribe(&self, key: &QueryKey) -> Subscription {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut slots = self.lock();
    slots.entry(key.clone()).or_default().subscribers.push(tx);
    Subscription { rx }
  }

  /// Capture the state of every entry under `prefix`, for rollback of
  /// optimistic mutations.
  pub fn snapshot(&self, prefix: &QueryKey) -> CacheSnapshot {
    let slots = self.lock();
    let entries = slots
      .iter()
      .filter(|(key, _)| key.starts_with(prefix))
      .map(|(key, slot)| {
        (
          key.clone(),
          SavedEntry {
            value: slot.value.clone(),
            updated_at: slot.updated_at,
            status: slot.status,
            error: slot.error.clone(),
            invalidated: slot.invalidated,
          },
        )
      })
      .collect();
    CacheSnapshot { entries }
  }

  /// Re-apply a snapshot taken earlier. Subscribers and in-flight fetch
  /// bookkeeping are left untouched.
  pub fn restore(&self, snapshot: CacheSnapshot) {
    let mut slots = self.lock();
    for (key, saved) in snapshot.entries {
      let slot = slots.entry(key).or_default();
      slot.value = saved.value;
      slot.updated_at = saved.updated_at;
      slot.status = saved.status;
      slot.error = saved.error;
      slot.invalidated = saved.invalidated;
      slot.notify();
    }
  }

  /// Whole-cache teardown (logout). Subscribers receive a final change
  /// signal; late fetch completions for dropped keys are discarded.
  pub fn clear(&self) {
    let mut slots = self.lock();
    for slot in slots.values_mut() {
      slot.notify();
    }
    slots.clear();
  }
}

impl std::fmt::Debug for QueryCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryCache")
      .field("entries", &self.len())
      .finish_non_exhaustive()
  }
}
