//! Cache entry snapshots.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Instant;

/// The fetch status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// No fetch has been issued for this key yet
  Idle,
  /// A fetch is currently in flight
  Fetching,
  /// The last fetch completed successfully
  Success,
  /// The last fetch failed; any previous value is retained
  Error,
}

impl QueryStatus {
  pub fn is_fetching(&self) -> bool {
    matches!(self, QueryStatus::Fetching)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryStatus::Success)
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryStatus::Error)
  }
}

/// A point-in-time snapshot of one cache entry, handed out to readers.
///
/// The entry is owned by the cache; readers get a copy and never mutate
/// cache state through it. A failed refetch keeps the last-known-good value,
/// so `value` and `error` can be populated at the same time.
#[derive(Debug, Clone)]
pub struct QueryEntry {
  pub(crate) value: Option<Value>,
  /// When the value was last applied
  pub updated_at: Option<Instant>,
  pub status: QueryStatus,
  /// Message of the most recent failed fetch, cleared on the next success
  pub error: Option<String>,
  /// Set by explicit invalidation; the value is kept but the next read
  /// triggers a refetch
  pub stale: bool,
}

impl QueryEntry {
  /// Deserialize the cached value, if any.
  pub fn data<T: DeserializeOwned>(&self) -> Option<T> {
    self
      .value
      .as_ref()
      .and_then(|v| serde_json::from_value(v.clone()).ok())
  }

  /// Raw cached value, if any.
  pub fn raw(&self) -> Option<&Value> {
    self.value.as_ref()
  }

  pub fn has_value(&self) -> bool {
    self.value.is_some()
  }

  /// Age of the cached value.
  pub fn age(&self) -> Option<std::time::Duration> {
    self.updated_at.map(|t| t.elapsed())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn data_deserializes_the_stored_value() {
    let entry = QueryEntry {
      value: Some(serde_json::json!({"id": 42, "title": "lobby"})),
      updated_at: Some(Instant::now()),
      status: QueryStatus::Success,
      error: None,
      stale: false,
    };

    #[derive(serde::Deserialize)]
    struct Probe {
      id: u64,
      title: String,
    }

    let probe: Probe = entry.data().unwrap();
    assert_eq!(probe.id, 42);
    assert_eq!(probe.title, "lobby");
  }

  #[test]
  fn error_entry_keeps_last_known_good_value() {
    let entry = QueryEntry {
      value: Some(serde_json::json!([1, 2, 3])),
      updated_at: Some(Instant::now()),
      status: QueryStatus::Error,
      error: Some("network error: connection refused".to_string()),
      stale: false,
    };
    assert!(entry.status.is_error());
    assert_eq!(entry.data::<Vec<u32>>().unwrap(), vec![1, 2, 3]);
  }
}
