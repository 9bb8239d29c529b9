//! Structural cache keys.
//!
//! A [`QueryKey`] identifies one cacheable query as an ordered sequence of
//! string segments: the resource name, then ids and normalized parameter
//! pairs. Equality is by value, so two reads with the same resource and the
//! same parameters always land on the same cache entry, and any difference
//! in parameters keeps them apart.

use std::fmt;

/// Structural identifier for a cached, fetchable resource query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
  segments: Vec<String>,
}

impl QueryKey {
  /// Key with a single root segment, e.g. `QueryKey::root("chats")`.
  pub fn root(resource: &str) -> Self {
    Self {
      segments: vec![resource.to_string()],
    }
  }

  /// Key from an explicit list of segments.
  pub fn new<I, S>(segments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      segments: segments.into_iter().map(Into::into).collect(),
    }
  }

  /// Append a segment (an id or a sub-resource name).
  pub fn push(mut self, segment: impl ToString) -> Self {
    self.segments.push(segment.to_string());
    self
  }

  /// Append a `name=value` parameter segment.
  ///
  /// Parameters are folded into the key so distinct parameter sets never
  /// collide in the cache.
  pub fn param(self, name: &str, value: impl ToString) -> Self {
    self.push(format!("{}={}", name, value.to_string()))
  }

  /// Append a parameter segment only when the value is present.
  pub fn opt_param<T: ToString>(self, name: &str, value: Option<&T>) -> Self {
    match value {
      Some(v) => self.param(name, v.to_string()),
      None => self,
    }
  }

  /// Segment-wise prefix test, used by invalidation.
  ///
  /// `["chats"]` is a prefix of `["chats"]`, `["chats", "42"]` and
  /// `["chats", "42", "settings"]`, but not of `["notifications"]`.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.segments.len() >= prefix.segments.len()
      && self.segments[..prefix.segments.len()] == prefix.segments[..]
  }

  pub fn segments(&self) -> &[String] {
    &self.segments
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.segments.join("/"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn equality_is_structural() {
    let a = QueryKey::root("chats").push(42).param("limit", 20);
    let b = QueryKey::root("chats").push(42).param("limit", 20);
    assert_eq!(a, b);
  }

  #[test]
  fn distinct_params_produce_distinct_keys() {
    let a = QueryKey::root("chats").param("limit", 20).param("offset", 0);
    let b = QueryKey::root("chats").param("limit", 20).param("offset", 20);
    assert_ne!(a, b);
  }

  #[test]
  fn prefix_matches_self_and_descendants() {
    let prefix = QueryKey::root("chats");
    assert!(QueryKey::root("chats").starts_with(&prefix));
    assert!(QueryKey::root("chats").push(42).starts_with(&prefix));
    assert!(QueryKey::root("chats")
      .push(42)
      .push("settings")
      .starts_with(&prefix));
    assert!(!QueryKey::root("notifications").starts_with(&prefix));
  }

  #[test]
  fn prefix_is_per_segment_not_per_character() {
    // "chat" must not match "chats"
    assert!(!QueryKey::root("chats").starts_with(&QueryKey::root("chat")));
  }

  #[test]
  fn opt_param_skips_absent_values() {
    let without = QueryKey::root("chats").opt_param::<String>("search", None);
    assert_eq!(without, QueryKey::root("chats"));
    let search = "spam".to_string();
    let with = QueryKey::root("chats").opt_param("search", Some(&search));
    assert_eq!(with.to_string(), "chats/search=spam");
  }
}
