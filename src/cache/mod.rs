//! In-memory query cache for dashboard data.
//!
//! This module provides the session-scoped cache that backs the data hooks:
//! - structural [`QueryKey`]s so parameterized reads never collide
//! - staleness tracking with read-while-stale semantics
//! - deduplication of concurrent fetches for the same key
//! - per-key last-write-wins ordering by fetch issue order
//! - prefix invalidation and explicit subscribe/notify
//!
//! Nothing is persisted; a cache lives exactly as long as the session that
//! owns it.

mod entry;
mod key;
mod store;

pub use entry::{QueryEntry, QueryStatus};
pub use key::QueryKey;
pub use store::{CacheSnapshot, QueryCache, Subscription};
