//! Client-side data synchronization layer for the Cortes dashboard.
//!
//! The dashboard reads everything through a session-scoped [`QueryCache`]:
//! each data hook on [`CortesClient`] binds one resource to a structural
//! [`QueryKey`], a fetch function and a staleness threshold, serving cached
//! values while refreshing stale ones in the background. Mutation hooks
//! apply their declared cache effect (patch or invalidate) exactly once on
//! success and leave the cache untouched on failure.
//!
//! # Example
//!
//! ```ignore
//! let config = Config::load(None)?;
//! let client = CortesClient::new(&config)?;
//!
//! // First read fetches; a second read within 30s is served from cache.
//! let entry = client.chats(&ChatListParams::default()).await?;
//! if let Some(list) = entry.data::<ChatList>() {
//!     println!("{} chats", list.total);
//! }
//!
//! // Renaming a chat patches the detail entry and every cached list.
//! client
//!     .update_chat(42, &ChatUpdate { title: Some("ops".into()), ..Default::default() })
//!     .await?;
//! ```

pub mod api;
pub mod cache;
mod client;
pub mod config;
mod error;
pub mod keys;
pub mod types;

pub use cache::{QueryCache, QueryEntry, QueryKey, QueryStatus, Subscription};
pub use client::CortesClient;
pub use config::Config;
pub use error::{Error, Result};
