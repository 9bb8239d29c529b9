//! Query key constructors for the dashboard resources.
//!
//! Every read folds all of its parameters into the key, so paginated or
//! filtered variants of one resource occupy distinct cache entries, while
//! prefix-based invalidation still reaches all of them through the shared
//! resource root.

use crate::api::types::{
  normalize_search, ChatListParams, LogListParams, MemberListParams, MessageListParams,
  NotificationListParams,
};
use crate::cache::QueryKey;

// ============================================================================
// Resource roots (invalidation prefixes)
// ============================================================================

pub fn chats_root() -> QueryKey {
  QueryKey::root("chats")
}

pub fn chat_root(id: u64) -> QueryKey {
  chats_root().push(id)
}

pub fn notifications_root() -> QueryKey {
  QueryKey::root("notifications")
}

// ============================================================================
// Per-query keys
// ============================================================================

pub fn chats(params: &ChatListParams) -> QueryKey {
  chats_root()
    .param("limit", params.limit)
    .param("offset", params.offset)
    .opt_param("search", normalize_search(&params.search).as_ref())
}

pub fn chat(id: u64) -> QueryKey {
  chat_root(id)
}

pub fn chat_settings(id: u64) -> QueryKey {
  chat_root(id).push("settings")
}

pub fn chat_members_root(id: u64) -> QueryKey {
  chat_root(id).push("members")
}

pub fn chat_members(id: u64, params: &MemberListParams) -> QueryKey {
  chat_members_root(id)
    .param("limit", params.limit)
    .param("offset", params.offset)
    .opt_param("role", params.role.as_ref())
    .opt_param("search", normalize_search(&params.search).as_ref())
}

pub fn chat_logs(id: u64, params: &LogListParams) -> QueryKey {
  chat_root(id)
    .push("logs")
    .param("limit", params.limit)
    .param("offset", params.offset)
    .opt_param("type", params.kind.as_ref())
    .opt_param("from", params.from.map(|t| t.to_rfc3339()).as_ref())
    .opt_param("to", params.to.map(|t| t.to_rfc3339()).as_ref())
}

pub fn chat_messages(id: u64, params: &MessageListParams) -> QueryKey {
  chat_root(id)
    .push("messages")
    .param("limit", params.limit)
    .opt_param("cursor", params.cursor.as_ref())
}

pub fn notifications(params: &NotificationListParams) -> QueryKey {
  let key = notifications_root()
    .param("limit", params.limit)
    .param("offset", params.offset);
  if params.unread_only {
    key.param("unread_only", true)
  } else {
    key
  }
}

/// Whether a notification list key is an unread-only variant.
pub(crate) fn is_unread_only(key: &QueryKey) -> bool {
  key.segments().iter().any(|s| s == "unread_only=true")
}

pub fn plans() -> QueryKey {
  QueryKey::root("plans")
}

pub fn user() -> QueryKey {
  QueryKey::root("user")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::ChatRole;

  #[test]
  fn detail_and_sub_resources_share_the_chat_prefix() {
    let root = chats_root();
    assert!(chat(42).starts_with(&root));
    assert!(chat_settings(42).starts_with(&root));
    assert!(chat_members(42, &MemberListParams::default()).starts_with(&root));
    assert!(!notifications(&NotificationListParams::default()).starts_with(&root));

    // And per-chat invalidation stays scoped to that chat
    assert!(chat_settings(42).starts_with(&chat_root(42)));
    assert!(!chat_settings(7).starts_with(&chat_root(42)));
  }

  #[test]
  fn pagination_and_filters_keep_entries_apart() {
    let page1 = chats(&ChatListParams {
      offset: 0,
      ..Default::default()
    });
    let page2 = chats(&ChatListParams {
      offset: 20,
      ..Default::default()
    });
    assert_ne!(page1, page2);

    let admins = chat_members(
      42,
      &MemberListParams {
        role: Some(ChatRole::Admin),
        ..Default::default()
      },
    );
    let everyone = chat_members(42, &MemberListParams::default());
    assert_ne!(admins, everyone);
  }

  #[test]
  fn same_params_land_on_the_same_entry() {
    let params = ChatListParams {
      search: Some("spam".to_string()),
      limit: 10,
      offset: 0,
    };
    assert_eq!(chats(&params), chats(&params.clone()));
  }
}
