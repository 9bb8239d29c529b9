//! Request parameters, list envelopes and write payloads for the Cortes API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Chat, ChatLog, ChatMember, ChatMessage, ChatRole, LogKind, Notification, Plan};

/// Largest page size the backend accepts.
pub const MAX_PAGE_LIMIT: u64 = 100;

pub(crate) fn validate_limit(limit: u64) -> Result<()> {
  if limit == 0 || limit > MAX_PAGE_LIMIT {
    return Err(Error::Validation(format!(
      "limit must be between 1 and {}, got {}",
      MAX_PAGE_LIMIT, limit
    )));
  }
  Ok(())
}

/// Normalize an optional search string: trimmed, empty collapsed to None.
pub(crate) fn normalize_search(search: &Option<String>) -> Option<String> {
  search
    .as_deref()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
}

// ============================================================================
// List parameters
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatListParams {
  pub search: Option<String>,
  pub limit: u64,
  pub offset: u64,
}

impl Default for ChatListParams {
  fn default() -> Self {
    Self {
      search: None,
      limit: 20,
      offset: 0,
    }
  }
}

impl ChatListParams {
  pub(crate) fn validate(&self) -> Result<()> {
    validate_limit(self.limit)
  }

  pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
    let mut q = vec![
      ("limit", self.limit.to_string()),
      ("offset", self.offset.to_string()),
    ];
    if let Some(search) = normalize_search(&self.search) {
      q.push(("search", search));
    }
    q
  }
}

#[derive(Debug, Clone)]
pub struct MemberListParams {
  pub role: Option<ChatRole>,
  pub search: Option<String>,
  pub limit: u64,
  pub offset: u64,
}

impl Default for MemberListParams {
  fn default() -> Self {
    Self {
      role: None,
      search: None,
      limit: 20,
      offset: 0,
    }
  }
}

impl MemberListParams {
  pub(crate) fn validate(&self) -> Result<()> {
    validate_limit(self.limit)
  }

  pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
    let mut q = vec![
      ("limit", self.limit.to_string()),
      ("offset", self.offset.to_string()),
    ];
    if let Some(role) = self.role {
      q.push(("role", role.to_string()));
    }
    if let Some(search) = normalize_search(&self.search) {
      q.push(("search", search));
    }
    q
  }
}

#[derive(Debug, Clone)]
pub struct LogListParams {
  pub kind: Option<LogKind>,
  pub from: Option<DateTime<Utc>>,
  pub to: Option<DateTime<Utc>>,
  pub limit: u64,
  pub offset: u64,
}

impl Default for LogListParams {
  fn default() -> Self {
    Self {
      kind: None,
      from: None,
      to: None,
      limit: 50,
      offset: 0,
    }
  }
}

impl LogListParams {
  pub(crate) fn validate(&self) -> Result<()> {
    validate_limit(self.limit)?;
    if let (Some(from), Some(to)) = (self.from, self.to) {
      if from > to {
        return Err(Error::Validation(format!(
          "date range is inverted: {} > {}",
          from, to
        )));
      }
    }
    Ok(())
  }

  pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
    let mut q = vec![
      ("limit", self.limit.to_string()),
      ("offset", self.offset.to_string()),
    ];
    if let Some(kind) = self.kind {
      q.push(("type", kind.to_string()));
    }
    if let Some(from) = self.from {
      q.push(("from", from.to_rfc3339()));
    }
    if let Some(to) = self.to {
      q.push(("to", to.to_rfc3339()));
    }
    q
  }
}

#[derive(Debug, Clone)]
pub struct MessageListParams {
  pub limit: u64,
  /// Opaque continuation cursor from a previous page
  pub cursor: Option<String>,
}

impl Default for MessageListParams {
  fn default() -> Self {
    Self {
      limit: 50,
      cursor: None,
    }
  }
}

impl MessageListParams {
  pub(crate) fn validate(&self) -> Result<()> {
    validate_limit(self.limit)
  }

  pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
    let mut q = vec![("limit", self.limit.to_string())];
    if let Some(cursor) = &self.cursor {
      q.push(("cursor", cursor.clone()));
    }
    q
  }
}

#[derive(Debug, Clone)]
pub struct NotificationListParams {
  pub unread_only: bool,
  pub limit: u64,
  pub offset: u64,
}

impl Default for NotificationListParams {
  fn default() -> Self {
    Self {
      unread_only: false,
      limit: 20,
      offset: 0,
    }
  }
}

impl NotificationListParams {
  pub(crate) fn validate(&self) -> Result<()> {
    validate_limit(self.limit)
  }

  pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
    let mut q = vec![
      ("limit", self.limit.to_string()),
      ("offset", self.offset.to_string()),
    ];
    if self.unread_only {
      q.push(("unread_only", "true".to_string()));
    }
    q
  }
}

// ============================================================================
// List envelopes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatList {
  pub chats: Vec<Chat>,
  pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberList {
  pub members: Vec<ChatMember>,
  pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogList {
  pub logs: Vec<ChatLog>,
  pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageList {
  pub messages: Vec<ChatMessage>,
  pub total: u64,
  /// Cursor for the next page, absent on the last one
  pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationList {
  pub notifications: Vec<Notification>,
  pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanList {
  pub plans: Vec<Plan>,
  pub total: u64,
}

// ============================================================================
// Write payloads
// ============================================================================

/// Partial chat update; absent fields are left unchanged by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bot_active: Option<bool>,
}

impl ChatUpdate {
  pub(crate) fn validate(&self) -> Result<()> {
    if self.title.is_none() && self.bot_active.is_none() {
      return Err(Error::Validation("chat update carries no fields".to_string()));
    }
    if let Some(title) = &self.title {
      if title.trim().is_empty() {
        return Err(Error::Validation("chat title must not be empty".to_string()));
      }
    }
    Ok(())
  }
}

/// Partial settings update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatSettingsUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub language: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub moderation_enabled: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub welcome_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RoleUpdate {
  pub role: ChatRole,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DisplayNameUpdate {
  pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BrainUpdate {
  pub instructions: String,
}

/// Bare acknowledgement returned by writes without a richer result.
#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
  pub ok: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn limit_bounds_are_enforced() {
    assert!(validate_limit(1).is_ok());
    assert!(validate_limit(MAX_PAGE_LIMIT).is_ok());
    assert!(matches!(validate_limit(0), Err(Error::Validation(_))));
    assert!(matches!(
      validate_limit(MAX_PAGE_LIMIT + 1),
      Err(Error::Validation(_))
    ));
  }

  #[test]
  fn blank_search_is_dropped_from_the_query() {
    let params = ChatListParams {
      search: Some("   ".to_string()),
      ..Default::default()
    };
    assert!(params.query().iter().all(|(name, _)| *name != "search"));

    let params = ChatListParams {
      search: Some("  spam ".to_string()),
      ..Default::default()
    };
    let q = params.query();
    assert!(q.contains(&("search", "spam".to_string())));
  }

  #[test]
  fn inverted_date_range_is_rejected() {
    let params = LogListParams {
      from: Some(Utc::now()),
      to: Some(Utc::now() - chrono::Duration::hours(1)),
      ..Default::default()
    };
    assert!(matches!(params.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn empty_chat_update_is_rejected() {
    assert!(ChatUpdate::default().validate().is_err());
    let update = ChatUpdate {
      title: Some("  ".to_string()),
      ..Default::default()
    };
    assert!(update.validate().is_err());
    let update = ChatUpdate {
      bot_active: Some(false),
      ..Default::default()
    };
    assert!(update.validate().is_ok());
  }
}
