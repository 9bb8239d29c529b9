//! Domain records for the Cortes dashboard resources.
//!
//! These mirror what the backend returns; the client treats them as
//! read-only except through the explicit mutation operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier of a chat or user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
  Free,
  Pro,
  Ultra,
}

/// The caller's (or a member's) role within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
  Owner,
  Admin,
  Member,
}

impl std::fmt::Display for ChatRole {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      ChatRole::Owner => "owner",
      ChatRole::Admin => "admin",
      ChatRole::Member => "member",
    };
    write!(f, "{}", s)
  }
}

/// A managed Telegram chat as listed on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
  pub id: u64,
  pub title: String,
  pub member_count: u64,
  pub messages_today: u64,
  pub messages_total: u64,
  /// Whether the bot is currently active in this chat
  pub bot_active: bool,
  pub plan: PlanTier,
  /// The caller's role in this chat
  pub role: ChatRole,
}

/// Per-chat bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
  pub chat_id: u64,
  pub language: String,
  pub moderation_enabled: bool,
  pub welcome_enabled: bool,
  /// Free-form instructions fed to the bot's "brain" for this chat
  pub brain_instructions: Option<String>,
}

/// A member of a managed chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMember {
  pub user_id: u64,
  pub display_name: String,
  pub role: ChatRole,
  pub warnings: u32,
}

/// Kind of a chat log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
  Moderation,
  Command,
  System,
}

impl std::fmt::Display for LogKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      LogKind::Moderation => "moderation",
      LogKind::Command => "command",
      LogKind::System => "system",
    };
    write!(f, "{}", s)
  }
}

/// One entry of a chat's activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLog {
  pub id: u64,
  pub kind: LogKind,
  /// Display name of the acting user, if any
  pub actor: Option<String>,
  pub detail: String,
  pub created_at: DateTime<Utc>,
}

/// A message from a chat's recent history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
  pub id: u64,
  pub author: String,
  pub text: String,
  pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
  Moderation,
  Billing,
  System,
}

/// A dashboard notification for the current user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub id: u64,
  pub kind: NotificationKind,
  pub body: String,
  pub read: bool,
  pub created_at: DateTime<Utc>,
}

/// A subscription plan offered by the product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
  pub tier: PlanTier,
  pub name: String,
  /// Monthly price in cents
  pub price_cents: u64,
  pub chat_limit: u32,
  pub message_limit: u64,
}

/// The authenticated dashboard user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id: u64,
  pub display_name: String,
  pub email: String,
  pub plan: PlanTier,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn roles_and_tiers_use_lowercase_wire_names() {
    assert_eq!(serde_json::to_value(ChatRole::Admin).unwrap(), "admin");
    assert_eq!(serde_json::to_value(PlanTier::Ultra).unwrap(), "ultra");
    let role: ChatRole = serde_json::from_value(serde_json::json!("owner")).unwrap();
    assert_eq!(role, ChatRole::Owner);
  }

  #[test]
  fn chat_round_trips_through_json() {
    let chat = Chat {
      id: 42,
      title: "lobby".to_string(),
      member_count: 120,
      messages_today: 15,
      messages_total: 9001,
      bot_active: true,
      plan: PlanTier::Pro,
      role: ChatRole::Admin,
    };
    let value = serde_json::to_value(&chat).unwrap();
    assert_eq!(value["id"], 42);
    assert_eq!(value["plan"], "pro");
    let back: Chat = serde_json::from_value(value).unwrap();
    assert_eq!(back.title, "lobby");
  }
}
