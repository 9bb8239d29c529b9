use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::api::types::{
  Ack, BrainUpdate, ChatList, ChatListParams, ChatSettingsUpdate, ChatUpdate, DisplayNameUpdate,
  LogList, LogListParams, MemberList, MemberListParams, MessageList, MessageListParams,
  NotificationList, NotificationListParams, PlanList, RoleUpdate,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Chat, ChatMember, ChatRole, ChatSettings, User};

/// Typed client for the Cortes backend API.
///
/// Thin wrapper over `reqwest`: bearer-token auth, JSON bodies, one method
/// per endpoint. All caching lives above this layer.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
}

/// Parse and normalize the base URL so endpoint joins always append.
fn normalize_base_url(url: &str) -> Result<Url> {
  let normalized = format!("{}/", url.trim_end_matches('/'));
  Url::parse(&normalized).map_err(|e| Error::Config(format!("invalid API base URL {}: {}", url, e)))
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::api_token()?;
    Self::with_token(config, &token)
  }

  pub fn with_token(config: &Config, token: &str) -> Result<Self> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
      .map_err(|e| Error::Config(format!("invalid API token: {}", e)))?;
    auth.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .build()
      .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

    Ok(Self {
      http,
      base: normalize_base_url(&config.api.url)?,
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| Error::Validation(format!("invalid endpoint path {}: {}", path, e)))
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T> {
    let mut url = self.endpoint(path)?;
    if !query.is_empty() {
      url
        .query_pairs_mut()
        .extend_pairs(query.iter().map(|(name, value)| (*name, value.as_str())));
    }
    let resp = self
      .http
      .get(url)
      .send()
      .await
      .map_err(Error::from_reqwest)?;
    read_response(resp).await
  }

  async fn patch_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
    let resp = self
      .http
      .patch(self.endpoint(path)?)
      .json(body)
      .send()
      .await
      .map_err(Error::from_reqwest)?;
    read_response(resp).await
  }

  async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
    let resp = self
      .http
      .post(self.endpoint(path)?)
      .json(body)
      .send()
      .await
      .map_err(Error::from_reqwest)?;
    read_response(resp).await
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  pub async fn list_chats(&self, params: &ChatListParams) -> Result<ChatList> {
    params.validate()?;
    self.get_json("chats", &params.query()).await
  }

  pub async fn get_chat(&self, id: u64) -> Result<Chat> {
    self.get_json(&format!("chats/{}", id), &[]).await
  }

  pub async fn get_chat_settings(&self, id: u64) -> Result<ChatSettings> {
    self.get_json(&format!("chats/{}/settings", id), &[]).await
  }

  pub async fn list_chat_members(&self, id: u64, params: &MemberListParams) -> Result<MemberList> {
    params.validate()?;
    self
      .get_json(&format!("chats/{}/members", id), &params.query())
      .await
  }

  pub async fn list_chat_logs(&self, id: u64, params: &LogListParams) -> Result<LogList> {
    params.validate()?;
    self
      .get_json(&format!("chats/{}/logs", id), &params.query())
      .await
  }

  pub async fn list_chat_messages(
    &self,
    id: u64,
    params: &MessageListParams,
  ) -> Result<MessageList> {
    params.validate()?;
    self
      .get_json(&format!("chats/{}/messages", id), &params.query())
      .await
  }

  pub async fn list_notifications(
    &self,
    params: &NotificationListParams,
  ) -> Result<NotificationList> {
    params.validate()?;
    self.get_json("notifications", &params.query()).await
  }

  pub async fn list_plans(&self) -> Result<PlanList> {
    self.get_json("plans", &[]).await
  }

  pub async fn get_user(&self) -> Result<User> {
    self.get_json("user", &[]).await
  }

  // ==========================================================================
  // Writes
  // ==========================================================================

  pub async fn update_chat(&self, id: u64, update: &ChatUpdate) -> Result<Chat> {
    update.validate()?;
    self.patch_json(&format!("chats/{}", id), update).await
  }

  pub async fn update_chat_settings(
    &self,
    id: u64,
    update: &ChatSettingsUpdate,
  ) -> Result<ChatSettings> {
    self
      .patch_json(&format!("chats/{}/settings", id), update)
      .await
  }

  pub async fn update_member_role(
    &self,
    chat_id: u64,
    user_id: u64,
    role: ChatRole,
  ) -> Result<ChatMember> {
    self
      .patch_json(
        &format!("chats/{}/members/{}", chat_id, user_id),
        &RoleUpdate { role },
      )
      .await
  }

  pub async fn remove_warning(&self, chat_id: u64, user_id: u64) -> Result<Ack> {
    self
      .post_json(
        &format!("chats/{}/members/{}/remove-warning", chat_id, user_id),
        &serde_json::json!({}),
      )
      .await
  }

  pub async fn mark_notification_read(&self, id: u64) -> Result<Ack> {
    self
      .post_json(&format!("notifications/{}/read", id), &serde_json::json!({}))
      .await
  }

  pub async fn mark_all_notifications_read(&self) -> Result<Ack> {
    self
      .post_json("notifications/read-all", &serde_json::json!({}))
      .await
  }

  pub async fn update_display_name(&self, display_name: &str) -> Result<User> {
    let display_name = display_name.trim();
    if display_name.is_empty() {
      return Err(Error::Validation(
        "display name must not be empty".to_string(),
      ));
    }
    self
      .patch_json(
        "user",
        &DisplayNameUpdate {
          display_name: display_name.to_string(),
        },
      )
      .await
  }

  pub async fn update_brain(&self, chat_id: u64, instructions: &str) -> Result<ChatSettings> {
    self
      .post_json(
        &format!("chats/{}/brain", chat_id),
        &BrainUpdate {
          instructions: instructions.to_string(),
        },
      )
      .await
  }
}

async fn read_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
  let status = resp.status();
  if !status.is_success() {
    let body = resp.text().await.unwrap_or_default();
    return Err(Error::Http {
      status: status.as_u16(),
      body,
    });
  }
  resp
    .json::<T>()
    .await
    .map_err(|e| Error::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn base_url_always_ends_with_a_slash() {
    let base = normalize_base_url("https://api.cortes.app/v1").unwrap();
    assert_eq!(base.as_str(), "https://api.cortes.app/v1/");
    // Joining appends instead of replacing the last path segment
    assert_eq!(
      base.join("chats/42/settings").unwrap().as_str(),
      "https://api.cortes.app/v1/chats/42/settings"
    );
  }

  #[test]
  fn malformed_base_url_is_a_config_error() {
    assert!(matches!(
      normalize_base_url("not a url"),
      Err(Error::Config(_))
    ));
  }
}
