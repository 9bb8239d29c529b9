//! Data and mutation hooks: the cached client the dashboard talks to.
//!
//! Each read method binds one resource (and its parameters) to a query key,
//! a fetch function and a staleness threshold, mirroring the dashboard's
//! per-resource hooks. Each write method performs the request and then
//! applies exactly one cache effect: a patch when the result is known
//! synchronously, an invalidation when it is not. Optimistic writes are
//! two-phase: tentative patch, request, and rollback to the pre-mutation
//! snapshot on failure.

use serde_json::Value;

use crate::api::{
  Ack, ApiClient, ChatListParams, ChatSettingsUpdate, ChatUpdate, LogListParams, MemberListParams,
  MessageListParams, NotificationListParams,
};
use crate::cache::{QueryCache, QueryEntry, QueryKey, Subscription};
use crate::config::{Config, StaleConfig};
use crate::error::{Error, Result};
use crate::keys;
use crate::types::{Chat, ChatMember, ChatRole, ChatSettings, User};

/// Cached client for the Cortes dashboard.
///
/// Owns the session's [`QueryCache`] and the [`ApiClient`]; clones share
/// both. Dropping every clone tears the session down.
#[derive(Clone)]
pub struct CortesClient {
  api: ApiClient,
  cache: QueryCache,
  stale: StaleConfig,
}

impl CortesClient {
  /// Build a client from configuration; the API token is read from the
  /// environment.
  pub fn new(config: &Config) -> Result<Self> {
    Ok(Self::with_api(ApiClient::new(config)?, config.stale.clone()))
  }

  /// Build a client around an existing [`ApiClient`].
  pub fn with_api(api: ApiClient, stale: StaleConfig) -> Self {
    Self {
      api,
      cache: QueryCache::new(),
      stale,
    }
  }

  /// The session cache, for direct reads and subscriptions.
  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  /// Subscribe to changes of one query key.
  pub fn subscribe(&self, key: &QueryKey) -> Subscription {
    self.cache.subscribe(key)
  }

  /// Tear down the session cache (logout). In-flight fetch results for
  /// dropped keys are discarded.
  pub fn reset(&self) {
    self.cache.clear();
  }

  // ==========================================================================
  // Data hooks
  // ==========================================================================

  pub async fn chats(&self, params: &ChatListParams) -> Result<QueryEntry> {
    params.validate()?;
    let key = keys::chats(params);
    let api = self.api.clone();
    let params = params.clone();
    Ok(
      self
        .cache
        .ensure_fresh(&key, self.stale.chats(), move || async move {
          api.list_chats(&params).await
        })
        .await,
    )
  }

  pub async fn chat(&self, id: u64) -> Result<QueryEntry> {
    let api = self.api.clone();
    Ok(
      self
        .cache
        .ensure_fresh(&keys::chat(id), self.stale.chats(), move || async move {
          api.get_chat(id).await
        })
        .await,
    )
  }

  pub async fn chat_settings(&self, id: u64) -> Result<QueryEntry> {
    let api = self.api.clone();
    Ok(
      self
        .cache
        .ensure_fresh(
          &keys::chat_settings(id),
          self.stale.settings(),
          move || async move { api.get_chat_settings(id).await },
        )
        .await,
    )
  }

  pub async fn chat_members(&self, id: u64, params: &MemberListParams) -> Result<QueryEntry> {
    params.validate()?;
    let key = keys::chat_members(id, params);
    let api = self.api.clone();
    let params = params.clone();
    Ok(
      self
        .cache
        .ensure_fresh(&key, self.stale.members(), move || async move {
          api.list_chat_members(id, &params).await
        })
        .await,
    )
  }

  pub async fn chat_logs(&self, id: u64, params: &LogListParams) -> Result<QueryEntry> {
    params.validate()?;
    let key = keys::chat_logs(id, params);
    let api = self.api.clone();
    let params = params.clone();
    Ok(
      self
        .cache
        .ensure_fresh(&key, self.stale.logs(), move || async move {
          api.list_chat_logs(id, &params).await
        })
        .await,
    )
  }

  pub async fn chat_messages(&self, id: u64, params: &MessageListParams) -> Result<QueryEntry> {
    params.validate()?;
    let key = keys::chat_messages(id, params);
    let api = self.api.clone();
    let params = params.clone();
    Ok(
      self
        .cache
        .ensure_fresh(&key, self.stale.messages(), move || async move {
          api.list_chat_messages(id, &params).await
        })
        .await,
    )
  }

  pub async fn notifications(&self, params: &NotificationListParams) -> Result<QueryEntry> {
    params.validate()?;
    let key = keys::notifications(params);
    let api = self.api.clone();
    let params = params.clone();
    Ok(
      self
        .cache
        .ensure_fresh(&key, self.stale.notifications(), move || async move {
          api.list_notifications(&params).await
        })
        .await,
    )
  }

  pub async fn plans(&self) -> Result<QueryEntry> {
    let api = self.api.clone();
    Ok(
      self
        .cache
        .ensure_fresh(&keys::plans(), self.stale.plans(), move || async move {
          api.list_plans().await
        })
        .await,
    )
  }

  pub async fn user(&self) -> Result<QueryEntry> {
    let api = self.api.clone();
    Ok(
      self
        .cache
        .ensure_fresh(&keys::user(), self.stale.user(), move || async move {
          api.get_user().await
        })
        .await,
    )
  }

  // ==========================================================================
  // Mutation hooks
  // ==========================================================================

  /// Update a chat's own fields. Patch effect: the returned record replaces
  /// the detail entry and the matching element of every cached chat list
  /// variant, with no refetch.
  pub async fn update_chat(&self, id: u64, update: &ChatUpdate) -> Result<Chat> {
    update.validate()?;
    let chat = self.api.update_chat(id, update).await?;
    patch_chat_everywhere(&self.cache, &chat)?;
    Ok(chat)
  }

  /// Update per-chat settings. Patch effect: the returned record replaces
  /// the settings entry.
  pub async fn update_chat_settings(
    &self,
    id: u64,
    update: &ChatSettingsUpdate,
  ) -> Result<ChatSettings> {
    let settings = self.api.update_chat_settings(id, update).await?;
    self.cache.set_value(&keys::chat_settings(id), &settings)?;
    Ok(settings)
  }

  /// Replace a chat's brain instructions. Patch effect: the returned
  /// settings record replaces the settings entry.
  pub async fn update_brain(&self, chat_id: u64, instructions: &str) -> Result<ChatSettings> {
    let settings = self.api.update_brain(chat_id, instructions).await?;
    self
      .cache
      .set_value(&keys::chat_settings(chat_id), &settings)?;
    Ok(settings)
  }

  /// Change a member's role. Invalidate effect: the member lists for the
  /// chat are refetched on next read, since a role change can reorder or
  /// refilter them in ways not computable locally.
  pub async fn update_member_role(
    &self,
    chat_id: u64,
    user_id: u64,
    role: ChatRole,
  ) -> Result<ChatMember> {
    let member = self.api.update_member_role(chat_id, user_id, role).await?;
    self.cache.invalidate(&keys::chat_members_root(chat_id));
    Ok(member)
  }

  /// Remove one warning from a member. Invalidate effect: member lists and
  /// activity logs of the chat.
  pub async fn remove_warning(&self, chat_id: u64, user_id: u64) -> Result<Ack> {
    let ack = self.api.remove_warning(chat_id, user_id).await?;
    self.cache.invalidate(&keys::chat_members_root(chat_id));
    self.cache.invalidate(&keys::chat_root(chat_id).push("logs"));
    Ok(ack)
  }

  /// Mark one notification as read. Optimistic patch of the unfiltered
  /// cached notification lists, rolled back if the request fails. Unread-
  /// only list variants cannot hold a read item, so on success they are
  /// invalidated instead of patched.
  pub async fn mark_notification_read(&self, id: u64) -> Result<()> {
    let prefix = keys::notifications_root();
    let snapshot = self.cache.snapshot(&prefix);
    mark_read_in_lists(&self.cache, id);
    match self.api.mark_notification_read(id).await {
      Ok(_) => {
        self.cache.invalidate_where(&prefix, keys::is_unread_only);
        Ok(())
      }
      Err(e) => {
        self.cache.restore(snapshot);
        Err(e)
      }
    }
  }

  /// Mark every notification as read. Invalidate effect: the filtered list
  /// variants (unread-only, pages) cannot be reconciled locally.
  pub async fn mark_all_notifications_read(&self) -> Result<()> {
    self.api.mark_all_notifications_read().await?;
    self.cache.invalidate(&keys::notifications_root());
    Ok(())
  }

  /// Change the user's display name. Optimistic patch of the user entry;
  /// the confirmed record replaces the tentative one, or the snapshot is
  /// restored on failure.
  pub async fn update_display_name(&self, display_name: &str) -> Result<User> {
    let display_name = display_name.trim();
    if display_name.is_empty() {
      return Err(Error::Validation(
        "display name must not be empty".to_string(),
      ));
    }

    let key = keys::user();
    let snapshot = self.cache.snapshot(&key);
    self.cache.patch(&key, |value| {
      value["display_name"] = Value::String(display_name.to_string());
    });

    match self.api.update_display_name(display_name).await {
      Ok(user) => {
        self.cache.set_value(&key, &user)?;
        Ok(user)
      }
      Err(e) => {
        self.cache.restore(snapshot);
        Err(e)
      }
    }
  }
}

/// Write an updated chat into its detail entry and into the matching
/// element of every cached `chats` list variant.
fn patch_chat_everywhere(cache: &QueryCache, chat: &Chat) -> Result<()> {
  cache.set_value(&keys::chat(chat.id), chat)?;
  let replacement = serde_json::to_value(chat).map_err(|e| Error::Decode(e.to_string()))?;
  cache.patch_prefix(&keys::chats_root(), |_, value| {
    if let Some(items) = value.get_mut("chats").and_then(Value::as_array_mut) {
      for item in items {
        if item.get("id").and_then(Value::as_u64) == Some(chat.id) {
          *item = replacement.clone();
        }
      }
    }
  });
  Ok(())
}

/// Flip the read flag of one notification in every cached unfiltered list
/// variant. Unread-only variants are left alone; they are invalidated once
/// the write confirms.
fn mark_read_in_lists(cache: &QueryCache, id: u64) {
  cache.patch_prefix(&keys::notifications_root(), |key, value| {
    if keys::is_unread_only(key) {
      return;
    }
    if let Some(items) = value.get_mut("notifications").and_then(Value::as_array_mut) {
      for item in items {
        if item.get("id").and_then(Value::as_u64) == Some(id) {
          item["read"] = Value::Bool(true);
        }
      }
    }
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{ChatList, NotificationList};
  use crate::types::{Notification, NotificationKind, PlanTier};

  fn chat(id: u64, title: &str) -> Chat {
    Chat {
      id,
      title: title.to_string(),
      member_count: 10,
      messages_today: 1,
      messages_total: 100,
      bot_active: true,
      plan: PlanTier::Free,
      role: ChatRole::Owner,
    }
  }

  fn notification(id: u64) -> Notification {
    Notification {
      id,
      kind: NotificationKind::System,
      body: "hello".to_string(),
      read: false,
      created_at: chrono::Utc::now(),
    }
  }

  /// Client whose every request fails at the transport level.
  fn offline_client() -> CortesClient {
    let config = Config::with_url("http://127.0.0.1:1/");
    let api = ApiClient::with_token(&config, "test-token").unwrap();
    CortesClient::with_api(api, StaleConfig::default())
  }

  #[test]
  fn chat_patch_reaches_detail_and_every_list_variant() {
    let cache = QueryCache::new();

    // Two pages of the chat list, cached under distinct keys
    let page1 = keys::chats(&ChatListParams::default());
    let page2 = keys::chats(&ChatListParams {
      offset: 20,
      ..Default::default()
    });
    cache
      .set_value(
        &page1,
        &ChatList {
          chats: vec![chat(42, "old"), chat(7, "other")],
          total: 2,
        },
      )
      .unwrap();
    cache
      .set_value(
        &page2,
        &ChatList {
          chats: vec![chat(42, "old")],
          total: 1,
        },
      )
      .unwrap();

    patch_chat_everywhere(&cache, &chat(42, "new")).unwrap();

    let detail: Chat = cache.get(&keys::chat(42)).unwrap().data().unwrap();
    assert_eq!(detail.title, "new");
    for key in [&page1, &page2] {
      let list: ChatList = cache.get(key).unwrap().data().unwrap();
      let chat42 = list.chats.iter().find(|c| c.id == 42).unwrap();
      assert_eq!(chat42.title, "new");
    }
    // Unrelated chats stay untouched
    let list: ChatList = cache.get(&page1).unwrap().data().unwrap();
    assert_eq!(list.chats.iter().find(|c| c.id == 7).unwrap().title, "other");
  }

  #[test]
  fn marking_one_notification_read_leaves_the_rest_alone() {
    let cache = QueryCache::new();
    let key = keys::notifications(&NotificationListParams::default());
    cache
      .set_value(
        &key,
        &NotificationList {
          notifications: vec![notification(1), notification(2)],
          total: 2,
        },
      )
      .unwrap();

    mark_read_in_lists(&cache, 1);

    let list: NotificationList = cache.get(&key).unwrap().data().unwrap();
    assert!(list.notifications[0].read);
    assert!(!list.notifications[1].read);
  }

  #[test]
  fn mark_read_skips_unread_only_list_variants() {
    let cache = QueryCache::new();
    let plain = keys::notifications(&NotificationListParams::default());
    let filtered = keys::notifications(&NotificationListParams {
      unread_only: true,
      ..Default::default()
    });
    for key in [&plain, &filtered] {
      cache
        .set_value(
          key,
          &NotificationList {
            notifications: vec![notification(1)],
            total: 1,
          },
        )
        .unwrap();
    }

    mark_read_in_lists(&cache, 1);

    let list: NotificationList = cache.get(&plain).unwrap().data().unwrap();
    assert!(list.notifications[0].read);
    // A read item must never appear inside an unread-only variant; that
    // entry is reconciled by invalidation after the write confirms.
    let list: NotificationList = cache.get(&filtered).unwrap().data().unwrap();
    assert!(!list.notifications[0].read);
  }

  #[tokio::test]
  async fn failed_mark_read_rolls_back_the_optimistic_patch() {
    let client = offline_client();
    let key = keys::notifications(&NotificationListParams::default());
    client
      .cache()
      .set_value(
        &key,
        &NotificationList {
          notifications: vec![notification(1)],
          total: 1,
        },
      )
      .unwrap();

    let err = client.mark_notification_read(1).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));

    // The tentative read flag was rolled back with the snapshot
    let list: NotificationList = client.cache().get(&key).unwrap().data().unwrap();
    assert!(!list.notifications[0].read);
    assert!(!client.cache().get(&key).unwrap().stale);
  }

  #[tokio::test]
  async fn failed_display_name_update_restores_the_user_entry() {
    let client = offline_client();
    let user = User {
      id: 1,
      display_name: "old name".to_string(),
      email: "user@example.test".to_string(),
      plan: PlanTier::Pro,
    };
    client.cache().set_value(&keys::user(), &user).unwrap();

    let err = client.update_display_name("new name").await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));

    let cached: User = client.cache().get(&keys::user()).unwrap().data().unwrap();
    assert_eq!(cached.display_name, "old name");
  }
}
