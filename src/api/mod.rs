//! Typed HTTP boundary to the Cortes backend.

mod client;
pub(crate) mod types;

pub use client::ApiClient;
pub use types::{
  Ack, ChatList, ChatListParams, ChatSettingsUpdate, ChatUpdate, LogList, LogListParams,
  MemberList, MemberListParams, MessageList, MessageListParams, NotificationList,
  NotificationListParams, PlanList, MAX_PAGE_LIMIT,
};
