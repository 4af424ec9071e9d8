//! Messaging gateway collaborator.

pub mod http;

pub use http::HttpGateway;

use crate::error::Result;
use crate::models::{AdminActionKind, GroupId, GroupMetadata, UserId};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Outbound operations against the chat platform
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(&self, chat: &GroupId, text: &str, mentions: &[UserId]) -> Result<()>;

    async fn delete_message(
        &self,
        chat: &GroupId,
        message_id: &str,
        sender: &UserId,
    ) -> Result<()>;

    async fn update_participants(
        &self,
        group: &GroupId,
        users: &[UserId],
        action: AdminActionKind,
    ) -> Result<()>;

    /// Switch the group between admin-only and open messaging
    async fn set_group_restricted(&self, group: &GroupId, restricted: bool) -> Result<()>;

    async fn group_metadata(&self, group: &GroupId) -> Result<GroupMetadata>;
}
