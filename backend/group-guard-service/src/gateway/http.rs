use super::MessagingGateway;
use crate::error::{GuardError, Result};
use crate::models::{AdminActionKind, GroupId, GroupMetadata, UserId};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;

/// Gateway speaking JSON to the messaging bridge that owns the platform session
pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct SendTextBody<'a> {
    text: &'a str,
    mentions: &'a [UserId],
}

#[derive(Serialize)]
struct DeleteMessageBody<'a> {
    participant: &'a UserId,
}

#[derive(Serialize)]
struct ParticipantsBody<'a> {
    action: AdminActionKind,
    participants: &'a [UserId],
}

#[derive(Serialize)]
struct SettingsBody {
    announce: bool,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GuardError::GatewayTimeout(self.timeout)
            } else {
                GuardError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GuardError::Gateway(format!("{}: {}", status, body)));
        }

        Ok(response)
    }
}

#[async_trait]
impl MessagingGateway for HttpGateway {
    async fn send_text(&self, chat: &GroupId, text: &str, mentions: &[UserId]) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/chats/{}/messages", chat)))
            .json(&SendTextBody { text, mentions });
        self.send(request).await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        chat: &GroupId,
        message_id: &str,
        sender: &UserId,
    ) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/chats/{}/messages/{}/delete", chat, message_id)))
            .json(&DeleteMessageBody {
                participant: sender,
            });
        self.send(request).await?;
        Ok(())
    }

    async fn update_participants(
        &self,
        group: &GroupId,
        users: &[UserId],
        action: AdminActionKind,
    ) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/groups/{}/participants", group)))
            .json(&ParticipantsBody {
                action,
                participants: users,
            });
        self.send(request).await?;
        Ok(())
    }

    async fn set_group_restricted(&self, group: &GroupId, restricted: bool) -> Result<()> {
        let request = self
            .client
            .put(self.url(&format!("/groups/{}/settings", group)))
            .json(&SettingsBody {
                announce: restricted,
            });
        self.send(request).await?;
        Ok(())
    }

    async fn group_metadata(&self, group: &GroupId) -> Result<GroupMetadata> {
        let request = self
            .client
            .get(self.url(&format!("/groups/{}/metadata", group)));
        let metadata = self.send(request).await?.json::<GroupMetadata>().await?;
        Ok(metadata)
    }
}
