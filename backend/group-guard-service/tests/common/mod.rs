//! Shared fixtures for the engine integration tests.
//!
//! `RecordingGateway` stands in for the messaging bridge: it records every
//! outbound call in order, serves configurable group metadata and can be told
//! to reject participant updates.

#![allow(dead_code)]

use async_trait::async_trait;
use group_guard_service::db::InMemoryStore;
use group_guard_service::error::{GuardError, Result};
use group_guard_service::gateway::MessagingGateway;
use group_guard_service::guard::{AttemptTracker, GuardSettings};
use group_guard_service::models::{
    AdminActionKind, ContentEvent, GroupId, GroupMetadata, MessageContent, Participant,
    ParticipantEvent, ParticipantRole, UserId,
};
use group_guard_service::policy::StaticPolicy;
use group_guard_service::services::RemediationExecutor;
use group_guard_service::ModerationEngine;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const GROUP: &str = "120363000000000000@g.us";
pub const BOT: &str = "6280000000000@s.whatsapp.net";
pub const BOT_OWNER: &str = "6281111111111@s.whatsapp.net";
pub const GROUP_OWNER: &str = "6282222222222@s.whatsapp.net";
pub const ADMIN: &str = "6283333333333@s.whatsapp.net";
pub const MEMBER: &str = "6284444444444@s.whatsapp.net";
pub const OTHER_MEMBER: &str = "6285555555555@s.whatsapp.net";

/// One outbound gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    SendText {
        text: String,
        mentions: Vec<UserId>,
    },
    DeleteMessage {
        message_id: String,
    },
    UpdateParticipants {
        users: Vec<UserId>,
        action: AdminActionKind,
    },
    SetRestricted(bool),
}

#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    metadata: Mutex<HashMap<GroupId, GroupMetadata>>,
    reject_participant_updates: Mutex<bool>,
    metadata_calls: AtomicUsize,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_metadata(&self, group: GroupId, metadata: GroupMetadata) {
        self.metadata.lock().unwrap().insert(group, metadata);
    }

    pub fn reject_participant_updates(&self, reject: bool) {
        *self.reject_participant_updates.lock().unwrap() = reject;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::SendText { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn participant_updates(&self) -> Vec<(AdminActionKind, Vec<UserId>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::UpdateParticipants { users, action } => Some((action, users)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_text(&self, _chat: &GroupId, text: &str, mentions: &[UserId]) -> Result<()> {
        self.record(GatewayCall::SendText {
            text: text.to_string(),
            mentions: mentions.to_vec(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        _chat: &GroupId,
        message_id: &str,
        _sender: &UserId,
    ) -> Result<()> {
        self.record(GatewayCall::DeleteMessage {
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn update_participants(
        &self,
        _group: &GroupId,
        users: &[UserId],
        action: AdminActionKind,
    ) -> Result<()> {
        self.record(GatewayCall::UpdateParticipants {
            users: users.to_vec(),
            action,
        });
        if *self.reject_participant_updates.lock().unwrap() {
            return Err(GuardError::Gateway("403: not-authorized".to_string()));
        }
        Ok(())
    }

    async fn set_group_restricted(&self, _group: &GroupId, restricted: bool) -> Result<()> {
        self.record(GatewayCall::SetRestricted(restricted));
        Ok(())
    }

    async fn group_metadata(&self, group: &GroupId) -> Result<GroupMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata
            .lock()
            .unwrap()
            .get(group)
            .cloned()
            .ok_or_else(|| GuardError::Gateway("404: group not found".to_string()))
    }
}

pub struct Harness {
    pub engine: Arc<ModerationEngine>,
    pub gateway: Arc<RecordingGateway>,
    pub store: Arc<InMemoryStore>,
    pub policy: Arc<StaticPolicy>,
}

pub fn group() -> GroupId {
    GroupId::new(GROUP)
}

pub fn user(id: &str) -> UserId {
    UserId::new(id)
}

/// Owner, one long-standing admin and two members
pub fn default_metadata() -> GroupMetadata {
    GroupMetadata {
        owner: Some(user(GROUP_OWNER)),
        participants: vec![
            Participant {
                id: user(GROUP_OWNER),
                role: ParticipantRole::Superadmin,
            },
            Participant {
                id: user(ADMIN),
                role: ParticipantRole::Admin,
            },
            Participant {
                id: user(BOT),
                role: ParticipantRole::Admin,
            },
            Participant {
                id: user(MEMBER),
                role: ParticipantRole::Member,
            },
            Participant {
                id: user(OTHER_MEMBER),
                role: ParticipantRole::Member,
            },
        ],
    }
}

pub fn harness() -> Harness {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.set_metadata(group(), default_metadata());

    let store = Arc::new(InMemoryStore::new());
    let policy = Arc::new(StaticPolicy::permissive_defaults());
    let executor = Arc::new(RemediationExecutor::new(
        gateway.clone(),
        Duration::from_secs(1),
        Duration::ZERO,
    ));

    let engine = Arc::new(ModerationEngine::new(
        GuardSettings {
            bot_id: user(BOT),
            bot_owner_id: Some(user(BOT_OWNER)),
        },
        store.clone(),
        policy.clone(),
        executor,
        Arc::new(AttemptTracker::in_memory()),
    ));

    Harness {
        engine,
        gateway,
        store,
        policy,
    }
}

pub fn text_message(id: &str, sender: &str, text: &str) -> ContentEvent {
    ContentEvent {
        group_id: group(),
        message_id: id.to_string(),
        sender_id: user(sender),
        from_me: false,
        content: MessageContent::Text,
        text: Some(text.to_string()),
        mentions: Vec::new(),
        group_mentions: Vec::new(),
        timestamp: None,
    }
}

pub fn participant_update(
    action: AdminActionKind,
    author: Option<&str>,
    participants: &[&str],
) -> ParticipantEvent {
    ParticipantEvent {
        group_id: group(),
        action,
        participants: participants.iter().map(|p| user(p)).collect(),
        actor: None,
        author: author.map(String::from),
        origin: None,
    }
}
