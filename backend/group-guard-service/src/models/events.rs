//! Inbound platform events and group metadata.

use super::identity::{GroupId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inbound event, routed to exactly one of the classifier or the admin guard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Message(ContentEvent),
    ParticipantUpdate(ParticipantEvent),
}

impl Event {
    pub fn group_id(&self) -> &GroupId {
        match self {
            Event::Message(e) => &e.group_id,
            Event::ParticipantUpdate(e) => &e.group_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageContent {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Other,
}

/// A message posted in a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEvent {
    pub group_id: GroupId,
    pub message_id: String,
    pub sender_id: UserId,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub content: MessageContent,
    /// Message text, or the caption for media
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub mentions: Vec<UserId>,
    #[serde(default)]
    pub group_mentions: Vec<GroupId>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ContentEvent {
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminActionKind {
    Add,
    Remove,
    Promote,
    Demote,
}

impl AdminActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminActionKind::Add => "add",
            AdminActionKind::Remove => "remove",
            AdminActionKind::Promote => "promote",
            AdminActionKind::Demote => "demote",
        }
    }

    /// How long after promotion an admin remains untrusted for this action
    pub fn trust_window(&self) -> Duration {
        match self {
            AdminActionKind::Add => Duration::hours(48),
            AdminActionKind::Remove | AdminActionKind::Promote | AdminActionKind::Demote => {
                Duration::hours(24)
            }
        }
    }

    /// Unauthorized attempts after which the actor is punished
    pub fn attempt_threshold(&self) -> u32 {
        match self {
            AdminActionKind::Remove | AdminActionKind::Add | AdminActionKind::Promote => 2,
            AdminActionKind::Demote => 3,
        }
    }

    /// The participant update that undoes this one
    pub fn inverse(&self) -> AdminActionKind {
        match self {
            AdminActionKind::Add => AdminActionKind::Remove,
            AdminActionKind::Remove => AdminActionKind::Add,
            AdminActionKind::Promote => AdminActionKind::Demote,
            AdminActionKind::Demote => AdminActionKind::Promote,
        }
    }
}

impl fmt::Display for AdminActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A membership change reported by the platform
///
/// The acting user is reported inconsistently across platform versions, so the
/// raw candidate fields are kept as-is and resolved by `guard::resolve_actor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantEvent {
    pub group_id: GroupId,
    pub action: AdminActionKind,
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    #[default]
    Member,
    Admin,
    Superadmin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: UserId,
    #[serde(default)]
    pub role: ParticipantRole,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl GroupMetadata {
    pub fn is_owner(&self, user: &UserId) -> bool {
        self.owner.as_ref() == Some(user)
    }

    pub fn is_admin(&self, user: &UserId) -> bool {
        self.participants
            .iter()
            .any(|p| &p.id == user && p.role != ParticipantRole::Member)
    }

    pub fn admins(&self) -> impl Iterator<Item = &UserId> {
        self.participants
            .iter()
            .filter(|p| p.role != ParticipantRole::Member)
            .map(|p| &p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_deserializes_tagged() {
        let json = r#"{
            "type": "participant_update",
            "group_id": "123@g.us",
            "action": "remove",
            "participants": ["5:2@s.whatsapp.net"],
            "author": "7@s.whatsapp.net"
        }"#;

        let event: Event = serde_json::from_str(json).unwrap();
        match event {
            Event::ParticipantUpdate(e) => {
                assert_eq!(e.action, AdminActionKind::Remove);
                assert_eq!(e.participants[0].as_str(), "5@s.whatsapp.net");
                assert!(e.actor.is_none());
                assert_eq!(e.author.as_deref(), Some("7@s.whatsapp.net"));
            }
            Event::Message(_) => panic!("expected participant update"),
        }
    }

    #[test]
    fn test_message_defaults() {
        let json = r#"{
            "type": "message",
            "group_id": "123@g.us",
            "message_id": "ABC",
            "sender_id": "5@s.whatsapp.net"
        }"#;

        let event: Event = serde_json::from_str(json).unwrap();
        let Event::Message(msg) = event else {
            panic!("expected message");
        };
        assert_eq!(msg.content, MessageContent::Text);
        assert_eq!(msg.text(), "");
        assert!(msg.mentions.is_empty());
    }

    #[test]
    fn test_inverse_actions() {
        assert_eq!(AdminActionKind::Remove.inverse(), AdminActionKind::Add);
        assert_eq!(AdminActionKind::Demote.inverse(), AdminActionKind::Promote);
        assert_eq!(AdminActionKind::Add.trust_window(), Duration::hours(48));
        assert_eq!(AdminActionKind::Demote.attempt_threshold(), 3);
    }

    #[test]
    fn test_metadata_roles() {
        let meta = GroupMetadata {
            owner: Some(UserId::new("1@s.whatsapp.net")),
            participants: vec![
                Participant {
                    id: UserId::new("1@s.whatsapp.net"),
                    role: ParticipantRole::Superadmin,
                },
                Participant {
                    id: UserId::new("2@s.whatsapp.net"),
                    role: ParticipantRole::Admin,
                },
                Participant {
                    id: UserId::new("3@s.whatsapp.net"),
                    role: ParticipantRole::Member,
                },
            ],
        };

        assert!(meta.is_owner(&UserId::new("1@s.whatsapp.net")));
        assert!(meta.is_admin(&UserId::new("2@s.whatsapp.net")));
        assert!(!meta.is_admin(&UserId::new("3@s.whatsapp.net")));
        assert_eq!(meta.admins().count(), 2);
    }
}
