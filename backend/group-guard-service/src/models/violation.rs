//! Content violations, the warning ledger records and the audit trail.

use super::identity::{GroupId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Default warning count at which a content violation escalates to a kick
pub const DEFAULT_WARNING_THRESHOLD: u32 = 4;

/// Allowed thresholds for content violations
pub const CONTENT_THRESHOLD_RANGE: RangeInclusive<u32> = 3..=10;

/// Allowed thresholds for targeted mechanisms
pub const TARGETED_THRESHOLD_RANGE: RangeInclusive<u32> = 2..=5;

/// Severity recorded for emergency responses in place of a warning number
pub const EMERGENCY_SEVERITY: u32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    Link,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    GroupMention,
    ExcessiveTag,
    TagAdmin,
    Bot,
    Virtex,
    Manual,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 12] = [
        ViolationKind::Link,
        ViolationKind::Image,
        ViolationKind::Video,
        ViolationKind::Audio,
        ViolationKind::Document,
        ViolationKind::Sticker,
        ViolationKind::GroupMention,
        ViolationKind::ExcessiveTag,
        ViolationKind::TagAdmin,
        ViolationKind::Bot,
        ViolationKind::Virtex,
        ViolationKind::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Link => "link",
            ViolationKind::Image => "image",
            ViolationKind::Video => "video",
            ViolationKind::Audio => "audio",
            ViolationKind::Document => "document",
            ViolationKind::Sticker => "sticker",
            ViolationKind::GroupMention => "groupMention",
            ViolationKind::ExcessiveTag => "excessiveTag",
            ViolationKind::TagAdmin => "tagAdmin",
            ViolationKind::Bot => "bot",
            ViolationKind::Virtex => "virtex",
            ViolationKind::Manual => "manual",
        }
    }

    /// Mechanisms aimed at specific people rather than at the group's content
    pub fn is_targeted(&self) -> bool {
        matches!(self, ViolationKind::Virtex | ViolationKind::TagAdmin)
    }

    /// Range a configured threshold is clamped into
    pub fn threshold_range(&self) -> RangeInclusive<u32> {
        if self.is_targeted() {
            TARGETED_THRESHOLD_RANGE
        } else {
            CONTENT_THRESHOLD_RANGE
        }
    }

    /// Clamp a configured threshold into the range allowed for this kind
    pub fn clamp_threshold(&self, threshold: u32) -> u32 {
        let range = self.threshold_range();
        threshold.clamp(*range.start(), *range.end())
    }

    /// Human wording used in notices
    pub fn describe(&self) -> &'static str {
        match self {
            ViolationKind::Link => "sending links",
            ViolationKind::Image => "sending images",
            ViolationKind::Video => "sending videos",
            ViolationKind::Audio => "sending audio",
            ViolationKind::Document => "sending documents",
            ViolationKind::Sticker => "sending stickers",
            ViolationKind::GroupMention => "mentioning other groups",
            ViolationKind::ExcessiveTag => "tagging too many members",
            ViolationKind::TagAdmin => "tagging admins",
            ViolationKind::Bot => "running a bot",
            ViolationKind::Virtex => "sending crash text",
            ViolationKind::Manual => "breaking the group rules",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ViolationKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown violation kind: {}", s))
    }
}

/// A detected content-policy breach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub group_id: GroupId,
    pub actor_id: UserId,
    pub target_id: Option<UserId>,
    pub evidence: String,
    pub message_id: Option<String>,
}

/// Durable per-(group, user, kind) warning counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRecord {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub kind: ViolationKind,
    pub count: u32,
    pub last_reason: Option<String>,
    pub last_warning_at: Option<DateTime<Utc>>,
}

/// Result of recording a warning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningOutcome {
    pub count: u32,
    /// False when the store could not be reached and `count` is an assumed value
    pub recorded: bool,
}

impl WarningOutcome {
    pub fn recorded(count: u32) -> Self {
        Self {
            count,
            recorded: true,
        }
    }

    pub fn assumed() -> Self {
        Self {
            count: 1,
            recorded: false,
        }
    }
}

/// Which counters a reset applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    Kind(ViolationKind),
    All,
}

impl ResetScope {
    pub fn matches(&self, kind: ViolationKind) -> bool {
        match self {
            ResetScope::Kind(k) => *k == kind,
            ResetScope::All => true,
        }
    }
}

impl FromStr for ResetScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(ResetScope::All)
        } else {
            s.parse().map(ResetScope::Kind)
        }
    }
}

/// Aggregated warnings for one group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningStats {
    pub total_warnings: u64,
    pub users_warned: u64,
    pub by_kind: Vec<(ViolationKind, u64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    Warning,
    Kick,
    Demote,
    EmergencyLock,
}

impl ActionTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTaken::Warning => "warning",
            ActionTaken::Kick => "kick",
            ActionTaken::Demote => "demote",
            ActionTaken::EmergencyLock => "emergency_lock",
        }
    }
}

/// Append-only audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationAuditEntry {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub kind: ViolationKind,
    pub evidence: String,
    pub action_taken: ActionTaken,
    pub warning_number: u32,
    pub message_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ViolationAuditEntry {
    pub fn new(
        violation: &Violation,
        action_taken: ActionTaken,
        warning_number: u32,
    ) -> Self {
        Self {
            group_id: violation.group_id.clone(),
            user_id: violation.actor_id.clone(),
            kind: violation.kind,
            evidence: violation.evidence.clone(),
            action_taken,
            warning_number,
            message_id: violation.message_id.clone(),
            timestamp: Utc::now(),
        }
    }
}
