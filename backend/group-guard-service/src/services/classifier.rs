use crate::error::GuardError;
use crate::models::{
    ContentEvent, GroupMetadata, MessageContent, UserId, Violation, ViolationKind,
};
use crate::policy::PolicySource;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Texts longer than this are treated as crash text
pub const VIRTEX_MAX_CHARS: usize = 10_000;

/// A single grapheme stacking more code points than this is treated as crash text
pub const VIRTEX_MAX_GRAPHEME_LEN: usize = 50;

/// Invisible/bidi control characters tolerated before a message is treated as crash text
pub const VIRTEX_MAX_INVISIBLE: usize = 1_000;

const EVIDENCE_MAX_CHARS: usize = 200;

static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:https?://|www\.)\S+|chat\.whatsapp\.com/\S+|wa\.me/\S+")
        .expect("Link regex pattern is valid")
});

/// Everything the classifier reads besides the event itself
pub struct ClassifyContext<'a> {
    pub policy: &'a dyn PolicySource,
    pub bot_id: &'a UserId,
    /// Group roster when it could be fetched; without it nobody is exempt and
    /// admin tagging cannot be detected
    pub metadata: Option<&'a GroupMetadata>,
}

/// Turns group messages into typed violations.
///
/// Detectors run in a fixed order and the first enabled match wins:
/// bot, virtex, media (image, video, audio, document, sticker), group mention,
/// admin tag, excessive tag, link. Media precedes link so that a captioned
/// image is governed by the media rule. Anything else is not a violation.
#[derive(Default)]
pub struct Classifier;

impl Classifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, event: &ContentEvent, ctx: &ClassifyContext<'_>) -> Option<Violation> {
        if self.is_exempt(event, ctx) {
            return None;
        }

        let group = &event.group_id;
        let enabled = |kind: ViolationKind| ctx.policy.is_enabled(group, kind);
        let text = event.text();

        if enabled(ViolationKind::Bot) && looks_like_bot_message_id(&event.message_id) {
            tracing::debug!(message_id = %event.message_id, "Bot-shaped message id");
            return Some(self.violation(
                event,
                ViolationKind::Bot,
                format!("message id {}", event.message_id),
                None,
            ));
        }

        if enabled(ViolationKind::Virtex) {
            if let Some(evidence) = virtex_evidence(text) {
                tracing::debug!(group_id = %group, "Crash text detected");
                return Some(self.violation(event, ViolationKind::Virtex, evidence, None));
            }
        }

        if let Some(kind) = media_kind(event.content) {
            if enabled(kind) {
                return Some(self.violation(
                    event,
                    kind,
                    format!("{} message", kind),
                    None,
                ));
            }
        }

        if enabled(ViolationKind::GroupMention) {
            if let Some(mentioned) = event.group_mentions.first() {
                return Some(self.violation(
                    event,
                    ViolationKind::GroupMention,
                    format!("mentioned group {}", mentioned),
                    None,
                ));
            }
        }

        if enabled(ViolationKind::TagAdmin) {
            match ctx.metadata {
                Some(meta) => {
                    if let Some(admin) = event.mentions.iter().find(|m| meta.is_admin(m)) {
                        return Some(self.violation(
                            event,
                            ViolationKind::TagAdmin,
                            format!("tagged admin {}", admin.handle()),
                            Some(admin.clone()),
                        ));
                    }
                }
                None if !event.mentions.is_empty() => {
                    tracing::debug!(
                        group_id = %group,
                        message_id = %event.message_id,
                        "{}",
                        GuardError::ClassificationAmbiguous(
                            "mentions without a group roster".to_string()
                        )
                    );
                }
                None => {}
            }
        }

        if enabled(ViolationKind::ExcessiveTag) {
            let distinct: HashSet<&UserId> = event.mentions.iter().collect();
            let limit = ctx.policy.max_mentions(group);
            if limit > 0 && distinct.len() >= limit {
                return Some(self.violation(
                    event,
                    ViolationKind::ExcessiveTag,
                    format!("{} members tagged (limit {})", distinct.len(), limit),
                    None,
                ));
            }
        }

        if enabled(ViolationKind::Link) {
            if let Some(link) = LINK_PATTERN.find(text) {
                return Some(self.violation(
                    event,
                    ViolationKind::Link,
                    truncate(link.as_str()),
                    None,
                ));
            }
        }

        None
    }

    fn is_exempt(&self, event: &ContentEvent, ctx: &ClassifyContext<'_>) -> bool {
        if event.from_me || &event.sender_id == ctx.bot_id {
            return true;
        }
        ctx.metadata
            .map(|meta| meta.is_owner(&event.sender_id) || meta.is_admin(&event.sender_id))
            .unwrap_or(false)
    }

    fn violation(
        &self,
        event: &ContentEvent,
        kind: ViolationKind,
        evidence: String,
        target_id: Option<UserId>,
    ) -> Violation {
        Violation {
            kind,
            group_id: event.group_id.clone(),
            actor_id: event.sender_id.clone(),
            target_id,
            evidence,
            message_id: Some(event.message_id.clone()),
        }
    }
}

fn media_kind(content: MessageContent) -> Option<ViolationKind> {
    match content {
        MessageContent::Image => Some(ViolationKind::Image),
        MessageContent::Video => Some(ViolationKind::Video),
        MessageContent::Audio => Some(ViolationKind::Audio),
        MessageContent::Document => Some(ViolationKind::Document),
        MessageContent::Sticker => Some(ViolationKind::Sticker),
        MessageContent::Text | MessageContent::Other => None,
    }
}

/// Message ids generated by common automation clients rather than official apps
pub fn looks_like_bot_message_id(id: &str) -> bool {
    (id.starts_with("BAE5") && id.len() == 16)
        || (id.starts_with("3EB0") && matches!(id.len(), 12 | 20 | 22))
}

fn is_invisible_control(c: char) -> bool {
    matches!(c,
        '\u{200B}'..='\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2060}'..='\u{2064}'
        | '\u{FEFF}')
}

fn virtex_evidence(text: &str) -> Option<String> {
    let char_count = text.chars().count();
    if char_count > VIRTEX_MAX_CHARS {
        return Some(format!("text length {}", char_count));
    }

    let invisible = text.chars().filter(|c| is_invisible_control(*c)).count();
    if invisible > VIRTEX_MAX_INVISIBLE {
        return Some(format!("{} invisible control characters", invisible));
    }

    text.graphemes(true)
        .map(|g| g.chars().count())
        .max()
        .filter(|&longest| longest > VIRTEX_MAX_GRAPHEME_LEN)
        .map(|longest| format!("grapheme of {} code points", longest))
}

fn truncate(s: &str) -> String {
    s.chars().take(EVIDENCE_MAX_CHARS).collect()
}
