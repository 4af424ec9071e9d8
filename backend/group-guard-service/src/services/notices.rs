//! Plain-language group notices. Users are tagged by handle and passed as mentions.

use crate::models::{AdminActionKind, UserId, ViolationKind};

pub fn warning(user: &UserId, kind: ViolationKind, count: u32, threshold: u32) -> String {
    let mut text = format!(
        "@{}, {} is not allowed in this group. Warning {}/{}.",
        user.handle(),
        kind.describe(),
        count,
        threshold
    );
    if count + 1 == threshold {
        text.push_str(" One more and you will be removed.");
    }
    text
}

/// Shown when the warning could not be counted; the message is still removed
pub fn warning_uncounted(user: &UserId, kind: ViolationKind) -> String {
    format!(
        "@{}, {} is not allowed in this group. Your message was removed.",
        user.handle(),
        kind.describe()
    )
}

pub fn kicked(user: &UserId, kind: ViolationKind, threshold: u32) -> String {
    format!(
        "@{} reached {} warnings for {} and has been removed from the group.",
        user.handle(),
        threshold,
        kind.describe()
    )
}

pub fn attempt(
    actor: &UserId,
    action: AdminActionKind,
    count: u32,
    threshold: u32,
    consequence: &str,
) -> String {
    format!(
        "@{}, new admins may not {} members yet. The change was reverted. Attempt {}/{}; at {} you will be {}.",
        actor.handle(),
        action,
        count,
        threshold,
        threshold,
        consequence
    )
}

pub fn escalated(actor: &UserId, action: AdminActionKind, consequence: &str) -> String {
    format!(
        "@{} repeatedly tried to {} members without permission and has been {}. The group is now limited to admins.",
        actor.handle(),
        action,
        consequence
    )
}

pub fn emergency(actor: &UserId, owner: &UserId, action: AdminActionKind) -> String {
    format!(
        "CRITICAL: @{} tried to {} the bot owner @{}. The group has been locked and @{} removed.",
        actor.handle(),
        action,
        owner.handle(),
        actor.handle()
    )
}
