use crate::models::{ParticipantEvent, UserId};

/// Resolve who performed a membership change.
///
/// Candidates are tried in order: `actor`, `author`, `origin`. Blank values are
/// skipped and device suffixes are stripped. `None` means the change cannot be
/// attributed and must not be acted upon.
pub fn resolve_actor(event: &ParticipantEvent) -> Option<UserId> {
    [
        event.actor.as_deref(),
        event.author.as_deref(),
        event.origin.as_deref(),
    ]
    .into_iter()
    .find_map(UserId::parse_optional)
}
