//! Admin-action guard.
//!
//! Each membership change moves through
//! RECEIVED → ATTRIBUTED → EVALUATED → {ALLOWED | COMPENSATED | ESCALATED},
//! with a separate emergency path when the configured bot owner is removed or
//! demoted. Decisions are taken under the attempt tracker's per-key lock; the
//! gateway calls happen afterwards, outside any lock.

use super::attempts::{AttemptDecision, AttemptKey, AttemptTracker};
use super::attribution::resolve_actor;
use super::trust::TrustWindows;
use crate::db::ModerationStore;
use crate::error::GuardError;
use crate::models::{
    ActionTaken, AdminActionKind, GroupId, ParticipantEvent, UserId, ViolationAuditEntry,
    ViolationKind, EMERGENCY_SEVERITY,
};
use crate::services::notices;
use crate::services::{RemediationExecutor, RemediationStep};
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct GuardSettings {
    /// The engine's own account
    pub bot_id: UserId,
    /// Account whose removal or demotion triggers the emergency response
    pub bot_owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    NoParticipants,
    OwnerOrBot,
    SelfInitiated,
    TrustedAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// No actor could be resolved; nothing was done
    Unattributed,
    Allowed(AllowReason),
    Compensated {
        actor: UserId,
        attempt: u32,
        threshold: u32,
    },
    Escalated {
        actor: UserId,
        attempts: u32,
    },
    Emergency {
        actor: UserId,
    },
}

struct Punishment {
    steps: Vec<RemediationStep>,
    consequence: &'static str,
    action_taken: ActionTaken,
}

fn punishment_for(action: AdminActionKind, actor: &UserId) -> Punishment {
    let actor = vec![actor.clone()];
    match action {
        AdminActionKind::Remove | AdminActionKind::Add => Punishment {
            steps: vec![RemediationStep::Kick(actor)],
            consequence: "removed",
            action_taken: ActionTaken::Kick,
        },
        AdminActionKind::Demote => Punishment {
            steps: vec![
                RemediationStep::Demote(actor.clone()),
                RemediationStep::Kick(actor),
            ],
            consequence: "demoted and removed",
            action_taken: ActionTaken::Kick,
        },
        AdminActionKind::Promote => Punishment {
            steps: vec![RemediationStep::Demote(actor)],
            consequence: "demoted",
            action_taken: ActionTaken::Demote,
        },
    }
}

/// The step that reverses `action` for the affected members
fn compensation_for(action: AdminActionKind, targets: Vec<UserId>) -> RemediationStep {
    match action {
        AdminActionKind::Remove => RemediationStep::ReAdd(targets),
        AdminActionKind::Demote => RemediationStep::RePromote(targets),
        AdminActionKind::Add => RemediationStep::Kick(targets),
        AdminActionKind::Promote => RemediationStep::Demote(targets),
    }
}

pub struct AdminActionGuard {
    settings: GuardSettings,
    trust: Arc<TrustWindows>,
    attempts: Arc<AttemptTracker>,
    executor: Arc<RemediationExecutor>,
    store: Arc<dyn ModerationStore>,
}

impl AdminActionGuard {
    pub fn new(
        settings: GuardSettings,
        trust: Arc<TrustWindows>,
        attempts: Arc<AttemptTracker>,
        executor: Arc<RemediationExecutor>,
        store: Arc<dyn ModerationStore>,
    ) -> Self {
        Self {
            settings,
            trust,
            attempts,
            executor,
            store,
        }
    }

    pub async fn handle(&self, event: &ParticipantEvent) -> GuardDecision {
        let group = &event.group_id;
        let action = event.action;

        let Some(actor) = resolve_actor(event) else {
            tracing::warn!(
                group_id = %group,
                affected = event.participants.len(),
                "{}",
                GuardError::AttributionUnknown(action.to_string())
            );
            return GuardDecision::Unattributed;
        };

        if event.participants.is_empty() {
            return GuardDecision::Allowed(AllowReason::NoParticipants);
        }

        let metadata = self.executor.group_metadata(group).await;
        let is_group_owner = metadata
            .as_ref()
            .map(|m| m.is_owner(&actor))
            .unwrap_or(false);

        if actor == self.settings.bot_id
            || is_group_owner
            || self.settings.bot_owner_id.as_ref() == Some(&actor)
        {
            self.track_allowed(event, &actor).await;
            return GuardDecision::Allowed(AllowReason::OwnerOrBot);
        }

        if event.participants.len() == 1 && event.participants[0] == actor {
            return GuardDecision::Allowed(AllowReason::SelfInitiated);
        }

        if matches!(action, AdminActionKind::Remove | AdminActionKind::Demote) {
            if let Some(owner) = self.settings.bot_owner_id.clone() {
                if event.participants.contains(&owner) {
                    return self.emergency(group, &actor, &owner, action).await;
                }
            }
        }

        if self
            .trust
            .is_trusted(group, &actor, action.trust_window())
            .await
        {
            self.track_allowed(event, &actor).await;
            return GuardDecision::Allowed(AllowReason::TrustedAdmin);
        }

        self.compensate(event, actor).await
    }

    /// Keep the trust windows in step with changes we let through
    async fn track_allowed(&self, event: &ParticipantEvent, actor: &UserId) {
        match event.action {
            // The bot only promotes to restore a demoted admin; their tenure stands.
            AdminActionKind::Promote if *actor == self.settings.bot_id => {}
            AdminActionKind::Promote => {
                for user in &event.participants {
                    self.trust
                        .record_promotion(&event.group_id, user, Some(actor))
                        .await;
                }
            }
            AdminActionKind::Demote => {
                for user in &event.participants {
                    self.trust.forget(&event.group_id, user).await;
                }
            }
            AdminActionKind::Add | AdminActionKind::Remove => {}
        }
    }

    async fn compensate(&self, event: &ParticipantEvent, actor: UserId) -> GuardDecision {
        let group = &event.group_id;
        let action = event.action;
        let threshold = action.attempt_threshold();
        let targets: Vec<UserId> = event
            .participants
            .iter()
            .filter(|p| **p != actor)
            .cloned()
            .collect();

        // Counted whether or not the compensation below succeeds.
        let key = AttemptKey::new(group.clone(), actor.clone(), action);
        let decision = match self.attempts.record_attempt(&key, threshold).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(
                    group_id = %group,
                    actor = %actor,
                    error = %e,
                    "Attempt counter unavailable, compensating without escalation"
                );
                AttemptDecision {
                    count: 1,
                    threshold,
                    escalate: false,
                }
            }
        };

        let mut steps = Vec::new();
        if !targets.is_empty() {
            steps.push(compensation_for(action, targets.clone()));
        }

        if !decision.escalate {
            let punishment = punishment_for(action, &actor);
            steps.push(RemediationStep::notice(
                notices::attempt(
                    &actor,
                    action,
                    decision.count,
                    threshold,
                    punishment.consequence,
                ),
                vec![actor.clone()],
            ));

            let report = self.executor.execute(group, steps).await;
            tracing::info!(
                group_id = %group,
                actor = %actor,
                action = %action,
                attempt = decision.count,
                threshold = threshold,
                failures = report.failures(),
                "Unauthorized admin action compensated"
            );

            return GuardDecision::Compensated {
                actor,
                attempt: decision.count,
                threshold,
            };
        }

        let punishment = punishment_for(action, &actor);
        steps.extend(punishment.steps);
        steps.push(RemediationStep::LockGroup);
        steps.push(RemediationStep::notice(
            notices::escalated(&actor, action, punishment.consequence),
            vec![actor.clone()],
        ));

        let report = self.executor.execute(group, steps).await;
        tracing::warn!(
            group_id = %group,
            actor = %actor,
            action = %action,
            attempts = decision.count,
            failures = report.failures(),
            "Unauthorized admin action escalated, group locked"
        );

        if matches!(action, AdminActionKind::Promote | AdminActionKind::Demote) {
            self.trust.forget(group, &actor).await;
        }

        self.audit(ViolationAuditEntry {
            group_id: group.clone(),
            user_id: actor.clone(),
            kind: ViolationKind::Manual,
            evidence: format!(
                "unauthorized {} of {} member(s) after {} attempts",
                action,
                targets.len(),
                decision.count
            ),
            action_taken: punishment.action_taken,
            warning_number: decision.count,
            message_id: None,
            timestamp: Utc::now(),
        })
        .await;

        GuardDecision::Escalated {
            actor,
            attempts: decision.count,
        }
    }

    async fn emergency(
        &self,
        group: &GroupId,
        actor: &UserId,
        owner: &UserId,
        action: AdminActionKind,
    ) -> GuardDecision {
        tracing::error!(
            group_id = %group,
            actor = %actor,
            "{}",
            GuardError::EmergencyCondition(format!("bot owner affected by {}", action))
        );

        let steps = vec![
            RemediationStep::notice(
                notices::emergency(actor, owner, action),
                vec![actor.clone(), owner.clone()],
            ),
            RemediationStep::LockGroup,
            RemediationStep::Kick(vec![actor.clone()]),
        ];
        let report = self.executor.execute(group, steps).await;
        tracing::warn!(
            group_id = %group,
            actor = %actor,
            failures = report.failures(),
            "Emergency response executed"
        );

        self.audit(ViolationAuditEntry {
            group_id: group.clone(),
            user_id: actor.clone(),
            kind: ViolationKind::Manual,
            evidence: format!("{} of bot owner {}", action, owner),
            action_taken: ActionTaken::EmergencyLock,
            warning_number: EMERGENCY_SEVERITY,
            message_id: None,
            timestamp: Utc::now(),
        })
        .await;

        GuardDecision::Emergency {
            actor: actor.clone(),
        }
    }

    async fn audit(&self, entry: ViolationAuditEntry) {
        if let Err(e) = self.store.log_violation(&entry).await {
            tracing::warn!(
                group_id = %entry.group_id,
                user_id = %entry.user_id,
                error = %e,
                "Audit entry could not be written"
            );
        }
    }
}
