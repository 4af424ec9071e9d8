//! Moderation engine: routes each inbound event to the classifier or the admin
//! guard and turns decisions into remediation plans.
//!
//! Nothing here returns an error to the event runtime. Every failure is logged
//! and degraded at the boundary of the operation that hit it.

use crate::db::ModerationStore;
use crate::error::Result;
use crate::guard::{AdminActionGuard, AttemptTracker, GuardDecision, GuardSettings, TrustWindows};
use crate::models::{
    ActionTaken, ContentEvent, Event, GroupId, ParticipantEvent, ResetScope, UserId, Violation,
    ViolationAuditEntry, ViolationKind, WarningStats,
};
use crate::policy::PolicySource;
use crate::services::notices;
use crate::services::{
    ClassifyContext, Classifier, RemediationExecutor, RemediationStep, StepKind, WarningLedger,
};
use std::sync::Arc;

/// What the engine did with a content event or manual warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Clean,
    Warned {
        kind: ViolationKind,
        count: u32,
        threshold: u32,
        recorded: bool,
    },
    Kicked {
        kind: ViolationKind,
        count: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Message(MessageOutcome),
    Participants(GuardDecision),
}

pub struct ModerationEngine {
    settings: GuardSettings,
    classifier: Classifier,
    policy: Arc<dyn PolicySource>,
    ledger: WarningLedger,
    executor: Arc<RemediationExecutor>,
    guard: AdminActionGuard,
    store: Arc<dyn ModerationStore>,
}

impl ModerationEngine {
    pub fn new(
        settings: GuardSettings,
        store: Arc<dyn ModerationStore>,
        policy: Arc<dyn PolicySource>,
        executor: Arc<RemediationExecutor>,
        attempts: Arc<AttemptTracker>,
    ) -> Self {
        let trust = Arc::new(TrustWindows::new(store.clone()));
        let guard = AdminActionGuard::new(
            settings.clone(),
            trust,
            attempts,
            executor.clone(),
            store.clone(),
        );

        Self {
            settings,
            classifier: Classifier::new(),
            policy,
            ledger: WarningLedger::new(store.clone()),
            executor,
            guard,
            store,
        }
    }

    pub async fn dispatch(&self, event: Event) -> DispatchOutcome {
        match event {
            Event::Message(event) => DispatchOutcome::Message(self.on_message(&event).await),
            Event::ParticipantUpdate(event) => {
                DispatchOutcome::Participants(self.on_participant_update(&event).await)
            }
        }
    }

    pub async fn on_message(&self, event: &ContentEvent) -> MessageOutcome {
        if event.from_me || event.sender_id == self.settings.bot_id {
            return MessageOutcome::Clean;
        }

        let metadata = self.executor.group_metadata(&event.group_id).await;
        let ctx = ClassifyContext {
            policy: self.policy.as_ref(),
            bot_id: &self.settings.bot_id,
            metadata: metadata.as_ref(),
        };

        let Some(violation) = self.classifier.classify(event, &ctx) else {
            return MessageOutcome::Clean;
        };

        tracing::info!(
            group_id = %violation.group_id,
            user_id = %violation.actor_id,
            kind = %violation.kind,
            message_id = %event.message_id,
            "Content violation detected"
        );

        let delete = RemediationStep::DeleteMessage {
            message_id: event.message_id.clone(),
            sender: event.sender_id.clone(),
        };
        self.enforce(violation, vec![delete]).await
    }

    pub async fn on_participant_update(&self, event: &ParticipantEvent) -> GuardDecision {
        let decision = self.guard.handle(event).await;
        tracing::debug!(
            group_id = %event.group_id,
            action = %event.action,
            decision = ?decision,
            "Participant update handled"
        );
        decision
    }

    /// Warn a member on behalf of an admin; counts towards the same threshold
    /// as detected violations but deletes nothing.
    pub async fn issue_manual_warning(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        issued_by: &UserId,
        reason: &str,
    ) -> MessageOutcome {
        let violation = Violation {
            kind: ViolationKind::Manual,
            group_id: group_id.clone(),
            actor_id: user_id.clone(),
            target_id: None,
            evidence: format!("{} (by {})", reason, issued_by.handle()),
            message_id: None,
        };
        self.enforce(violation, Vec::new()).await
    }

    pub async fn reset_user_warnings(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        scope: ResetScope,
    ) -> Result<u64> {
        self.ledger.reset_warnings(group_id, user_id, scope).await
    }

    pub async fn warning_stats(&self, group_id: &GroupId) -> Result<WarningStats> {
        self.ledger.warning_stats(group_id).await
    }

    /// Count the violation and either warn or kick.
    ///
    /// The counter is reset only once the kick went through.
    async fn enforce(
        &self,
        violation: Violation,
        mut steps: Vec<RemediationStep>,
    ) -> MessageOutcome {
        let group = &violation.group_id;
        let user = &violation.actor_id;
        let kind = violation.kind;

        let decision = self
            .ledger
            .record_and_decide(
                group,
                user,
                kind,
                &violation.evidence,
                self.policy.warning_threshold(group, kind),
            )
            .await;

        if decision.escalate {
            steps.push(RemediationStep::Kick(vec![user.clone()]));
            let report = self.executor.execute(group, steps).await;

            if report.succeeded(StepKind::Kick) {
                self.executor
                    .execute(
                        group,
                        vec![RemediationStep::notice(
                            notices::kicked(user, kind, decision.threshold),
                            vec![user.clone()],
                        )],
                    )
                    .await;
                self.audit(ViolationAuditEntry::new(
                    &violation,
                    ActionTaken::Kick,
                    decision.count,
                ))
                .await;

                if let Err(e) = self
                    .ledger
                    .reset_warnings(group, user, ResetScope::Kind(kind))
                    .await
                {
                    tracing::error!(
                        group_id = %group,
                        user_id = %user,
                        kind = %kind,
                        error = %e,
                        "Warnings could not be reset after kick"
                    );
                }
            } else {
                // The executor already told the group why the kick did not happen.
                self.audit(ViolationAuditEntry::new(
                    &violation,
                    ActionTaken::Warning,
                    decision.count,
                ))
                .await;
                tracing::warn!(
                    group_id = %group,
                    user_id = %user,
                    kind = %kind,
                    "Kick failed, warnings left in place"
                );
            }

            tracing::info!(
                group_id = %group,
                user_id = %user,
                kind = %kind,
                count = decision.count,
                "Warning threshold reached"
            );

            return MessageOutcome::Kicked {
                kind,
                count: decision.count,
            };
        }

        let text = if decision.recorded {
            notices::warning(user, kind, decision.count, decision.threshold)
        } else {
            notices::warning_uncounted(user, kind)
        };
        steps.push(RemediationStep::notice(text, vec![user.clone()]));

        self.executor.execute(group, steps).await;
        self.audit(ViolationAuditEntry::new(
            &violation,
            ActionTaken::Warning,
            decision.count,
        ))
        .await;

        MessageOutcome::Warned {
            kind,
            count: decision.count,
            threshold: decision.threshold,
            recorded: decision.recorded,
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
