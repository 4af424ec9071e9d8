//! Remediation executor.
//!
//! Every externally visible action is an independent, individually fallible
//! step. Steps run in order; a failed step is logged and recorded in the report
//! and the next step still runs. Nothing here returns an error to the caller.

use crate::error::{GuardError, Result};
use crate::gateway::MessagingGateway;
use crate::models::{AdminActionKind, GroupId, GroupMetadata, UserId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationStep {
    DeleteMessage { message_id: String, sender: UserId },
    Kick(Vec<UserId>),
    Demote(Vec<UserId>),
    RePromote(Vec<UserId>),
    ReAdd(Vec<UserId>),
    LockGroup,
    PostNotice { text: String, mentions: Vec<UserId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    DeleteMessage,
    Kick,
    Demote,
    RePromote,
    ReAdd,
    LockGroup,
    PostNotice,
}

impl RemediationStep {
    pub fn kind(&self) -> StepKind {
        match self {
            RemediationStep::DeleteMessage { .. } => StepKind::DeleteMessage,
            RemediationStep::Kick(_) => StepKind::Kick,
            RemediationStep::Demote(_) => StepKind::Demote,
            RemediationStep::RePromote(_) => StepKind::RePromote,
            RemediationStep::ReAdd(_) => StepKind::ReAdd,
            RemediationStep::LockGroup => StepKind::LockGroup,
            RemediationStep::PostNotice { .. } => StepKind::PostNotice,
        }
    }

    pub fn notice(text: impl Into<String>, mentions: Vec<UserId>) -> Self {
        RemediationStep::PostNotice {
            text: text.into(),
            mentions,
        }
    }
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::DeleteMessage => "delete_message",
            StepKind::Kick => "kick_participant",
            StepKind::Demote => "demote_participant",
            StepKind::RePromote => "re_promote_participant",
            StepKind::ReAdd => "re_add_participant",
            StepKind::LockGroup => "lock_group",
            StepKind::PostNotice => "post_notice",
        }
    }

    /// Steps that change group state; paced apart from one another
    pub fn is_destructive(&self) -> bool {
        !matches!(self, StepKind::PostNotice)
    }

    /// Steps whose failure is reported to the group: punishments and the
    /// reversals of unauthorized admin actions
    pub fn reports_failure(&self) -> bool {
        !matches!(self, StepKind::DeleteMessage | StepKind::PostNotice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: StepKind,
    pub outcome: StepOutcome,
}

/// What happened to each step of a remediation plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationReport {
    pub steps: Vec<StepReport>,
    pub failure_notice_posted: bool,
}

impl RemediationReport {
    /// True when at least one step of this kind ran and none of them failed
    pub fn succeeded(&self, kind: StepKind) -> bool {
        let mut matching = self.steps.iter().filter(|s| s.step == kind).peekable();
        matching.peek().is_some() && matching.all(|s| s.outcome == StepOutcome::Done)
    }

    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
            .count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures() == 0
    }
}

/// Bound a gateway call; an elapsed timer is reported as a failure, never retried.
pub async fn bounded<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(GuardError::GatewayTimeout(duration)),
    }
}

pub struct RemediationExecutor {
    gateway: Arc<dyn MessagingGateway>,
    call_timeout: Duration,
    pacing: Duration,
}

impl RemediationExecutor {
    pub fn new(gateway: Arc<dyn MessagingGateway>, call_timeout: Duration, pacing: Duration) -> Self {
        Self {
            gateway,
            call_timeout,
            pacing,
        }
    }

    /// Group roster, or `None` when the gateway cannot provide it in time
    pub async fn group_metadata(&self, group: &GroupId) -> Option<GroupMetadata> {
        match bounded(self.call_timeout, self.gateway.group_metadata(group)).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(group_id = %group, error = %e, "Group metadata unavailable");
                None
            }
        }
    }

    /// Run the plan in order. A failed membership or lock step triggers one
    /// plain-language notice per plan.
    pub async fn execute(&self, group: &GroupId, steps: Vec<RemediationStep>) -> RemediationReport {
        let mut report = RemediationReport::default();
        let mut destructive_ran = false;

        for step in steps {
            let kind = step.kind();

            if kind.is_destructive() {
                if destructive_ran && !self.pacing.is_zero() {
                    tokio::time::sleep(self.pacing).await;
                }
                destructive_ran = true;
            }

            let outcome = match self.run_step(group, &step).await {
                Ok(()) => StepOutcome::Done,
                Err(e) => {
                    let failure = GuardError::RemediationFailed {
                        action: kind.as_str().to_string(),
                        reason: e.to_string(),
                    };
                    tracing::warn!(
                        group_id = %group,
                        error = %failure,
                        "Remediation step failed, continuing"
                    );

                    if kind.reports_failure() && !report.failure_notice_posted {
                        report.failure_notice_posted = true;
                        self.post_failure_notice(group, &e).await;
                    }

                    StepOutcome::Failed(failure.to_string())
                }
            };

            report.steps.push(StepReport {
                step: kind,
                outcome,
            });
        }

        report
    }

    async fn run_step(&self, group: &GroupId, step: &RemediationStep) -> Result<()> {
        let gateway = &self.gateway;
        let call = async {
            match step {
                RemediationStep::DeleteMessage { message_id, sender } => {
                    gateway.delete_message(group, message_id, sender).await
                }
                RemediationStep::Kick(users) => {
                    gateway
                        .update_participants(group, users, AdminActionKind::Remove)
                        .await
                }
                RemediationStep::Demote(users) => {
                    gateway
                        .update_participants(group, users, AdminActionKind::Demote)
                        .await
                }
                RemediationStep::RePromote(users) => {
                    gateway
                        .update_participants(group, users, AdminActionKind::Promote)
                        .await
                }
                RemediationStep::ReAdd(users) => {
                    gateway
                        .update_participants(group, users, AdminActionKind::Add)
                        .await
                }
                RemediationStep::LockGroup => gateway.set_group_restricted(group, true).await,
                RemediationStep::PostNotice { text, mentions } => {
                    gateway.send_text(group, text, mentions).await
                }
            }
        };

        bounded(self.call_timeout, call).await
    }

    async fn post_failure_notice(&self, group: &GroupId, error: &GuardError) {
        let notice = bounded(
            self.call_timeout,
            self.gateway.send_text(group, error.user_notice(), &[]),
        )
        .await;

        if let Err(e) = notice {
            tracing::error!(group_id = %group, error = %e, "Failure notice could not be posted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockMessagingGateway;
    use mockall::predicate::eq;

    fn group() -> GroupId {
        GroupId::new("g@g.us")
    }

    fn user() -> UserId {
        UserId::new("u@s.whatsapp.net")
    }

    fn executor(mock: MockMessagingGateway) -> RemediationExecutor {
        RemediationExecutor::new(Arc::new(mock), Duration::from_secs(1), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_stop_notice() {
        let mut mock = MockMessagingGateway::new();
        mock.expect_delete_message()
            .times(1)
            .returning(|_, _, _| Err(GuardError::Gateway("403".into())));
        mock.expect_send_text()
            .withf(|_, text, _| text == "warning 1/4")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let report = executor(mock)
            .execute(
                &group(),
                vec![
                    RemediationStep::DeleteMessage {
                        message_id: "M1".into(),
                        sender: user(),
                    },
                    RemediationStep::notice("warning 1/4", vec![user()]),
                ],
            )
            .await;

        assert_eq!(report.failures(), 1);
        assert!(report.succeeded(StepKind::PostNotice));
        assert!(!report.succeeded(StepKind::DeleteMessage));
        assert!(!report.failure_notice_posted);
    }

    #[tokio::test]
    async fn test_failed_kick_posts_one_failure_notice() {
        let mut mock = MockMessagingGateway::new();
        mock.expect_update_participants()
            .with(eq(group()), eq(vec![user()]), eq(AdminActionKind::Remove))
            .times(1)
            .returning(|_, _, _| Err(GuardError::Gateway("not-authorized".into())));
        mock.expect_set_group_restricted()
            .times(1)
            .returning(|_, _| Err(GuardError::Gateway("not-authorized".into())));
        mock.expect_send_text()
            .withf(|_, text, _| text.contains("lacks permission"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let report = executor(mock)
            .execute(
                &group(),
                vec![RemediationStep::Kick(vec![user()]), RemediationStep::LockGroup],
            )
            .await;

        assert_eq!(report.failures(), 2);
        assert!(report.failure_notice_posted);
        assert!(!report.succeeded(StepKind::Kick));
    }

    #[tokio::test]
    async fn test_failed_revert_is_reported() {
        let mut mock = MockMessagingGateway::new();
        mock.expect_update_participants()
            .with(eq(group()), eq(vec![user()]), eq(AdminActionKind::Promote))
            .times(1)
            .returning(|_, _, _| Err(GuardError::Gateway("not-authorized".into())));
        mock.expect_send_text()
            .withf(|_, text, _| text.contains("lacks permission"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let report = executor(mock)
            .execute(&group(), vec![RemediationStep::RePromote(vec![user()])])
            .await;

        assert!(report.failure_notice_posted);
        assert_eq!(
            report.steps[0].outcome,
            StepOutcome::Failed(
                "Remediation failed: re_promote_participant: Gateway rejected request: not-authorized"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let mut mock = MockMessagingGateway::new();
        mock.expect_update_participants()
            .with(eq(group()), eq(vec![user()]), eq(AdminActionKind::Add))
            .times(1)
            .returning(|_, _, _| Ok(()));
        mock.expect_send_text().times(1).returning(|_, _, _| Ok(()));

        let report = executor(mock)
            .execute(
                &group(),
                vec![
                    RemediationStep::ReAdd(vec![user()]),
                    RemediationStep::notice("restored", vec![]),
                ],
            )
            .await;

        assert!(report.all_succeeded());
        assert!(report.succeeded(StepKind::ReAdd));
        assert!(!report.succeeded(StepKind::Kick));
    }

    #[tokio::test]
    async fn test_bounded_reports_timeout() {
        let result: Result<()> =
            bounded(Duration::from_millis(10), std::future::pending()).await;
        assert!(matches!(result, Err(GuardError::GatewayTimeout(_))));
    }
}
