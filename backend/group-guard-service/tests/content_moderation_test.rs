//! Content events end to end: classification, warning ledger, remediation.

mod common;

use common::*;
use futures::future::join_all;
use group_guard_service::models::{
    ActionTaken, AdminActionKind, MessageContent, ResetScope, ViolationKind,
};
use group_guard_service::policy::GroupPolicy;
use group_guard_service::MessageOutcome;
use std::collections::HashSet;

const LINK: &str = "join us https://chat.whatsapp.com/AbCdEf";

#[tokio::test]
async fn test_fourth_link_kicks_and_resets_counter() {
    let h = harness();

    for (i, expected) in (1..=3).enumerate() {
        let outcome = h
            .engine
            .on_message(&text_message(&format!("M{}", i), MEMBER, LINK))
            .await;
        assert_eq!(
            outcome,
            MessageOutcome::Warned {
                kind: ViolationKind::Link,
                count: expected,
                threshold: 4,
                recorded: true,
            }
        );
    }
    assert!(h.gateway.texts()[2].contains("One more and you will be removed"));

    h.gateway.clear();
    let outcome = h.engine.on_message(&text_message("M4", MEMBER, LINK)).await;
    assert_eq!(
        outcome,
        MessageOutcome::Kicked {
            kind: ViolationKind::Link,
            count: 4,
        }
    );

    let calls = h.gateway.calls();
    assert_eq!(
        calls[0],
        GatewayCall::DeleteMessage {
            message_id: "M4".to_string()
        }
    );
    assert_eq!(
        h.gateway.participant_updates(),
        vec![(AdminActionKind::Remove, vec![user(MEMBER)])]
    );

    let record = h
        .store
        .warning_record(&group(), &user(MEMBER), ViolationKind::Link)
        .unwrap();
    assert_eq!(record.count, 0);

    let audit = h.store.audit_entries().await;
    assert_eq!(audit.len(), 4);
    assert_eq!(audit[3].action_taken, ActionTaken::Kick);
    assert_eq!(audit[3].warning_number, 4);
    assert_eq!(audit[3].message_id.as_deref(), Some("M4"));
}

#[tokio::test]
async fn test_failed_kick_keeps_warnings_and_explains() {
    let h = harness();
    h.gateway.reject_participant_updates(true);

    for i in 0..4 {
        h.engine
            .on_message(&text_message(&format!("M{}", i), MEMBER, LINK))
            .await;
    }

    let record = h
        .store
        .warning_record(&group(), &user(MEMBER), ViolationKind::Link)
        .unwrap();
    assert_eq!(record.count, 4);
    let texts = h.gateway.texts();
    assert!(texts.iter().any(|t| t.contains("lacks permission")));
    assert!(!texts.iter().any(|t| t.contains("has been removed")));

    let audit = h.store.audit_entries().await;
    assert_eq!(audit.len(), 4);
    assert!(audit.iter().all(|e| e.action_taken == ActionTaken::Warning));
}

#[tokio::test]
async fn test_storage_unavailable_never_kicks() {
    let h = harness();
    h.store.set_unavailable(true);

    for i in 0..6 {
        let outcome = h
            .engine
            .on_message(&text_message(&format!("M{}", i), MEMBER, LINK))
            .await;
        assert_eq!(
            outcome,
            MessageOutcome::Warned {
                kind: ViolationKind::Link,
                count: 1,
                threshold: 4,
                recorded: false,
            }
        );
    }

    let calls = h.gateway.calls();
    let deletes = calls
        .iter()
        .filter(|c| matches!(c, GatewayCall::DeleteMessage { .. }))
        .count();
    assert_eq!(deletes, 6);
    assert!(h.gateway.participant_updates().is_empty());
    assert!(h
        .gateway
        .texts()
        .iter()
        .all(|t| t.contains("Your message was removed")));
}

#[tokio::test]
async fn test_admins_and_owner_are_exempt() {
    let h = harness();

    assert_eq!(
        h.engine.on_message(&text_message("M1", ADMIN, LINK)).await,
        MessageOutcome::Clean
    );
    assert_eq!(
        h.engine
            .on_message(&text_message("M2", GROUP_OWNER, LINK))
            .await,
        MessageOutcome::Clean
    );
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_own_messages_are_ignored() {
    let h = harness();
    let mut msg = text_message("M1", BOT, LINK);
    msg.from_me = true;

    assert_eq!(h.engine.on_message(&msg).await, MessageOutcome::Clean);
    assert_eq!(h.gateway.metadata_calls(), 0);
}

#[tokio::test]
async fn test_disabled_detector_lets_message_through() {
    let h = harness();
    h.policy.set_group_policy(
        group(),
        GroupPolicy {
            enabled: Some([ViolationKind::Sticker].into_iter().collect()),
            ..GroupPolicy::default()
        },
    );

    assert_eq!(
        h.engine.on_message(&text_message("M1", MEMBER, LINK)).await,
        MessageOutcome::Clean
    );
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_thresholds_differ_per_kind_within_a_group() {
    let h = harness();
    h.policy.set_group_policy(
        group(),
        GroupPolicy {
            thresholds: [(ViolationKind::Link, 3), (ViolationKind::Sticker, 6)]
                .into_iter()
                .collect(),
            ..GroupPolicy::default()
        },
    );

    let sticker = |id: &str| {
        let mut m = text_message(id, MEMBER, "");
        m.content = MessageContent::Sticker;
        m
    };

    let mut last = MessageOutcome::Clean;
    for i in 0..3 {
        h.engine.on_message(&sticker(&format!("S{}", i))).await;
        last = h
            .engine
            .on_message(&text_message(&format!("L{}", i), MEMBER, LINK))
            .await;
    }

    assert_eq!(
        last,
        MessageOutcome::Kicked {
            kind: ViolationKind::Link,
            count: 3,
        }
    );
    let stickers = h
        .store
        .warning_record(&group(), &user(MEMBER), ViolationKind::Sticker)
        .unwrap();
    assert_eq!(stickers.count, 3);
    assert!(h.gateway.texts().iter().any(|t| t.contains("Warning 3/6")));
}

#[tokio::test]
async fn test_concurrent_violations_lose_no_warning() {
    let h = harness();
    h.policy.set_group_policy(
        group(),
        GroupPolicy {
            warning_threshold: Some(10),
            ..GroupPolicy::default()
        },
    );

    let messages: Vec<_> = (0..8)
        .map(|i| text_message(&format!("M{}", i), MEMBER, LINK))
        .collect();
    let outcomes = join_all(messages.iter().map(|m| h.engine.on_message(m))).await;

    let counts: HashSet<u32> = outcomes
        .iter()
        .map(|o| match o {
            MessageOutcome::Warned { count, .. } => *count,
            other => panic!("unexpected outcome {:?}", other),
        })
        .collect();
    assert_eq!(counts, (1..=8).collect());

    let record = h
        .store
        .warning_record(&group(), &user(MEMBER), ViolationKind::Link)
        .unwrap();
    assert_eq!(record.count, 8);
}

#[tokio::test]
async fn test_manual_warnings_escalate_without_deleting() {
    let h = harness();
    let (g, u, admin) = (group(), user(MEMBER), user(ADMIN));

    for expected in 1..=3 {
        let outcome = h
            .engine
            .issue_manual_warning(&g, &u, &admin, "off-topic spam")
            .await;
        assert!(matches!(outcome, MessageOutcome::Warned { count, .. } if count == expected));
    }
    let outcome = h
        .engine
        .issue_manual_warning(&g, &u, &admin, "off-topic spam")
        .await;
    assert_eq!(
        outcome,
        MessageOutcome::Kicked {
            kind: ViolationKind::Manual,
            count: 4,
        }
    );

    assert!(!h
        .gateway
        .calls()
        .iter()
        .any(|c| matches!(c, GatewayCall::DeleteMessage { .. })));
}

#[tokio::test]
async fn test_stats_and_reset_through_engine() {
    let h = harness();
    let sticker = {
        let mut m = text_message("S1", OTHER_MEMBER, "");
        m.content = MessageContent::Sticker;
        m
    };

    h.engine.on_message(&text_message("M1", MEMBER, LINK)).await;
    h.engine.on_message(&text_message("M2", MEMBER, LINK)).await;
    h.engine.on_message(&sticker).await;

    let stats = h.engine.warning_stats(&group()).await.unwrap();
    assert_eq!(stats.total_warnings, 3);
    assert_eq!(stats.users_warned, 2);

    let reset = h
        .engine
        .reset_user_warnings(&group(), &user(MEMBER), ResetScope::All)
        .await
        .unwrap();
    assert_eq!(reset, 1);

    let again = h
        .engine
        .reset_user_warnings(&group(), &user(MEMBER), ResetScope::All)
        .await
        .unwrap();
    assert_eq!(again, 0);

    let stats = h.engine.warning_stats(&group()).await.unwrap();
    assert_eq!(stats.total_warnings, 1);
    assert_eq!(stats.by_kind, vec![(ViolationKind::Sticker, 1)]);
}
