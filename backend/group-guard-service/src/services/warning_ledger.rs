//! Warning ledger: the authority for "warn vs. kick".

use crate::db::ModerationStore;
use crate::error::Result;
use crate::models::{GroupId, ResetScope, UserId, ViolationKind, WarningOutcome, WarningStats};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type LedgerKey = (GroupId, UserId, ViolationKind);

/// Outcome of recording a warning against a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerDecision {
    pub count: u32,
    pub threshold: u32,
    pub recorded: bool,
    pub escalate: bool,
}

pub struct WarningLedger {
    store: Arc<dyn ModerationStore>,
    key_locks: DashMap<LedgerKey, Arc<Mutex<()>>>,
}

impl WarningLedger {
    pub fn new(store: Arc<dyn ModerationStore>) -> Self {
        Self {
            store,
            key_locks: DashMap::new(),
        }
    }

    /// `count >= threshold`
    pub fn should_escalate(count: u32, threshold: u32) -> bool {
        count >= threshold
    }

    fn key_lock(&self, key: &LedgerKey) -> Arc<Mutex<()>> {
        self.key_locks.entry(key.clone()).or_default().clone()
    }

    /// Drop the key's lock once no caller holds or waits on it
    fn release_key_lock(&self, key: &LedgerKey, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.key_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Increment the counter for the key.
    ///
    /// Calls for the same key are serialised here and the store increments in a
    /// single statement, so no increment is lost. When the store cannot be
    /// reached the outcome carries an assumed count of 1 and `recorded == false`.
    pub async fn add_warning(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
        reason: &str,
    ) -> WarningOutcome {
        let key = (group_id.clone(), user_id.clone(), kind);
        let lock = self.key_lock(&key);
        let stored = {
            let _guard = lock.lock().await;
            self.store.add_warning(group_id, user_id, kind, reason).await
        };
        self.release_key_lock(&key, lock);

        match stored {
            Ok(count) => WarningOutcome::recorded(count),
            Err(e) => {
                tracing::error!(
                    group_id = %group_id,
                    user_id = %user_id,
                    kind = %kind,
                    error = %e,
                    "Warning could not be recorded, assuming first warning"
                );
                WarningOutcome::assumed()
            }
        }
    }

    /// Record a warning and compare it with the kind-clamped threshold.
    ///
    /// Escalation is never decided on an assumed count.
    pub async fn record_and_decide(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
        reason: &str,
        configured_threshold: u32,
    ) -> LedgerDecision {
        let threshold = kind.clamp_threshold(configured_threshold);
        let outcome = self.add_warning(group_id, user_id, kind, reason).await;

        LedgerDecision {
            count: outcome.count,
            threshold,
            recorded: outcome.recorded,
            escalate: outcome.recorded && Self::should_escalate(outcome.count, threshold),
        }
    }

    pub async fn get_warning_count(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
    ) -> Result<u32> {
        self.store.get_warning_count(group_id, user_id, kind).await
    }

    /// Zero the matching counters; resetting an already-zero key returns 0.
    pub async fn reset_warnings(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        scope: ResetScope,
    ) -> Result<u64> {
        match scope {
            ResetScope::Kind(kind) => {
                let key = (group_id.clone(), user_id.clone(), kind);
                let lock = self.key_lock(&key);
                let reset = {
                    let _guard = lock.lock().await;
                    self.store.reset_warnings(group_id, user_id, scope).await
                };
                self.release_key_lock(&key, lock);
                reset
            }
            ResetScope::All => self.store.reset_warnings(group_id, user_id, scope).await,
        }
    }

    pub async fn warning_stats(&self, group_id: &GroupId) -> Result<WarningStats> {
        self.store.get_warning_stats(group_id).await
    }
}
