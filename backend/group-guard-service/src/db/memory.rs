//! In-process store for tests and local runs without Postgres.

use super::ModerationStore;
use crate::error::{GuardError, Result};
use crate::models::{
    GroupId, ResetScope, UserId, ViolationAuditEntry, ViolationKind, WarningRecord, WarningStats,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

type WarningKey = (GroupId, UserId, ViolationKind);

#[derive(Default)]
pub struct InMemoryStore {
    warnings: DashMap<WarningKey, WarningRecord>,
    promotions: DashMap<(GroupId, UserId), DateTime<Utc>>,
    audit: Mutex<Vec<ViolationAuditEntry>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a degraded store: every call fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn audit_entries(&self) -> Vec<ViolationAuditEntry> {
        self.audit.lock().await.clone()
    }

    pub fn warning_record(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
    ) -> Option<WarningRecord> {
        self.warnings
            .get(&(group_id.clone(), user_id.clone(), kind))
            .map(|r| r.clone())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GuardError::StorageUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ModerationStore for InMemoryStore {
    async fn add_warning(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
        reason: &str,
    ) -> Result<u32> {
        self.check_available()?;

        let now = Utc::now();
        let mut record = self
            .warnings
            .entry((group_id.clone(), user_id.clone(), kind))
            .or_insert_with(|| WarningRecord {
                group_id: group_id.clone(),
                user_id: user_id.clone(),
                kind,
                count: 0,
                last_reason: None,
                last_warning_at: None,
            });

        record.count += 1;
        record.last_reason = Some(reason.to_string());
        record.last_warning_at = Some(now);

        Ok(record.count)
    }

    async fn get_warning_count(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
    ) -> Result<u32> {
        self.check_available()?;
        Ok(self
            .warning_record(group_id, user_id, kind)
            .map(|r| r.count)
            .unwrap_or(0))
    }

    async fn reset_warnings(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        scope: ResetScope,
    ) -> Result<u64> {
        self.check_available()?;

        let mut reset = 0;
        for mut entry in self.warnings.iter_mut() {
            let (g, u, kind) = entry.key().clone();
            if &g == group_id && &u == user_id && scope.matches(kind) && entry.count > 0 {
                entry.count = 0;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn get_warning_stats(&self, group_id: &GroupId) -> Result<WarningStats> {
        self.check_available()?;

        let mut by_kind: BTreeMap<ViolationKind, u64> = BTreeMap::new();
        let mut users = HashSet::new();
        for entry in self.warnings.iter() {
            if &entry.group_id == group_id && entry.count > 0 {
                *by_kind.entry(entry.kind).or_default() += u64::from(entry.count);
                users.insert(entry.user_id.clone());
            }
        }

        Ok(WarningStats {
            total_warnings: by_kind.values().sum(),
            users_warned: users.len() as u64,
            by_kind: by_kind.into_iter().collect(),
        })
    }

    async fn log_violation(&self, entry: &ViolationAuditEntry) -> Result<Uuid> {
        self.check_available()?;
        self.audit.lock().await.push(entry.clone());
        Ok(Uuid::new_v4())
    }

    async fn get_promotion_timestamp(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Option<DateTime<Utc>>> {
        self.check_available()?;
        Ok(self
            .promotions
            .get(&(group_id.clone(), user_id.clone()))
            .map(|t| *t))
    }

    async fn log_admin_promotion(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        _promoted_by: Option<&UserId>,
        promoted_at: DateTime<Utc>,
    ) -> Result<()> {
        self.check_available()?;
        self.promotions
            .insert((group_id.clone(), user_id.clone()), promoted_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> (GroupId, UserId) {
        (GroupId::new("g@g.us"), UserId::new("u@s.whatsapp.net"))
    }

    #[tokio::test]
    async fn test_add_and_reset() {
        let store = InMemoryStore::new();
        let (g, u) = key();

        assert_eq!(store.add_warning(&g, &u, ViolationKind::Link, "a").await.unwrap(), 1);
        assert_eq!(store.add_warning(&g, &u, ViolationKind::Link, "b").await.unwrap(), 2);
        assert_eq!(store.add_warning(&g, &u, ViolationKind::Sticker, "c").await.unwrap(), 1);

        let reset = store
            .reset_warnings(&g, &u, ResetScope::Kind(ViolationKind::Link))
            .await
            .unwrap();
        assert_eq!(reset, 1);
        assert_eq!(store.get_warning_count(&g, &u, ViolationKind::Link).await.unwrap(), 0);
        assert_eq!(store.get_warning_count(&g, &u, ViolationKind::Sticker).await.unwrap(), 1);

        let record = store.warning_record(&g, &u, ViolationKind::Link).unwrap();
        assert_eq!(record.last_reason.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemoryStore::new();
        let (g, u) = key();
        let other = UserId::new("v@s.whatsapp.net");

        store.add_warning(&g, &u, ViolationKind::Link, "x").await.unwrap();
        store.add_warning(&g, &u, ViolationKind::Link, "x").await.unwrap();
        store.add_warning(&g, &other, ViolationKind::Image, "x").await.unwrap();

        let stats = store.get_warning_stats(&g).await.unwrap();
        assert_eq!(stats.total_warnings, 3);
        assert_eq!(stats.users_warned, 2);
        assert!(stats.by_kind.contains(&(ViolationKind::Link, 2)));
        assert!(stats.by_kind.contains(&(ViolationKind::Image, 1)));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = InMemoryStore::new();
        let (g, u) = key();
        store.set_unavailable(true);

        let err = store
            .add_warning(&g, &u, ViolationKind::Link, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::StorageUnavailable(_)));
    }
}
