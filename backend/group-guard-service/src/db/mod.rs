//! Durable moderation records: warning counters, the audit log and promotion times.

pub mod audit;
pub mod memory;
pub mod promotions;
pub mod warnings;

pub use audit::AuditDb;
pub use memory::InMemoryStore;
pub use promotions::PromotionsDb;
pub use warnings::WarningsDb;

use crate::error::Result;
use crate::models::{
    GroupId, ResetScope, UserId, ViolationAuditEntry, ViolationKind, WarningStats,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Storage collaborator used by the ledger, the trust windows and the audit trail.
///
/// Every call may fail while the store is degraded; callers apply their own
/// fail-safe defaults instead of propagating.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// Atomically increment the counter for the key, creating it at 1.
    async fn add_warning(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
        reason: &str,
    ) -> Result<u32>;

    async fn get_warning_count(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
    ) -> Result<u32>;

    /// Zero the matching counters, returning how many were non-zero.
    async fn reset_warnings(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        scope: ResetScope,
    ) -> Result<u64>;

    async fn get_warning_stats(&self, group_id: &GroupId) -> Result<WarningStats>;

    async fn log_violation(&self, entry: &ViolationAuditEntry) -> Result<Uuid>;

    async fn get_promotion_timestamp(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Option<DateTime<Utc>>>;

    async fn log_admin_promotion(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        promoted_by: Option<&UserId>,
        promoted_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Postgres-backed store
pub struct PgModerationStore {
    warnings: WarningsDb,
    audit: AuditDb,
    promotions: PromotionsDb,
}

impl PgModerationStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            warnings: WarningsDb::new(pool.clone()),
            audit: AuditDb::new(pool.clone()),
            promotions: PromotionsDb::new(pool),
        }
    }
}

#[async_trait]
impl ModerationStore for PgModerationStore {
    async fn add_warning(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
        reason: &str,
    ) -> Result<u32> {
        self.warnings.increment(group_id, user_id, kind, reason).await
    }

    async fn get_warning_count(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
    ) -> Result<u32> {
        self.warnings.count(group_id, user_id, kind).await
    }

    async fn reset_warnings(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        scope: ResetScope,
    ) -> Result<u64> {
        self.warnings.reset(group_id, user_id, scope).await
    }

    async fn get_warning_stats(&self, group_id: &GroupId) -> Result<WarningStats> {
        self.warnings.stats(group_id).await
    }

    async fn log_violation(&self, entry: &ViolationAuditEntry) -> Result<Uuid> {
        self.audit.insert(entry).await
    }

    async fn get_promotion_timestamp(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Option<DateTime<Utc>>> {
        self.promotions.promoted_at(group_id, user_id).await
    }

    async fn log_admin_promotion(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        promoted_by: Option<&UserId>,
        promoted_at: DateTime<Utc>,
    ) -> Result<()> {
        self.promotions
            .upsert(group_id, user_id, promoted_by, promoted_at)
            .await
    }
}
