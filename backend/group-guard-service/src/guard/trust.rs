//! Admin trust windows.
//!
//! Promotion times come from the durable store and are cached here. Only
//! positive lookups are cached: a miss or a store failure means "new admin",
//! and the next lookup asks the store again so a late-arriving promotion record
//! is picked up. The cache is bounded and entries expire, so a promotion
//! written by another instance is seen within `CACHE_TTL`.

use crate::db::ModerationStore;
use crate::models::{GroupId, UserId};
use chrono::{DateTime, Duration, Utc};
use moka::future::Cache;
use std::sync::Arc;

const CACHE_CAPACITY: u64 = 10_000;
const CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(3600);

pub struct TrustWindows {
    store: Arc<dyn ModerationStore>,
    cache: Cache<(GroupId, UserId), DateTime<Utc>>,
}

impl TrustWindows {
    pub fn new(store: Arc<dyn ModerationStore>) -> Self {
        Self {
            store,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    pub async fn promoted_at(&self, group_id: &GroupId, user_id: &UserId) -> Option<DateTime<Utc>> {
        let key = (group_id.clone(), user_id.clone());
        if let Some(at) = self.cache.get(&key).await {
            return Some(at);
        }

        match self.store.get_promotion_timestamp(group_id, user_id).await {
            Ok(Some(at)) => {
                self.cache.insert(key, at).await;
                Some(at)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(
                    group_id = %group_id,
                    user_id = %user_id,
                    error = %e,
                    "Promotion time unavailable, treating admin as new"
                );
                None
            }
        }
    }

    /// True only when a promotion is on record and older than `window`
    pub async fn is_trusted(&self, group_id: &GroupId, user_id: &UserId, window: Duration) -> bool {
        self.promoted_at(group_id, user_id)
            .await
            .map(|at| Utc::now() - at >= window)
            .unwrap_or(false)
    }

    pub async fn record_promotion(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        promoted_by: Option<&UserId>,
    ) {
        let now = Utc::now();
        self.cache
            .insert((group_id.clone(), user_id.clone()), now)
            .await;

        if let Err(e) = self
            .store
            .log_admin_promotion(group_id, user_id, promoted_by, now)
            .await
        {
            tracing::warn!(
                group_id = %group_id,
                user_id = %user_id,
                error = %e,
                "Promotion could not be persisted"
            );
        }
    }

    pub async fn forget(&self, group_id: &GroupId, user_id: &UserId) {
        self.cache
            .invalidate(&(group_id.clone(), user_id.clone()))
            .await;
    }
}
