//! Unauthorized-attempt counters for the admin guard.
//!
//! Counters are keyed by `(group, actor, action family)`, are not durable and
//! are deleted once punishment fires, so a re-admitted actor starts clean.

use crate::error::{GuardError, Result};
use crate::models::{AdminActionKind, GroupId, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttemptKey {
    pub group_id: GroupId,
    pub actor_id: UserId,
    pub family: AdminActionKind,
}

impl AttemptKey {
    pub fn new(group_id: GroupId, actor_id: UserId, family: AdminActionKind) -> Self {
        Self {
            group_id,
            actor_id,
            family,
        }
    }
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn increment(&self, key: &AttemptKey) -> Result<u32>;

    async fn get(&self, key: &AttemptKey) -> Result<u32>;

    async fn delete(&self, key: &AttemptKey) -> Result<()>;
}

/// Process-local counters
#[derive(Default)]
pub struct InMemoryAttemptStore {
    counts: DashMap<AttemptKey, u32>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn increment(&self, key: &AttemptKey) -> Result<u32> {
        let mut count = self.counts.entry(key.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn get(&self, key: &AttemptKey) -> Result<u32> {
        Ok(self.counts.get(key).map(|c| *c).unwrap_or(0))
    }

    async fn delete(&self, key: &AttemptKey) -> Result<()> {
        self.counts.remove(key);
        Ok(())
    }
}

/// Counters shared by several engine instances through Redis
pub struct RedisAttemptStore {
    conn: ConnectionManager,
    prefix: String,
    ttl_secs: u64,
}

impl RedisAttemptStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
            ttl_secs,
        }
    }

    fn redis_key(&self, key: &AttemptKey) -> String {
        format!(
            "{}:{}:{}:{}",
            self.prefix, key.group_id, key.actor_id, key.family
        )
    }
}

#[async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn increment(&self, key: &AttemptKey) -> Result<u32> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn.clone();

        let (count, _): (u32, i64) = redis::pipe()
            .atomic()
            .incr(&redis_key, 1)
            .expire(&redis_key, self.ttl_secs as i64)
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn get(&self, key: &AttemptKey) -> Result<u32> {
        let mut conn = self.conn.clone();
        let count: Option<u32> = conn.get(self.redis_key(key)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn delete(&self, key: &AttemptKey) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.redis_key(key)).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptDecision {
    pub count: u32,
    pub threshold: u32,
    pub escalate: bool,
}

/// Increment, compare and reset as one critical section per key
pub struct AttemptTracker {
    store: Arc<dyn AttemptStore>,
    locks: DashMap<AttemptKey, Arc<Mutex<()>>>,
}

impl AttemptTracker {
    pub fn new(store: Arc<dyn AttemptStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryAttemptStore::new()))
    }

    /// Count one unauthorized attempt. When the threshold is reached the counter
    /// is deleted before the lock is released, so exactly one caller escalates.
    pub async fn record_attempt(&self, key: &AttemptKey, threshold: u32) -> Result<AttemptDecision> {
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let decision = {
            let _guard = lock.lock().await;
            self.count_attempt(key, threshold).await
        };

        drop(lock);
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);

        decision
    }

    async fn count_attempt(&self, key: &AttemptKey, threshold: u32) -> Result<AttemptDecision> {
        let count = self.store.increment(key).await?;
        let escalate = count >= threshold;

        if escalate {
            if let Err(e) = self.store.delete(key).await {
                tracing::error!(
                    group_id = %key.group_id,
                    actor = %key.actor_id,
                    error = %e,
                    "Attempt counter could not be cleared after escalation"
                );
                return Err(GuardError::StorageUnavailable(e.to_string()));
            }
        }

        Ok(AttemptDecision {
            count,
            threshold,
            escalate,
        })
    }

    pub async fn current(&self, key: &AttemptKey) -> Result<u32> {
        self.store.get(key).await
    }
}
