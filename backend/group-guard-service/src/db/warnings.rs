//! Database operations for per-kind warning counters

use crate::error::Result;
use crate::models::{GroupId, ResetScope, UserId, ViolationKind, WarningStats};
use sqlx::PgPool;
use std::sync::Arc;

/// Database operations for warning counters
pub struct WarningsDb {
    pool: Arc<PgPool>,
}

impl WarningsDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Increment the counter in a single upsert so concurrent writers never lose an update
    pub async fn increment(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
        reason: &str,
    ) -> Result<u32> {
        let count: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO group_warnings (
                group_id,
                user_id,
                kind,
                count,
                last_reason,
                last_warning_at
            )
            VALUES ($1, $2, $3, 1, $4, NOW())
            ON CONFLICT (group_id, user_id, kind)
            DO UPDATE SET count = group_warnings.count + 1,
                          last_reason = EXCLUDED.last_reason,
                          last_warning_at = EXCLUDED.last_warning_at
            RETURNING count
            "#,
        )
        .bind(group_id.as_str())
        .bind(user_id.as_str())
        .bind(kind.as_str())
        .bind(reason)
        .fetch_one(&*self.pool)
        .await?;

        tracing::info!(
            group_id = %group_id,
            user_id = %user_id,
            kind = %kind,
            count = count,
            "Warning recorded"
        );

        Ok(count.max(0) as u32)
    }

    /// Current counter value, zero when the record does not exist
    pub async fn count(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        kind: ViolationKind,
    ) -> Result<u32> {
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT count FROM group_warnings
            WHERE group_id = $1 AND user_id = $2 AND kind = $3
            "#,
        )
        .bind(group_id.as_str())
        .bind(user_id.as_str())
        .bind(kind.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        Ok(count.unwrap_or(0).max(0) as u32)
    }

    /// Zero counters; records are kept so the last reason stays visible
    pub async fn reset(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        scope: ResetScope,
    ) -> Result<u64> {
        let result = match scope {
            ResetScope::Kind(kind) => {
                sqlx::query(
                    r#"
                    UPDATE group_warnings
                    SET count = 0
                    WHERE group_id = $1 AND user_id = $2 AND kind = $3 AND count > 0
                    "#,
                )
                .bind(group_id.as_str())
                .bind(user_id.as_str())
                .bind(kind.as_str())
                .execute(&*self.pool)
                .await?
            }
            ResetScope::All => {
                sqlx::query(
                    r#"
                    UPDATE group_warnings
                    SET count = 0
                    WHERE group_id = $1 AND user_id = $2 AND count > 0
                    "#,
                )
                .bind(group_id.as_str())
                .bind(user_id.as_str())
                .execute(&*self.pool)
                .await?
            }
        };

        let reset = result.rows_affected();
        if reset > 0 {
            tracing::info!(
                group_id = %group_id,
                user_id = %user_id,
                rows = reset,
                "Warnings reset"
            );
        }

        Ok(reset)
    }

    /// Outstanding warnings for a group, per kind
    pub async fn stats(&self, group_id: &GroupId) -> Result<WarningStats> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT kind, SUM(count)::BIGINT
            FROM group_warnings
            WHERE group_id = $1 AND count > 0
            GROUP BY kind
            ORDER BY kind
            "#,
        )
        .bind(group_id.as_str())
        .fetch_all(&*self.pool)
        .await?;

        let users_warned: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT user_id)
            FROM group_warnings
            WHERE group_id = $1 AND count > 0
            "#,
        )
        .bind(group_id.as_str())
        .fetch_one(&*self.pool)
        .await?;

        let mut stats = WarningStats {
            users_warned: users_warned.max(0) as u64,
            ..Default::default()
        };

        for (kind, total) in rows {
            match kind.parse::<ViolationKind>() {
                Ok(kind) => {
                    let total = total.max(0) as u64;
                    stats.total_warnings += total;
                    stats.by_kind.push((kind, total));
                }
                Err(e) => tracing::warn!(group_id = %group_id, "Skipping warning row: {}", e),
            }
        }

        Ok(stats)
    }
}
