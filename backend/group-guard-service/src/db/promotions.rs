use crate::error::Result;
use crate::models::{GroupId, UserId};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

/// Time-of-promotion records backing the admin trust windows
pub struct PromotionsDb {
    pool: Arc<PgPool>,
}

impl PromotionsDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn promoted_at(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Option<DateTime<Utc>>> {
        let promoted_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT promoted_at FROM admin_promotions
            WHERE group_id = $1 AND user_id = $2
            "#,
        )
        .bind(group_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        Ok(promoted_at)
    }

    /// Record the latest promotion; a re-promotion restarts the trust window
    pub async fn upsert(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        promoted_by: Option<&UserId>,
        promoted_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_promotions (group_id, user_id, promoted_by, promoted_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (group_id, user_id)
            DO UPDATE SET promoted_by = EXCLUDED.promoted_by,
                          promoted_at = EXCLUDED.promoted_at
            "#,
        )
        .bind(group_id.as_str())
        .bind(user_id.as_str())
        .bind(promoted_by.map(UserId::as_str))
        .bind(promoted_at)
        .execute(&*self.pool)
        .await?;

        tracing::info!(
            group_id = %group_id,
            user_id = %user_id,
            "Admin promotion recorded"
        );

        Ok(())
    }
}
