use crate::error::Result;
use crate::models::ViolationAuditEntry;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Append-only violation audit log
pub struct AuditDb {
    pool: Arc<PgPool>,
}

impl AuditDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &ViolationAuditEntry) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO violation_audit (
                group_id,
                user_id,
                kind,
                evidence,
                action_taken,
                warning_number,
                message_id,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(entry.group_id.as_str())
        .bind(entry.user_id.as_str())
        .bind(entry.kind.as_str())
        .bind(&entry.evidence)
        .bind(entry.action_taken.as_str())
        .bind(entry.warning_number as i32)
        .bind(entry.message_id.as_deref())
        .bind(entry.timestamp)
        .fetch_one(&*self.pool)
        .await?;

        tracing::debug!(
            audit_id = %id,
            group_id = %entry.group_id,
            user_id = %entry.user_id,
            action = entry.action_taken.as_str(),
            "Violation logged"
        );

        Ok(id)
    }
}
