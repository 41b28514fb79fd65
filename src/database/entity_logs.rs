//! Entity log database operations — the running narrative record an
//! entity accrues as sessions reference it (used by the Graph Expert
//! enrichment agent and by manual GM annotation).

use super::models::EntityLogRecord;
use super::Database;

pub trait EntityLogOps {
    fn add_log_entry(&self, entry: &EntityLogRecord) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;
    fn list_logs_for_entity(&self, entity_id: &str) -> impl std::future::Future<Output = Result<Vec<EntityLogRecord>, sqlx::Error>> + Send;
}

impl EntityLogOps for Database {
    async fn add_log_entry(&self, entry: &EntityLogRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO entity_logs (id, entity_id, campaign_id, content, confirmed, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.entity_id)
        .bind(&entry.campaign_id)
        .bind(&entry.content)
        .bind(entry.confirmed)
        .bind(&entry.created_at)
        .bind(&entry.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn list_logs_for_entity(&self, entity_id: &str) -> Result<Vec<EntityLogRecord>, sqlx::Error> {
        sqlx::query_as::<_, EntityLogRecord>(
            "SELECT * FROM entity_logs WHERE entity_id = ? ORDER BY created_at",
        )
        .bind(entity_id)
        .fetch_all(self.pool())
        .await
    }
}
