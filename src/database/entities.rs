//! Entity database operations.

use super::models::EntityRecord;
use super::Database;

pub trait EntityOps {
    fn create_entity(&self, entity: &EntityRecord) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;
    fn get_entity(&self, id: &str) -> impl std::future::Future<Output = Result<Option<EntityRecord>, sqlx::Error>> + Send;
    fn update_entity(&self, entity: &EntityRecord) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;
    fn list_entities_for_campaign(&self, campaign_id: &str) -> impl std::future::Future<Output = Result<Vec<EntityRecord>, sqlx::Error>> + Send;
    fn list_entities_by_type(&self, campaign_id: &str, entity_type: &str) -> impl std::future::Future<Output = Result<Vec<EntityRecord>, sqlx::Error>> + Send;
}

impl EntityOps for Database {
    async fn create_entity(&self, entity: &EntityRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO entities
                (id, campaign_id, entity_type, name, description, gm_notes,
                 attributes_json, tags_json, source_confidence, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entity.id)
        .bind(&entity.campaign_id)
        .bind(&entity.entity_type)
        .bind(&entity.name)
        .bind(&entity.description)
        .bind(&entity.gm_notes)
        .bind(&entity.attributes_json)
        .bind(&entity.tags_json)
        .bind(&entity.source_confidence)
        .bind(&entity.created_at)
        .bind(&entity.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Option<EntityRecord>, sqlx::Error> {
        sqlx::query_as::<_, EntityRecord>("SELECT * FROM entities WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
    }

    async fn update_entity(&self, entity: &EntityRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE entities SET
                name = ?, description = ?, gm_notes = ?, attributes_json = ?,
                tags_json = ?, source_confidence = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&entity.name)
        .bind(&entity.description)
        .bind(&entity.gm_notes)
        .bind(&entity.attributes_json)
        .bind(&entity.tags_json)
        .bind(&entity.source_confidence)
        .bind(&entity.updated_at)
        .bind(&entity.id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn list_entities_for_campaign(&self, campaign_id: &str) -> Result<Vec<EntityRecord>, sqlx::Error> {
        sqlx::query_as::<_, EntityRecord>(
            "SELECT * FROM entities WHERE campaign_id = ? ORDER BY name",
        )
        .bind(campaign_id)
        .fetch_all(self.pool())
        .await
    }

    async fn list_entities_by_type(&self, campaign_id: &str, entity_type: &str) -> Result<Vec<EntityRecord>, sqlx::Error> {
        sqlx::query_as::<_, EntityRecord>(
            "SELECT * FROM entities WHERE campaign_id = ? AND entity_type = ? ORDER BY name",
        )
        .bind(campaign_id)
        .bind(entity_type)
        .fetch_all(self.pool())
        .await
    }
}
