//! Entity relationship database operations (Graph Expert output).

use super::models::RelationshipRecord;
use super::Database;

pub trait RelationshipOps {
    fn create_relationship(&self, rel: &RelationshipRecord) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;
    fn list_relationships_for_campaign(&self, campaign_id: &str) -> impl std::future::Future<Output = Result<Vec<RelationshipRecord>, sqlx::Error>> + Send;
    fn list_relationships_for_entity(&self, entity_id: &str) -> impl std::future::Future<Output = Result<Vec<RelationshipRecord>, sqlx::Error>> + Send;
}

impl RelationshipOps for Database {
    async fn create_relationship(&self, rel: &RelationshipRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO relationships
                (id, campaign_id, source_entity_id, target_entity_id, relationship_type,
                 symmetric, tone, strength, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rel.id)
        .bind(&rel.campaign_id)
        .bind(&rel.source_entity_id)
        .bind(&rel.target_entity_id)
        .bind(&rel.relationship_type)
        .bind(rel.symmetric)
        .bind(&rel.tone)
        .bind(rel.strength)
        .bind(&rel.created_at)
        .bind(&rel.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn list_relationships_for_campaign(&self, campaign_id: &str) -> Result<Vec<RelationshipRecord>, sqlx::Error> {
        sqlx::query_as::<_, RelationshipRecord>(
            "SELECT * FROM relationships WHERE campaign_id = ? ORDER BY created_at",
        )
        .bind(campaign_id)
        .fetch_all(self.pool())
        .await
    }

    async fn list_relationships_for_entity(&self, entity_id: &str) -> Result<Vec<RelationshipRecord>, sqlx::Error> {
        sqlx::query_as::<_, RelationshipRecord>(
            "SELECT * FROM relationships WHERE source_entity_id = ? OR target_entity_id = ? ORDER BY created_at",
        )
        .bind(entity_id)
        .bind(entity_id)
        .fetch_all(self.pool())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn relationship(source: &str, target: &str, relationship_type: &str) -> RelationshipRecord {
        let now = Utc::now().to_rfc3339();
        RelationshipRecord {
            id: Uuid::new_v4().to_string(),
            campaign_id: "c1".to_string(),
            source_entity_id: source.to_string(),
            target_entity_id: target.to_string(),
            relationship_type: relationship_type.to_string(),
            symmetric: false,
            tone: None,
            strength: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn list_for_entity_finds_both_source_and_target_rows() {
        let db = Database::new_in_memory().await.unwrap();
        db.create_relationship(&relationship("e1", "e2", "ally_of")).await.unwrap();
        db.create_relationship(&relationship("e3", "e1", "enemy_of")).await.unwrap();
        db.create_relationship(&relationship("e4", "e5", "ally_of")).await.unwrap();

        let rels = db.list_relationships_for_entity("e1").await.unwrap();
        assert_eq!(rels.len(), 2);
    }

    #[tokio::test]
    async fn list_for_campaign_is_scoped() {
        let db = Database::new_in_memory().await.unwrap();
        let mut in_other_campaign = relationship("e1", "e2", "ally_of");
        in_other_campaign.campaign_id = "other".to_string();
        db.create_relationship(&in_other_campaign).await.unwrap();
        db.create_relationship(&relationship("e3", "e4", "ally_of")).await.unwrap();

        let rels = db.list_relationships_for_campaign("c1").await.unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].source_entity_id, "e3");
    }
}
