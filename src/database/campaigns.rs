//! Campaign database operations.

use super::models::CampaignRecord;
use super::Database;

pub trait CampaignOps {
    fn create_campaign(&self, campaign: &CampaignRecord) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;
    fn get_campaign(&self, id: &str) -> impl std::future::Future<Output = Result<Option<CampaignRecord>, sqlx::Error>> + Send;
    fn list_campaigns_for_owner(&self, owner_user_id: &str) -> impl std::future::Future<Output = Result<Vec<CampaignRecord>, sqlx::Error>> + Send;
    fn is_owner(&self, campaign_id: &str, user_id: &str) -> impl std::future::Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl CampaignOps for Database {
    async fn create_campaign(&self, campaign: &CampaignRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO campaigns (id, owner_user_id, name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&campaign.id)
        .bind(&campaign.owner_user_id)
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(&campaign.created_at)
        .bind(&campaign.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_campaign(&self, id: &str) -> Result<Option<CampaignRecord>, sqlx::Error> {
        sqlx::query_as::<_, CampaignRecord>("SELECT * FROM campaigns WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
    }

    async fn list_campaigns_for_owner(&self, owner_user_id: &str) -> Result<Vec<CampaignRecord>, sqlx::Error> {
        sqlx::query_as::<_, CampaignRecord>(
            "SELECT * FROM campaigns WHERE owner_user_id = ? ORDER BY created_at DESC",
        )
        .bind(owner_user_id)
        .fetch_all(self.pool())
        .await
    }

    /// Used by handlers to enforce the "not found vs not yours" collapse
    /// (see `AppError::NotFound`): a campaign that exists but belongs to
    /// someone else must answer the same as a campaign that does not
    /// exist at all.
    async fn is_owner(&self, campaign_id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT owner_user_id FROM campaigns WHERE id = ?")
                .bind(campaign_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(matches!(row, Some((owner,)) if owner == user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::Utc;
    use uuid::Uuid;

    async fn make_user(db: &Database) -> String {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO users (id, created_at) VALUES (?, ?)")
            .bind(&id)
            .bind(Utc::now().to_rfc3339())
            .execute(db.pool())
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn create_and_fetch_campaign() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = make_user(&db).await;
        let now = Utc::now().to_rfc3339();
        let campaign = CampaignRecord {
            id: Uuid::new_v4().to_string(),
            owner_user_id: owner.clone(),
            name: "The Sunken City".to_string(),
            description: None,
            created_at: now.clone(),
            updated_at: now,
        };
        db.create_campaign(&campaign).await.unwrap();

        let fetched = db.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "The Sunken City");
        assert!(db.is_owner(&campaign.id, &owner).await.unwrap());
        assert!(!db.is_owner(&campaign.id, "someone-else").await.unwrap());
    }
}
