//! Constraint override database operations. A GM dismissing a suggestion
//! can ask CAES never to raise that same candidate again for the
//! campaign (see the "dismissed" resolution in the resolver).

use super::models::ConstraintOverrideRecord;
use super::Database;

pub trait ConstraintOverrideOps {
    fn add_override(&self, over: &ConstraintOverrideRecord) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;
    fn is_overridden(
        &self,
        campaign_id: &str,
        constraint_type: &str,
        override_key: &str,
    ) -> impl std::future::Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl ConstraintOverrideOps for Database {
    async fn add_override(&self, over: &ConstraintOverrideRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO constraint_overrides
                (id, campaign_id, constraint_type, override_key, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&over.id)
        .bind(&over.campaign_id)
        .bind(&over.constraint_type)
        .bind(&over.override_key)
        .bind(&over.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn is_overridden(&self, campaign_id: &str, constraint_type: &str, override_key: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT 1 FROM constraint_overrides
            WHERE campaign_id = ? AND constraint_type = ? AND override_key = ?
            "#,
        )
        .bind(campaign_id)
        .bind(constraint_type)
        .bind(override_key)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn override_suppresses_only_its_own_key() {
        let db = Database::new_in_memory().await.unwrap();
        db.add_override(&ConstraintOverrideRecord {
            id: Uuid::new_v4().to_string(),
            campaign_id: "c1".to_string(),
            constraint_type: "cardinality_violation".to_string(),
            override_key: "member_of".to_string(),
            created_at: Utc::now().to_rfc3339(),
        })
        .await
        .unwrap();

        assert!(db.is_overridden("c1", "cardinality_violation", "member_of").await.unwrap());
        assert!(!db.is_overridden("c1", "cardinality_violation", "leads").await.unwrap());
        assert!(!db.is_overridden("c1", "type_pair_violation", "member_of").await.unwrap());
        assert!(!db.is_overridden("other-campaign", "cardinality_violation", "member_of").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_override_insert_is_ignored_not_an_error() {
        let db = Database::new_in_memory().await.unwrap();
        let over = ConstraintOverrideRecord {
            id: Uuid::new_v4().to_string(),
            campaign_id: "c1".to_string(),
            constraint_type: "missing_required".to_string(),
            override_key: "e1:located_at".to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        db.add_override(&over).await.unwrap();
        db.add_override(&over).await.unwrap();
        assert!(db.is_overridden("c1", "missing_required", "e1:located_at").await.unwrap());
    }
}
