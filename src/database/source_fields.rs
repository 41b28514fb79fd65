//! Typed read/write of the six recognised `(sourceTable, sourceField)`
//! pairs, scoped by campaign. Backs the Source Store Adapter (C2).
//!
//! Every pair here is parameterised and campaign-scoped; for
//! `sessions.*` that requires a join through `chapters` since sessions
//! carry no `campaign_id` column of their own.

use crate::error::{AppError, AppResult};
use sqlx::sqlite::SqlitePool;

/// The closed set of fields CAES can scan and rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceField {
    EntitiesDescription,
    EntitiesGmNotes,
    ChaptersOverview,
    SessionsPrepNotes,
    SessionsActualNotes,
    CampaignsDescription,
}

impl SourceField {
    pub fn parse(source_table: &str, source_field: &str) -> Option<Self> {
        match (source_table, source_field) {
            ("entities", "description") => Some(Self::EntitiesDescription),
            ("entities", "gm_notes") => Some(Self::EntitiesGmNotes),
            ("chapters", "overview") => Some(Self::ChaptersOverview),
            ("sessions", "prep_notes") => Some(Self::SessionsPrepNotes),
            ("sessions", "actual_notes") => Some(Self::SessionsActualNotes),
            ("campaigns", "description") => Some(Self::CampaignsDescription),
            _ => None,
        }
    }
}

/// Fetch the current text of a recognised source field, scoped to
/// `campaign_id`. Returns `NotFound` both when the row is absent and
/// when it belongs to a different campaign — the caller cannot tell
/// the two apart, by design.
pub async fn fetch(
    pool: &SqlitePool,
    campaign_id: &str,
    source_table: &str,
    source_field: &str,
    source_id: &str,
) -> AppResult<String> {
    let field = SourceField::parse(source_table, source_field)
        .ok_or_else(|| AppError::InvalidRequest(format!("unsupported source {source_table}.{source_field}")))?;

    let row: Option<(Option<String>,)> = match field {
        SourceField::EntitiesDescription => {
            sqlx::query_as("SELECT description FROM entities WHERE id = ? AND campaign_id = ?")
                .bind(source_id)
                .bind(campaign_id)
                .fetch_optional(pool)
                .await?
        }
        SourceField::EntitiesGmNotes => {
            sqlx::query_as("SELECT gm_notes FROM entities WHERE id = ? AND campaign_id = ?")
                .bind(source_id)
                .bind(campaign_id)
                .fetch_optional(pool)
                .await?
        }
        SourceField::ChaptersOverview => {
            sqlx::query_as("SELECT overview FROM chapters WHERE id = ? AND campaign_id = ?")
                .bind(source_id)
                .bind(campaign_id)
                .fetch_optional(pool)
                .await?
        }
        SourceField::SessionsPrepNotes => {
            sqlx::query_as(
                r#"
                SELECT s.prep_notes FROM sessions s
                JOIN chapters c ON c.id = s.chapter_id
                WHERE s.id = ? AND c.campaign_id = ?
                "#,
            )
            .bind(source_id)
            .bind(campaign_id)
            .fetch_optional(pool)
            .await?
        }
        SourceField::SessionsActualNotes => {
            sqlx::query_as(
                r#"
                SELECT s.actual_notes FROM sessions s
                JOIN chapters c ON c.id = s.chapter_id
                WHERE s.id = ? AND c.campaign_id = ?
                "#,
            )
            .bind(source_id)
            .bind(campaign_id)
            .fetch_optional(pool)
            .await?
        }
        SourceField::CampaignsDescription => {
            // The campaign row *is* the scope: source_id must equal campaign_id.
            if source_id != campaign_id {
                None
            } else {
                sqlx::query_as("SELECT description FROM campaigns WHERE id = ?")
                    .bind(campaign_id)
                    .fetch_optional(pool)
                    .await?
            }
        }
    };

    row.map(|(text,)| text.unwrap_or_default()).ok_or(AppError::NotFound)
}

/// Write `new_text` into a recognised source field, scoped to
/// `campaign_id`, updating the row's `updated_at` in the same statement.
pub async fn write(
    pool: &SqlitePool,
    campaign_id: &str,
    source_table: &str,
    source_field: &str,
    source_id: &str,
    new_text: &str,
    updated_at: &str,
) -> AppResult<()> {
    let field = SourceField::parse(source_table, source_field)
        .ok_or_else(|| AppError::InvalidRequest(format!("unsupported source {source_table}.{source_field}")))?;

    let rows_affected = match field {
        SourceField::EntitiesDescription => {
            sqlx::query("UPDATE entities SET description = ?, updated_at = ? WHERE id = ? AND campaign_id = ?")
                .bind(new_text)
                .bind(updated_at)
                .bind(source_id)
                .bind(campaign_id)
                .execute(pool)
                .await?
                .rows_affected()
        }
        SourceField::EntitiesGmNotes => {
            sqlx::query("UPDATE entities SET gm_notes = ?, updated_at = ? WHERE id = ? AND campaign_id = ?")
                .bind(new_text)
                .bind(updated_at)
                .bind(source_id)
                .bind(campaign_id)
                .execute(pool)
                .await?
                .rows_affected()
        }
        SourceField::ChaptersOverview => {
            sqlx::query("UPDATE chapters SET overview = ?, updated_at = ? WHERE id = ? AND campaign_id = ?")
                .bind(new_text)
                .bind(updated_at)
                .bind(source_id)
                .bind(campaign_id)
                .execute(pool)
                .await?
                .rows_affected()
        }
        SourceField::SessionsPrepNotes => {
            sqlx::query(
                r#"
                UPDATE sessions SET prep_notes = ?, updated_at = ?
                WHERE id = ? AND chapter_id IN (SELECT id FROM chapters WHERE campaign_id = ?)
                "#,
            )
            .bind(new_text)
            .bind(updated_at)
            .bind(source_id)
            .bind(campaign_id)
            .execute(pool)
            .await?
            .rows_affected()
        }
        SourceField::SessionsActualNotes => {
            sqlx::query(
                r#"
                UPDATE sessions SET actual_notes = ?, updated_at = ?
                WHERE id = ? AND chapter_id IN (SELECT id FROM chapters WHERE campaign_id = ?)
                "#,
            )
            .bind(new_text)
            .bind(updated_at)
            .bind(source_id)
            .bind(campaign_id)
            .execute(pool)
            .await?
            .rows_affected()
        }
        SourceField::CampaignsDescription => {
            if source_id != campaign_id {
                0
            } else {
                sqlx::query("UPDATE campaigns SET description = ?, updated_at = ? WHERE id = ?")
                    .bind(new_text)
                    .bind(updated_at)
                    .bind(campaign_id)
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
        }
    };

    if rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn fetch_and_write_entity_description() {
        let db = Database::new_in_memory().await.unwrap();
        let pool = db.pool();
        let owner = Uuid::new_v4().to_string();
        let campaign_id = Uuid::new_v4().to_string();
        let entity_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO users (id, created_at) VALUES (?, ?)")
            .bind(&owner)
            .bind(&now)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO campaigns (id, owner_user_id, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&campaign_id)
            .bind(&owner)
            .bind("Test Campaign")
            .bind(&now)
            .bind(&now)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO entities (id, campaign_id, entity_type, name, created_at, updated_at) VALUES (?, ?, 'npc', 'Thorn', ?, ?)",
        )
        .bind(&entity_id)
        .bind(&campaign_id)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();

        let text = fetch(pool, &campaign_id, "entities", "description", &entity_id).await.unwrap();
        assert_eq!(text, "");

        write(pool, &campaign_id, "entities", "description", &entity_id, "A grim ranger.", &now)
            .await
            .unwrap();
        let text = fetch(pool, &campaign_id, "entities", "description", &entity_id).await.unwrap();
        assert_eq!(text, "A grim ranger.");

        let other_campaign = Uuid::new_v4().to_string();
        let result = fetch(pool, &other_campaign, "entities", "description", &entity_id).await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn unsupported_source_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let result = fetch(db.pool(), "campaign-1", "entities", "stats", "entity-1").await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }
}
