//! Analysis job / item database operations backing the Analysis Jobs
//! Registry (C3).

use super::models::{AnalysisItemRecord, AnalysisJobRecord};
use super::Database;

/// Fields needed to insert one detected mention or enrichment suggestion.
/// `id`/`created_at` are assigned by the database.
#[derive(Debug, Clone)]
pub struct NewAnalysisItem {
    pub phase: String,
    pub detection_type: String,
    pub matched_text: String,
    pub entity_id: Option<String>,
    pub similarity: Option<f64>,
    pub context_snippet: Option<String>,
    pub position_start: Option<i64>,
    pub position_end: Option<i64>,
    pub suggested_content_json: Option<String>,
}

pub trait JobOps {
    fn find_job_by_source(
        &self,
        campaign_id: &str,
        source_table: &str,
        source_id: &str,
        source_field: &str,
    ) -> impl std::future::Future<Output = Result<Option<AnalysisJobRecord>, sqlx::Error>> + Send;

    fn delete_job(&self, job_id: i64) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;

    fn create_job(
        &self,
        campaign_id: &str,
        source_table: &str,
        source_id: &str,
        source_field: &str,
        created_at: &str,
    ) -> impl std::future::Future<Output = Result<i64, sqlx::Error>> + Send;

    fn insert_items(
        &self,
        job_id: i64,
        items: &[NewAnalysisItem],
        created_at: &str,
    ) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;

    fn get_job(&self, job_id: i64) -> impl std::future::Future<Output = Result<Option<AnalysisJobRecord>, sqlx::Error>> + Send;

    fn list_items(&self, job_id: i64) -> impl std::future::Future<Output = Result<Vec<AnalysisItemRecord>, sqlx::Error>> + Send;

    fn list_items_by_phase(
        &self,
        job_id: i64,
        phase: &str,
    ) -> impl std::future::Future<Output = Result<Vec<AnalysisItemRecord>, sqlx::Error>> + Send;

    fn get_item(&self, item_id: i64) -> impl std::future::Future<Output = Result<Option<AnalysisItemRecord>, sqlx::Error>> + Send;

    fn resolve_item(
        &self,
        item_id: i64,
        resolution: &str,
        resolved_entity_id: Option<&str>,
        entity_name: Option<&str>,
        entity_type: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;

    fn revert_item(&self, item_id: i64) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;

    fn count_pending(&self, job_id: i64) -> impl std::future::Future<Output = Result<i64, sqlx::Error>> + Send;

    fn recompute_resolved_items(&self, job_id: i64) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;

    fn update_job_status(&self, job_id: i64, status: &str) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;

    fn update_enrichment_progress(
        &self,
        job_id: i64,
        total: i64,
        resolved: i64,
    ) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;
}

impl JobOps for Database {
    async fn find_job_by_source(
        &self,
        campaign_id: &str,
        source_table: &str,
        source_id: &str,
        source_field: &str,
    ) -> Result<Option<AnalysisJobRecord>, sqlx::Error> {
        sqlx::query_as::<_, AnalysisJobRecord>(
            r#"
            SELECT * FROM content_analysis_jobs
            WHERE campaign_id = ? AND source_table = ? AND source_id = ? AND source_field = ?
            "#,
        )
        .bind(campaign_id)
        .bind(source_table)
        .bind(source_id)
        .bind(source_field)
        .fetch_optional(self.pool())
        .await
    }

    async fn delete_job(&self, job_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM content_analysis_jobs WHERE id = ?")
            .bind(job_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn create_job(
        &self,
        campaign_id: &str,
        source_table: &str,
        source_id: &str,
        source_field: &str,
        created_at: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO content_analysis_jobs
                (campaign_id, source_table, source_id, source_field, status, created_at)
            VALUES (?, ?, ?, ?, 'completed', ?)
            "#,
        )
        .bind(campaign_id)
        .bind(source_table)
        .bind(source_id)
        .bind(source_field)
        .bind(created_at)
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn insert_items(&self, job_id: i64, items: &[NewAnalysisItem], created_at: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO content_analysis_items
                    (job_id, phase, detection_type, matched_text, entity_id, similarity,
                     context_snippet, position_start, position_end, suggested_content_json,
                     resolution, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?)
                "#,
            )
            .bind(job_id)
            .bind(&item.phase)
            .bind(&item.detection_type)
            .bind(&item.matched_text)
            .bind(&item.entity_id)
            .bind(item.similarity)
            .bind(&item.context_snippet)
            .bind(item.position_start)
            .bind(item.position_end)
            .bind(&item.suggested_content_json)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query("UPDATE content_analysis_jobs SET total_items = total_items + ? WHERE id = ?")
            .bind(items.len() as i64)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    async fn get_job(&self, job_id: i64) -> Result<Option<AnalysisJobRecord>, sqlx::Error> {
        sqlx::query_as::<_, AnalysisJobRecord>("SELECT * FROM content_analysis_jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(self.pool())
            .await
    }

    async fn list_items(&self, job_id: i64) -> Result<Vec<AnalysisItemRecord>, sqlx::Error> {
        sqlx::query_as::<_, AnalysisItemRecord>(
            "SELECT * FROM content_analysis_items WHERE job_id = ? ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(self.pool())
        .await
    }

    async fn list_items_by_phase(&self, job_id: i64, phase: &str) -> Result<Vec<AnalysisItemRecord>, sqlx::Error> {
        sqlx::query_as::<_, AnalysisItemRecord>(
            "SELECT * FROM content_analysis_items WHERE job_id = ? AND phase = ? ORDER BY id",
        )
        .bind(job_id)
        .bind(phase)
        .fetch_all(self.pool())
        .await
    }

    async fn get_item(&self, item_id: i64) -> Result<Option<AnalysisItemRecord>, sqlx::Error> {
        sqlx::query_as::<_, AnalysisItemRecord>("SELECT * FROM content_analysis_items WHERE id = ?")
            .bind(item_id)
            .fetch_optional(self.pool())
            .await
    }

    async fn resolve_item(
        &self,
        item_id: i64,
        resolution: &str,
        resolved_entity_id: Option<&str>,
        entity_name: Option<&str>,
        entity_type: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE content_analysis_items
            SET resolution = ?, resolved_entity_id = ?, entity_name = ?, entity_type = ?
            WHERE id = ?
            "#,
        )
        .bind(resolution)
        .bind(resolved_entity_id)
        .bind(entity_name)
        .bind(entity_type)
        .bind(item_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn revert_item(&self, item_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE content_analysis_items
            SET resolution = 'pending', resolved_entity_id = NULL, entity_name = NULL, entity_type = NULL
            WHERE id = ?
            "#,
        )
        .bind(item_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn count_pending(&self, job_id: i64) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM content_analysis_items WHERE job_id = ? AND resolution = 'pending'",
        )
        .bind(job_id)
        .fetch_one(self.pool())
        .await?;
        Ok(row.0)
    }

    /// Recomputes both phase counters from the item table — `resolved_items`
    /// for phase='identification' and `enrichment_resolved` for
    /// phase='enrichment' — so resolving an item of either phase keeps its
    /// counter correct regardless of which phase it belongs to.
    async fn recompute_resolved_items(&self, job_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE content_analysis_jobs
            SET resolved_items = (
                SELECT COUNT(*) FROM content_analysis_items
                WHERE job_id = ? AND phase = 'identification' AND resolution != 'pending'
            ),
            enrichment_resolved = (
                SELECT COUNT(*) FROM content_analysis_items
                WHERE job_id = ? AND phase = 'enrichment' AND resolution != 'pending'
            )
            WHERE id = ?
            "#,
        )
        .bind(job_id)
        .bind(job_id)
        .bind(job_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn update_job_status(&self, job_id: i64, status: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE content_analysis_jobs SET status = ? WHERE id = ?")
            .bind(status)
            .bind(job_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn update_enrichment_progress(&self, job_id: i64, total: i64, resolved: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE content_analysis_jobs SET enrichment_total = ?, enrichment_resolved = ? WHERE id = ?",
        )
        .bind(total)
        .bind(resolved)
        .bind(job_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
