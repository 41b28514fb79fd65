//! Analysis Jobs Registry (C3).
//!
//! Creates, supersedes, queries, and mutates jobs and items; enforces
//! the job/item state machine described in the data model.

use crate::core::scanner::{scan, DetectionType, EntityCandidate, FuzzyNameIndex};
use crate::database::{
    AnalysisItemRecord, AnalysisJobRecord, ChunkOps, Database, EntityOps, JobOps, NewAnalysisItem,
};
use crate::error::{AppError, AppResult};
use chrono::Utc;

impl DetectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionType::WikiLinkUnresolved => "wiki_link_unresolved",
            DetectionType::UntaggedMention => "untagged_mention",
            DetectionType::Misspelling => "misspelling",
            DetectionType::PotentialAlias => "potential_alias",
        }
    }
}

pub const PHASE_IDENTIFICATION: &str = "identification";
pub const PHASE_ENRICHMENT: &str = "enrichment";

/// Builds a [`FuzzyNameIndex`] over every entity currently in
/// `campaign_id`. Rebuilt fresh for every scan — the spec requires no
/// cross-request cache.
pub async fn build_fuzzy_index(db: &Database, campaign_id: &str) -> AppResult<FuzzyNameIndex> {
    let entities = db.list_entities_for_campaign(campaign_id).await?;
    Ok(FuzzyNameIndex::new(
        entities
            .into_iter()
            .map(|e| EntityCandidate { id: e.id, name: e.name })
            .collect(),
    ))
}

/// Runs the full supersede-then-scan cycle for one source tuple (§4.3).
/// Deletes any prior job for the exact four-tuple (cascading its
/// items), scans `content`, and persists a fresh job with its items —
/// even when the scan finds nothing, so the UI can show "no items".
pub async fn analyse(
    db: &Database,
    campaign_id: &str,
    source_table: &str,
    source_field: &str,
    source_id: &str,
    content: &str,
) -> AppResult<(AnalysisJobRecord, Vec<AnalysisItemRecord>)> {
    if let Some(existing) = db
        .find_job_by_source(campaign_id, source_table, source_id, source_field)
        .await?
    {
        db.delete_job(existing.id).await?;
    }

    let index = build_fuzzy_index(db, campaign_id).await?;
    let scanned = scan(content, &index);

    let created_at = Utc::now().to_rfc3339();
    let job_id = db
        .create_job(campaign_id, source_table, source_id, source_field, &created_at)
        .await?;

    let new_items: Vec<NewAnalysisItem> = scanned
        .into_iter()
        .map(|item| NewAnalysisItem {
            phase: PHASE_IDENTIFICATION.to_string(),
            detection_type: item.detection_type.as_str().to_string(),
            matched_text: item.matched_text,
            entity_id: item.entity_id,
            similarity: item.similarity,
            context_snippet: item.context_snippet,
            position_start: item.position_start,
            position_end: item.position_end,
            suggested_content_json: None,
        })
        .collect();

    if !new_items.is_empty() {
        db.insert_items(job_id, &new_items, &created_at).await?;
    }

    let job = db.get_job(job_id).await?.ok_or(AppError::Internal(anyhow::anyhow!(
        "job {job_id} vanished immediately after creation"
    )))?;
    let items = db.list_items(job_id).await?;

    // Chunk the freshly analysed text into the lexical index so the
    // context builder (C5) can retrieve it once enrichment runs.
    let _ = db
        .add_chunk(&crate::database::ContentChunkRecord {
            id: 0,
            campaign_id: Some(campaign_id.to_string()),
            chunk_kind: "campaign".to_string(),
            source_table: Some(source_table.to_string()),
            source_id: Some(source_id.to_string()),
            entity_id: None,
            entity_name: None,
            chunk_text: content.to_string(),
            created_at: created_at.clone(),
        })
        .await;

    Ok((job, items))
}

/// List all jobs for a campaign (ownership is checked by the caller).
pub async fn list_jobs_for_campaign(db: &Database, campaign_id: &str) -> AppResult<Vec<AnalysisJobRecord>> {
    sqlx::query_as::<_, AnalysisJobRecord>(
        "SELECT * FROM content_analysis_jobs WHERE campaign_id = ? ORDER BY created_at DESC",
    )
    .bind(campaign_id)
    .fetch_all(db.pool())
    .await
    .map_err(AppError::from)
}

pub async fn get_job_scoped(db: &Database, campaign_id: &str, job_id: i64) -> AppResult<AnalysisJobRecord> {
    let job = db.get_job(job_id).await?.ok_or(AppError::NotFound)?;
    if job.campaign_id != campaign_id {
        return Err(AppError::NotFound);
    }
    Ok(job)
}

/// List items for a job, optionally filtered by `resolution` and
/// `phase`.
pub async fn list_items_filtered(
    db: &Database,
    job_id: i64,
    resolution: Option<&str>,
    phase: Option<&str>,
) -> AppResult<Vec<AnalysisItemRecord>> {
    let items = db.list_items(job_id).await?;
    Ok(items
        .into_iter()
        .filter(|item| resolution.map(|r| item.resolution == r).unwrap_or(true))
        .filter(|item| phase.map(|p| item.phase == p).unwrap_or(true))
        .collect())
}

pub async fn pending_count(
    db: &Database,
    campaign_id: &str,
    source_table: &str,
    source_field: &str,
    source_id: &str,
) -> AppResult<i64> {
    let Some(job) = db
        .find_job_by_source(campaign_id, source_table, source_id, source_field)
        .await?
    else {
        return Ok(0);
    };
    Ok(db.count_pending(job.id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::CampaignOps;
    use chrono::Utc;
    use uuid::Uuid;

    async fn setup_campaign(db: &Database) -> String {
        let owner = Uuid::new_v4().to_string();
        let campaign_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO users (id, created_at) VALUES (?, ?)")
            .bind(&owner)
            .bind(&now)
            .execute(db.pool())
            .await
            .unwrap();
        db.create_campaign(&crate::database::CampaignRecord {
            id: campaign_id.clone(),
            owner_user_id: owner,
            name: "Test".to_string(),
            description: None,
            created_at: now.clone(),
            updated_at: now,
        })
        .await
        .unwrap();
        campaign_id
    }

    #[tokio::test]
    async fn analyse_creates_job_even_with_zero_items() {
        let db = Database::new_in_memory().await.unwrap();
        let campaign_id = setup_campaign(&db).await;
        let (job, items) = analyse(&db, &campaign_id, "campaigns", "description", &campaign_id, "nothing special here")
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(job.total_items, 0);
        assert_eq!(job.status, "completed");
    }

    #[tokio::test]
    async fn analyse_supersedes_prior_job_for_same_tuple() {
        let db = Database::new_in_memory().await.unwrap();
        let campaign_id = setup_campaign(&db).await;
        let (first, _) = analyse(&db, &campaign_id, "campaigns", "description", &campaign_id, "[[Ymora]] arrived.")
            .await
            .unwrap();
        let (second, _) = analyse(&db, &campaign_id, "campaigns", "description", &campaign_id, "nothing here now")
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        assert!(db.get_job(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_job_scoped_rejects_cross_campaign_access() {
        let db = Database::new_in_memory().await.unwrap();
        let campaign_a = setup_campaign(&db).await;
        let campaign_b = setup_campaign(&db).await;
        let (job, _) = analyse(&db, &campaign_a, "campaigns", "description", &campaign_a, "some text")
            .await
            .unwrap();

        assert!(get_job_scoped(&db, &campaign_a, job.id).await.is_ok());
        let result = get_job_scoped(&db, &campaign_b, job.id).await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn pending_count_is_zero_without_a_job() {
        let db = Database::new_in_memory().await.unwrap();
        let campaign_id = setup_campaign(&db).await;
        let count = pending_count(&db, &campaign_id, "campaigns", "description", &campaign_id).await.unwrap();
        assert_eq!(count, 0);
    }
}
