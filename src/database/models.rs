//! Database Models
//!
//! SQLite record types for structured data storage. These mirror the
//! tables created in [`super::migrations`] field-for-field; higher layers
//! (core components, handlers) convert them into their own domain types
//! rather than passing these across the HTTP boundary directly.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CampaignRecord {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EntityRecord {
    pub id: String,
    pub campaign_id: String,
    pub entity_type: String,
    pub name: String,
    pub description: Option<String>,
    pub gm_notes: Option<String>,
    pub attributes_json: String,
    pub tags_json: String,
    pub source_confidence: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChapterRecord {
    pub id: String,
    pub campaign_id: String,
    pub overview: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub chapter_id: String,
    pub prep_notes: Option<String>,
    pub actual_notes: Option<String>,
    pub updated_at: String,
}

/// One row of `content_analysis_jobs` — the C3 job registry's persistence.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJobRecord {
    pub id: i64,
    pub campaign_id: String,
    pub source_table: String,
    pub source_id: String,
    pub source_field: String,
    pub status: String,
    pub total_items: i64,
    pub resolved_items: i64,
    pub enrichment_total: i64,
    pub enrichment_resolved: i64,
    pub created_at: String,
}

/// One row of `content_analysis_items` — a single detected mention (C1
/// output) or enrichment suggestion (C6 output), depending on `phase`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisItemRecord {
    pub id: i64,
    pub job_id: i64,
    pub phase: String,
    pub detection_type: String,
    pub matched_text: String,
    pub entity_id: Option<String>,
    pub similarity: Option<f64>,
    pub context_snippet: Option<String>,
    pub position_start: Option<i64>,
    pub position_end: Option<i64>,
    pub suggested_content_json: Option<String>,
    pub resolution: String,
    pub resolved_entity_id: Option<String>,
    pub entity_name: Option<String>,
    pub entity_type: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EntityLogRecord {
    pub id: String,
    pub entity_id: String,
    pub campaign_id: String,
    pub content: String,
    pub confirmed: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RelationshipRecord {
    pub id: String,
    pub campaign_id: String,
    pub source_entity_id: String,
    pub target_entity_id: String,
    pub relationship_type: String,
    pub symmetric: bool,
    pub tone: Option<String>,
    pub strength: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConstraintOverrideRecord {
    pub id: String,
    pub campaign_id: String,
    pub constraint_type: String,
    pub override_key: String,
    pub created_at: String,
}

/// One row of `content_chunks` — a retrievable unit for the context
/// builder's (C5) lexical leg.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentChunkRecord {
    pub id: i64,
    pub campaign_id: Option<String>,
    pub chunk_kind: String,
    pub source_table: Option<String>,
    pub source_id: Option<String>,
    pub entity_id: Option<String>,
    pub entity_name: Option<String>,
    pub chunk_text: String,
    pub created_at: String,
}
