use super::require_owner;
use crate::core::{jobs, pipeline, resolver, source_store, stream};
use crate::database::source_fields::SourceField;
use crate::error::{AppError, AppResult};
use crate::server::{AppState, AuthUser};
use axum::extract::{Path, Query, State};
use axum::response::sse::{KeepAlive, Sse};
use axum::Json;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub source_table: String,
    pub source_field: String,
    pub source_id: String,
}

pub async fn trigger(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(campaign_id): Path<String>,
    Json(body): Json<TriggerRequest>,
) -> AppResult<Json<serde_json::Value>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;

    if SourceField::parse(&body.source_table, &body.source_field).is_none() {
        return Err(AppError::InvalidRequest(format!(
            "unsupported source: {}.{}",
            body.source_table, body.source_field
        )));
    }

    let content = source_store::fetch(state.db.pool(), &campaign_id, &body.source_table, &body.source_field, &body.source_id).await?;
    let (job, items) = jobs::analyse(&state.db, &campaign_id, &body.source_table, &body.source_field, &body.source_id, &content).await?;

    Ok(Json(serde_json::json!({ "job": job, "items": items })))
}

pub async fn list_jobs(State(state): State<AppState>, AuthUser(user_id): AuthUser, Path(campaign_id): Path<String>) -> AppResult<Json<serde_json::Value>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;
    let jobs = jobs::list_jobs_for_campaign(&state.db, &campaign_id).await?;
    Ok(Json(serde_json::json!(jobs)))
}

pub async fn get_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((campaign_id, job_id)): Path<(String, i64)>,
) -> AppResult<Json<serde_json::Value>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;
    let job = jobs::get_job_scoped(&state.db, &campaign_id, job_id).await?;
    Ok(Json(serde_json::json!(job)))
}

pub async fn list_items(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((campaign_id, job_id)): Path<(String, i64)>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<serde_json::Value>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;
    jobs::get_job_scoped(&state.db, &campaign_id, job_id).await?;
    let items = jobs::list_items_filtered(&state.db, job_id, query.get("resolution").map(String::as_str), query.get("phase").map(String::as_str)).await?;
    Ok(Json(serde_json::json!(items)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub resolution: String,
    pub entity_type: Option<String>,
    pub entity_name: Option<String>,
}

pub async fn resolve_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((campaign_id, item_id)): Path<(String, i64)>,
    Json(body): Json<ResolveRequest>,
) -> AppResult<Json<serde_json::Value>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;
    let decision = resolver::parse_decision(&body.resolution, body.entity_name, body.entity_type)?;
    resolver::resolve(&state.db, &campaign_id, item_id, decision).await?;
    Ok(Json(serde_json::json!({ "status": "resolved" })))
}

pub async fn revert_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((campaign_id, item_id)): Path<(String, i64)>,
) -> AppResult<Json<serde_json::Value>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;
    resolver::revert(&state.db, &campaign_id, item_id).await?;
    Ok(Json(serde_json::json!({ "status": "reverted" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveAllRequest {
    pub resolution: String,
}

pub async fn resolve_all(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((campaign_id, job_id)): Path<(String, i64)>,
    Json(body): Json<ResolveAllRequest>,
) -> AppResult<Json<serde_json::Value>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;
    let count = resolver::resolve_all(&state.db, &campaign_id, job_id, &body.resolution).await?;
    Ok(Json(serde_json::json!({ "resolved": count })))
}

pub async fn pending_count(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(campaign_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<serde_json::Value>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;
    let source_table = query.get("sourceTable").ok_or_else(|| AppError::InvalidRequest("sourceTable is required".to_string()))?;
    let source_field = query.get("sourceField").ok_or_else(|| AppError::InvalidRequest("sourceField is required".to_string()))?;
    let source_id = query.get("sourceId").ok_or_else(|| AppError::InvalidRequest("sourceId is required".to_string()))?;
    let count = jobs::pending_count(&state.db, &campaign_id, source_table, source_field, source_id).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

/// Game-system schemas are a pass-through surface external to this
/// service; every campaign gets the same default ontology until that
/// surface is wired up.
const DEFAULT_GAME_SYSTEM: &str = "generic";

pub async fn enrich(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((campaign_id, job_id)): Path<(String, i64)>,
) -> AppResult<Json<serde_json::Value>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;

    let Some(provider) = state.provider.clone() else {
        return Err(AppError::InvalidRequest("no LLM configured".to_string()));
    };

    let job = jobs::get_job_scoped(&state.db, &campaign_id, job_id).await?;
    if job.status == "enriching" {
        return Err(AppError::Conflict("enrichment already running for this job".to_string()));
    }

    let outcome = pipeline::trigger(
        state.db.clone(),
        provider,
        state.lexical_index.clone(),
        campaign_id,
        job_id,
        DEFAULT_GAME_SYSTEM.to_string(),
        state.config.enrichment.clone(),
        state.config.rag.clone(),
    )
    .await?;

    Ok(Json(match outcome {
        pipeline::TriggerOutcome::NoEntities => {
            serde_json::json!({ "status": "no_entities", "message": "No accepted entities to enrich" })
        }
        pipeline::TriggerOutcome::Enriching { entity_count } => {
            serde_json::json!({ "status": "enriching", "entityCount": entity_count })
        }
    }))
}

pub async fn enrichment_stream(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((campaign_id, job_id)): Path<(String, i64)>,
) -> AppResult<Sse<impl tokio_stream::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;
    jobs::get_job_scoped(&state.db, &campaign_id, job_id).await?;

    let tick = Duration::from_millis(state.config.sse.tick_ms);
    let timeout = Duration::from_secs(state.config.sse.timeout_secs);
    let events = stream::enrichment_stream(state.db.clone(), job_id, tick, timeout);
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
