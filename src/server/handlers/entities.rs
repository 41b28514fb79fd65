use super::require_owner;
use crate::core::gm_filter::{self, EntityView};
use crate::core::jobs;
use crate::database::EntityOps;
use crate::error::{AppError, AppResult};
use crate::server::{AppState, AuthUser};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveHit {
    #[serde(flatten)]
    entity: EntityView,
    similarity: f64,
}

/// `GET …/entities/resolve?name=&limit=` — fuzzy name search used by
/// UI autocomplete and the resolver's "which entity did you mean"
/// flow. Backed by the same [`crate::core::scanner::FuzzyNameIndex`]
/// the scanner uses.
pub async fn resolve(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(campaign_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<Vec<ResolveHit>>> {
    require_owner(&state.db, &campaign_id, &user_id).await?;

    let name = query.get("name").cloned().unwrap_or_default();
    if name.trim().chars().count() < 3 {
        return Err(AppError::InvalidRequest("name must be at least 3 characters".to_string()));
    }
    let limit: usize = match query.get("limit") {
        Some(raw) => raw.parse().map_err(|_| AppError::InvalidRequest("limit must be an integer".to_string()))?,
        None => 20,
    };
    if limit == 0 || limit > 20 {
        return Err(AppError::InvalidRequest("limit must be between 1 and 20".to_string()));
    }

    let index = jobs::build_fuzzy_index(&state.db, &campaign_id).await?;
    let matches = index.top_matches(&name, limit);

    let mut hits = Vec::with_capacity(matches.len());
    for m in matches {
        if let Some(entity) = state.db.get_entity(&m.entity.id).await? {
            // require_owner above already established the caller owns this
            // campaign, so the GM-only fields are in scope here.
            hits.push(ResolveHit {
                entity: gm_filter::filter_entity(&entity, true),
                similarity: m.similarity,
            });
        }
    }
    Ok(Json(hits))
}
