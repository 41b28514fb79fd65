//! Resolver (C4).
//!
//! Applies a GM decision to an item: creates/links entities, rewrites
//! source text, updates counts.

use crate::core::scanner::find_wiki_link_spans;
use crate::core::source_store;
use crate::database::{EntityOps, EntityRecord, JobOps};
use crate::database::Database;
use crate::error::{AppError, AppResult};
use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum Decision {
    Accepted,
    NewEntity { entity_name: String, entity_type: String },
    Dismissed,
}

impl Decision {
    pub fn resolution_str(&self) -> &'static str {
        match self {
            Decision::Accepted => "accepted",
            Decision::NewEntity { .. } => "new_entity",
            Decision::Dismissed => "dismissed",
        }
    }
}

/// Parses the `{resolution, entityType?, entityName?}` request body into
/// a [`Decision`], enforcing that `new_entity` carries non-empty name
/// and type.
pub fn parse_decision(
    resolution: &str,
    entity_name: Option<String>,
    entity_type: Option<String>,
) -> AppResult<Decision> {
    match resolution {
        "accepted" => Ok(Decision::Accepted),
        "dismissed" => Ok(Decision::Dismissed),
        "new_entity" => {
            let name = entity_name.filter(|n| !n.trim().is_empty());
            let kind = entity_type.filter(|t| !t.trim().is_empty());
            match (name, kind) {
                (Some(entity_name), Some(entity_type)) => Ok(Decision::NewEntity { entity_name, entity_type }),
                _ => Err(AppError::InvalidRequest(
                    "new_entity requires non-empty entityName and entityType".to_string(),
                )),
            }
        }
        other => Err(AppError::InvalidRequest(format!("unknown resolution {other}"))),
    }
}

/// Resolves one item within `campaign_id`, applying `decision`. See
/// §4.4 for the full contract. Rejects items that are not `campaign_id`'s
/// or that are not currently `pending`.
pub async fn resolve(db: &Database, campaign_id: &str, item_id: i64, decision: Decision) -> AppResult<()> {
    let item = db.get_item(item_id).await?.ok_or(AppError::NotFound)?;
    let job = db.get_job(item.job_id).await?.ok_or(AppError::NotFound)?;
    if job.campaign_id != campaign_id {
        return Err(AppError::NotFound);
    }
    if item.resolution != "pending" {
        return Err(AppError::Conflict("item is not pending".to_string()));
    }

    let now = Utc::now().to_rfc3339();
    let (resolved_entity_id, entity_name, entity_type) = match &decision {
        Decision::Dismissed => (None, None, None),
        Decision::Accepted => {
            if let Some(entity_id) = &item.entity_id {
                let entity = db.get_entity(entity_id).await?;
                let (name, kind) = entity
                    .map(|e| (Some(e.name), Some(e.entity_type)))
                    .unwrap_or((None, None));
                (Some(entity_id.clone()), name, kind)
            } else {
                (None, None, None)
            }
        }
        Decision::NewEntity { entity_name, entity_type } => {
            let description = item
                .suggested_content_json
                .as_deref()
                .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
                .and_then(|v| v.get("description").and_then(|d| d.as_str()).map(str::to_string))
                .filter(|d| !d.is_empty());

            let new_id = Uuid::new_v4().to_string();
            db.create_entity(&EntityRecord {
                id: new_id.clone(),
                campaign_id: campaign_id.to_string(),
                entity_type: entity_type.clone(),
                name: entity_name.clone(),
                description,
                gm_notes: None,
                attributes_json: "{}".to_string(),
                tags_json: "[]".to_string(),
                source_confidence: "draft".to_string(),
                created_at: now.clone(),
                updated_at: now.clone(),
            })
            .await?;
            (Some(new_id), Some(entity_name.clone()), Some(entity_type.clone()))
        }
    };

    db.resolve_item(
        item_id,
        decision.resolution_str(),
        resolved_entity_id.as_deref(),
        entity_name.as_deref(),
        entity_type.as_deref(),
    )
    .await?;

    if matches!(decision, Decision::Accepted | Decision::NewEntity { .. }) {
        apply_text_fix(db, campaign_id, &job, &item, &decision, entity_name.as_deref()).await?;
    }

    db.recompute_resolved_items(job.id).await?;
    Ok(())
}

async fn apply_text_fix(
    db: &Database,
    campaign_id: &str,
    job: &crate::database::AnalysisJobRecord,
    item: &crate::database::AnalysisItemRecord,
    decision: &Decision,
    canonical_name: Option<&str>,
) -> AppResult<()> {
    let pool = db.pool();

    // A wiki_link_unresolved item's positions already point at the name
    // inside an existing [[...]] — wrapping that span again would produce
    // a malformed [[[[name]]]]. Only untagged mentions and misspellings,
    // whose positions point at plain text, need the positional rewrite.
    let already_linked = item.detection_type == "wiki_link_unresolved";

    match (item.position_start, item.position_end) {
        (Some(start), Some(end)) if !already_linked => {
            let Some(name) = canonical_name else { return Ok(()) };
            let text = source_store::fetch(pool, campaign_id, &job.source_table, &job.source_field, &job.source_id).await?;
            let (start, end) = (start as usize, end as usize);
            if end > text.len() || start > end {
                return Ok(());
            }
            let mut new_text = String::with_capacity(text.len() + name.len() + 4);
            new_text.push_str(&text[..start]);
            new_text.push_str("[[");
            new_text.push_str(name);
            new_text.push_str("]]");
            new_text.push_str(&text[end..]);
            let now = Utc::now().to_rfc3339();
            source_store::write(pool, campaign_id, &job.source_table, &job.source_field, &job.source_id, &new_text, &now).await?;
        }
        _ => {
            if let (Decision::NewEntity { .. }, Some(name)) = (decision, canonical_name) {
                let text = source_store::fetch(pool, campaign_id, &job.source_table, &job.source_field, &job.source_id).await?;
                let new_text = global_wiki_link_insert(&text, name);
                if new_text != text {
                    let now = Utc::now().to_rfc3339();
                    source_store::write(pool, campaign_id, &job.source_table, &job.source_field, &job.source_id, &new_text, &now).await?;
                }
            }
        }
    }
    Ok(())
}

/// Global word-boundary replacement: wraps every literal, word-boundary
/// delimited occurrence of `name` not already inside a `[[...]]` span in
/// wiki-link brackets. Processed in reverse textual order so earlier
/// offsets stay valid.
fn global_wiki_link_insert(text: &str, name: &str) -> String {
    let escaped = regex::escape(name);
    let Ok(re) = Regex::new(&format!(r"\b{escaped}\b")) else {
        return text.to_string();
    };
    let existing_spans = find_wiki_link_spans(text);

    let mut matches: Vec<(usize, usize)> = re.find_iter(text).map(|m| (m.start(), m.end())).collect();
    matches.retain(|&(s, e)| !existing_spans.iter().any(|&(ls, le)| s >= ls && e <= le));
    matches.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = text.to_string();
    for (start, end) in matches {
        let replacement = format!("[[{}]]", &out[start..end]);
        out.replace_range(start..end, &replacement);
    }
    out
}

/// Returns an item to `pending`, undoing counters but never undoing a
/// text fix already applied — see the spec's documented asymmetry
/// (Open Question b).
pub async fn revert(db: &Database, campaign_id: &str, item_id: i64) -> AppResult<()> {
    let item = db.get_item(item_id).await?.ok_or(AppError::NotFound)?;
    let job = db.get_job(item.job_id).await?.ok_or(AppError::NotFound)?;
    if job.campaign_id != campaign_id {
        return Err(AppError::NotFound);
    }
    db.revert_item(item_id).await?;
    db.recompute_resolved_items(job.id).await?;
    Ok(())
}

/// Applies one decision kind to every pending item in a job.
pub async fn resolve_all(db: &Database, campaign_id: &str, job_id: i64, resolution: &str) -> AppResult<usize> {
    let job = db.get_job(job_id).await?.ok_or(AppError::NotFound)?;
    if job.campaign_id != campaign_id {
        return Err(AppError::NotFound);
    }
    if resolution == "new_entity" {
        return Err(AppError::InvalidRequest(
            "batch resolve does not support new_entity (needs a name per item)".to_string(),
        ));
    }
    let decision = parse_decision(resolution, None, None)?;
    let items = db.list_items(job_id).await?;
    let mut count = 0;
    for item in items.into_iter().filter(|i| i.resolution == "pending") {
        resolve(db, campaign_id, item.id, decision.clone()).await?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::CampaignOps;
    use crate::core::jobs;

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
    async fn resolve_new_entity_with_position_rewrites_source() {
        let db = Database::new_in_memory().await.unwrap();
        let campaign_id = setup_campaign(&db).await;
        let (job, items) = jobs::analyse(&db, &campaign_id, "campaigns", "description", &campaign_id, "[[Ymora]] arrived.")
            .await
            .unwrap();
        assert_eq!(items.len(), 1);

        resolve(
            &db,
            &campaign_id,
            items[0].id,
            Decision::NewEntity {
                entity_name: "Ymora".to_string(),
                entity_type: "npc".to_string(),
            },
        )
        .await
        .unwrap();

        let text = source_store::fetch(db.pool(), &campaign_id, "campaigns", "description", &campaign_id)
            .await
            .unwrap();
        assert_eq!(text, "[[Ymora]] arrived.");

        let reverted = db.get_item(items[0].id).await.unwrap().unwrap();
        assert_eq!(reverted.resolution, "new_entity");
        let _ = job;
    }

    #[tokio::test]
    async fn double_resolve_is_rejected_as_conflict() {
        let db = Database::new_in_memory().await.unwrap();
        let campaign_id = setup_campaign(&db).await;
        let (_, items) = jobs::analyse(&db, &campaign_id, "campaigns", "description", &campaign_id, "[[Ymora]] arrived.")
            .await
            .unwrap();

        resolve(&db, &campaign_id, items[0].id, Decision::Dismissed).await.unwrap();
        let second = resolve(&db, &campaign_id, items[0].id, Decision::Dismissed).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[test]
    fn global_insert_skips_already_linked_occurrence() {
        let text = "[[Viktor]] met Elara. Viktor smiled.";
        let out = global_wiki_link_insert(text, "Viktor");
        assert_eq!(out, "[[Viktor]] met Elara. [[Viktor]] smiled.");
    }

    #[test]
    fn global_insert_is_a_noop_second_time() {
        let once = global_wiki_link_insert("Viktor met Elara. Viktor smiled.", "Viktor");
        let twice = global_wiki_link_insert(&once, "Viktor");
        assert_eq!(once, twice);
    }
}
