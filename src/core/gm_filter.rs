//! GM-only field filtering (P5).
//!
//! `gmNotes` must never appear in a response unless the requester owns
//! the campaign. This is applied at the boundary between the database
//! row and the JSON view sent to the client, never baked into storage.

use crate::database::EntityRecord;
use serde::Serialize;

/// Entity view returned over HTTP. `gm_notes` is only ever `Some` when
/// the caller has already established ownership.
#[derive(Debug, Clone, Serialize)]
pub struct EntityView {
    pub id: String,
    pub campaign_id: String,
    pub entity_type: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gm_notes: Option<String>,
    pub attributes: serde_json::Value,
    pub tags: serde_json::Value,
    pub source_confidence: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Renders `record` for a requester who either is or is not the
/// campaign owner. Call this instead of hand-serialising `EntityRecord`
/// anywhere a response reaches an HTTP client.
pub fn filter_entity(record: &EntityRecord, is_owner: bool) -> EntityView {
    EntityView {
        id: record.id.clone(),
        campaign_id: record.campaign_id.clone(),
        entity_type: record.entity_type.clone(),
        name: record.name.clone(),
        description: record.description.clone(),
        gm_notes: if is_owner { record.gm_notes.clone() } else { None },
        attributes: serde_json::from_str(&record.attributes_json).unwrap_or(serde_json::Value::Null),
        tags: serde_json::from_str(&record.tags_json).unwrap_or(serde_json::Value::Null),
        source_confidence: record.source_confidence.clone(),
        created_at: record.created_at.clone(),
        updated_at: record.updated_at.clone(),
    }
}

pub fn filter_entities(records: &[EntityRecord], is_owner: bool) -> Vec<EntityView> {
    records.iter().map(|r| filter_entity(r, is_owner)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_record() -> EntityRecord {
        let now = Utc::now().to_rfc3339();
        EntityRecord {
            id: "e1".to_string(),
            campaign_id: "c1".to_string(),
            entity_type: "npc".to_string(),
            name: "Viktor".to_string(),
            description: Some("A ranger.".to_string()),
            gm_notes: Some("Secretly a spy.".to_string()),
            attributes_json: "{}".to_string(),
            tags_json: "[]".to_string(),
            source_confidence: "draft".to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn owner_sees_gm_notes() {
        let view = filter_entity(&sample_record(), true);
        assert_eq!(view.gm_notes.as_deref(), Some("Secretly a spy."));
    }

    #[test]
    fn non_owner_never_sees_gm_notes() {
        let view = filter_entity(&sample_record(), false);
        assert_eq!(view.gm_notes, None);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("gm_notes"));
    }
}
