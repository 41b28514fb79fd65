//! Campaign ontology: the closed entity-type set and the relationship
//! types the Graph-Expert agent validates proposals against. Grounded
//! in the closed-enum-with-escape-hatch shape the corpus uses for its
//! own campaign relationship types, but trimmed to what the data model
//! actually names.

use serde::{Deserialize, Serialize};

pub const ENTITY_TYPES: &[&str] = &[
    "npc",
    "location",
    "item",
    "faction",
    "clue",
    "creature",
    "organisation",
    "event",
    "document",
    "other",
];

/// Domain/range constraint for one relationship type: which entity
/// types may appear as source and target, and how many outgoing edges
/// of this type a single source entity may hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipConstraint {
    pub relationship_type: String,
    pub allowed_source_types: Vec<String>,
    pub allowed_target_types: Vec<String>,
    pub max_per_source: Option<usize>,
    /// Source entity types that must have at least one outgoing edge
    /// of this relationship type. Empty for most relationship types.
    pub required_for_source_types: Vec<String>,
}

/// A campaign's game-system schema: the valid entity types (currently
/// fixed across all game systems) plus the allowed relationship types
/// with their domain/range constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ontology {
    pub entity_types: Vec<String>,
    pub relationships: Vec<RelationshipConstraint>,
}

impl Ontology {
    /// The default ontology shipped for every campaign regardless of
    /// `gameSystem` — system-specific schemas are an open extension
    /// point, not yet backed by configuration.
    pub fn default_for_system(_game_system: &str) -> Self {
        let locations = vec!["location".to_string()];
        let any = ENTITY_TYPES.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            entity_types: ENTITY_TYPES.iter().map(|s| s.to_string()).collect(),
            relationships: vec![
                RelationshipConstraint {
                    relationship_type: "ally_of".to_string(),
                    allowed_source_types: vec!["npc".to_string(), "faction".to_string(), "organisation".to_string()],
                    allowed_target_types: vec!["npc".to_string(), "faction".to_string(), "organisation".to_string()],
                    max_per_source: None,
                    required_for_source_types: vec![],
                },
                RelationshipConstraint {
                    relationship_type: "enemy_of".to_string(),
                    allowed_source_types: vec!["npc".to_string(), "faction".to_string(), "organisation".to_string()],
                    allowed_target_types: vec!["npc".to_string(), "faction".to_string(), "organisation".to_string()],
                    max_per_source: None,
                    required_for_source_types: vec![],
                },
                RelationshipConstraint {
                    relationship_type: "member_of".to_string(),
                    allowed_source_types: vec!["npc".to_string(), "creature".to_string()],
                    allowed_target_types: vec!["faction".to_string(), "organisation".to_string()],
                    max_per_source: Some(1),
                    required_for_source_types: vec![],
                },
                RelationshipConstraint {
                    relationship_type: "located_at".to_string(),
                    allowed_source_types: any.clone(),
                    allowed_target_types: locations.clone(),
                    max_per_source: Some(1),
                    required_for_source_types: vec!["npc".to_string()],
                },
                RelationshipConstraint {
                    relationship_type: "owns".to_string(),
                    allowed_source_types: vec!["npc".to_string(), "faction".to_string(), "organisation".to_string()],
                    allowed_target_types: vec!["item".to_string()],
                    max_per_source: None,
                    required_for_source_types: vec![],
                },
                RelationshipConstraint {
                    relationship_type: "leads".to_string(),
                    allowed_source_types: vec!["npc".to_string()],
                    allowed_target_types: vec!["faction".to_string(), "organisation".to_string()],
                    max_per_source: Some(1),
                    required_for_source_types: vec![],
                },
                RelationshipConstraint {
                    relationship_type: "related_to".to_string(),
                    allowed_source_types: any.clone(),
                    allowed_target_types: any,
                    max_per_source: None,
                    required_for_source_types: vec![],
                },
            ],
        }
    }

    pub fn is_valid_entity_type(&self, entity_type: &str) -> bool {
        self.entity_types.iter().any(|t| t == entity_type)
    }

    pub fn constraint_for(&self, relationship_type: &str) -> Option<&RelationshipConstraint> {
        self.relationships.iter().find(|r| r.relationship_type == relationship_type)
    }

    /// Checks a proposed `(relationshipType, sourceType, targetType)`
    /// triple against domain/range constraints. Unknown relationship
    /// types are rejected rather than silently allowed.
    pub fn validate_pair(&self, relationship_type: &str, source_type: &str, target_type: &str) -> bool {
        match self.constraint_for(relationship_type) {
            Some(c) => {
                c.allowed_source_types.iter().any(|t| t == source_type)
                    && c.allowed_target_types.iter().any(|t| t == target_type)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ontology_covers_all_entity_types() {
        let ontology = Ontology::default_for_system("generic");
        assert_eq!(ontology.entity_types.len(), ENTITY_TYPES.len());
    }

    #[test]
    fn member_of_rejects_location_source() {
        let ontology = Ontology::default_for_system("generic");
        assert!(!ontology.validate_pair("member_of", "location", "faction"));
        assert!(ontology.validate_pair("member_of", "npc", "faction"));
    }

    #[test]
    fn unknown_relationship_type_is_invalid() {
        let ontology = Ontology::default_for_system("generic");
        assert!(!ontology.validate_pair("betrays", "npc", "npc"));
    }
}
