use super::Agent;
use crate::core::pipeline::{existing_outgoing_count, llm::LlmProvider, PipelineContext, PipelineItem};
use crate::database::ConstraintOverrideOps;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RelationshipProposal {
    #[serde(rename = "sourceEntityId")]
    source_entity_id: String,
    #[serde(rename = "sourceType")]
    source_type: String,
    #[serde(rename = "targetEntityId")]
    target_entity_id: String,
    #[serde(rename = "targetType")]
    target_type: String,
    #[serde(rename = "relationshipType")]
    relationship_type: String,
}

/// Validates any `relationship_suggestion` items already in the
/// evolving pipeline input against the campaign's ontology: domain and
/// range types, per-source cardinality, and required relationships.
/// `ConstraintOverride` suppresses findings the GM has already
/// acknowledged for this campaign.
pub struct GraphExpertAgent;

#[async_trait]
impl Agent for GraphExpertAgent {
    fn name(&self) -> &'static str {
        "graph-expert"
    }

    async fn run(&self, ctx: &PipelineContext<'_>, _provider: &dyn LlmProvider, input: &[PipelineItem]) -> Vec<PipelineItem> {
        let mut items = Vec::new();

        for candidate in input.iter().filter(|i| i.detection_type == "relationship_suggestion") {
            let Some(raw) = candidate.suggested_content_json.as_deref() else { continue };
            let Ok(proposal) = serde_json::from_str::<RelationshipProposal>(raw) else { continue };

            if !ctx.ontology.validate_pair(&proposal.relationship_type, &proposal.source_type, &proposal.target_type) {
                if self.suppressed(ctx, "type_pair_violation", &proposal.relationship_type).await {
                    continue;
                }
                items.push(violation(
                    "type_pair_violation",
                    &candidate.matched_text,
                    &proposal.relationship_type,
                    "relationship type is not valid for this source/target type pair",
                ));
                continue;
            }

            if let Some(constraint) = ctx.ontology.constraint_for(&proposal.relationship_type) {
                if let Some(max) = constraint.max_per_source {
                    let existing = existing_outgoing_count(ctx.db, &proposal.source_entity_id, &proposal.relationship_type).await;
                    if existing >= max as i64 {
                        if self.suppressed(ctx, "cardinality_violation", &proposal.relationship_type).await {
                            continue;
                        }
                        items.push(violation(
                            "cardinality_violation",
                            &candidate.matched_text,
                            &proposal.relationship_type,
                            &format!("source entity already has {existing} of max {max} allowed"),
                        ));
                    }
                }
            }
        }

        for entity in &ctx.entities {
            for constraint in &ctx.ontology.relationships {
                if !constraint.required_for_source_types.contains(&entity.entity_type) {
                    continue;
                }
                let existing = existing_outgoing_count(ctx.db, &entity.id, &constraint.relationship_type).await;
                if existing == 0 {
                    if self.suppressed(ctx, "missing_required", &format!("{}:{}", entity.id, constraint.relationship_type)).await {
                        continue;
                    }
                    items.push(violation(
                        "missing_required",
                        &entity.name,
                        &constraint.relationship_type,
                        &format!("{} entities require at least one {} relationship", entity.entity_type, constraint.relationship_type),
                    ));
                }
            }
        }

        items
    }
}

impl GraphExpertAgent {
    async fn suppressed(&self, ctx: &PipelineContext<'_>, constraint_type: &str, override_key: &str) -> bool {
        ctx.db
            .is_overridden(&ctx.campaign_id, constraint_type, override_key)
            .await
            .unwrap_or(false)
    }
}

fn violation(detection_type: &str, matched_text: &str, relationship_type: &str, reason: &str) -> PipelineItem {
    let mut item = PipelineItem::new(detection_type, matched_text);
    item.suggested_content_json = Some(
        serde_json::json!({
            "relationshipType": relationship_type,
            "reason": reason,
        })
        .to_string(),
    );
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::llm::AnthropicProvider;
    use crate::core::pipeline::ontology::Ontology;
    use crate::core::rag::ContextBundle;
    use crate::database::Database;

    fn ctx(db: &Database) -> PipelineContext<'_> {
        PipelineContext {
            campaign_id: "c1".to_string(),
            game_system: "generic".to_string(),
            source_text: String::new(),
            entities: vec![],
            context: ContextBundle::default(),
            ontology: Ontology::default_for_system("generic"),
            db,
        }
    }

    fn suggestion(relationship_type: &str, source_type: &str, target_type: &str) -> PipelineItem {
        let mut item = PipelineItem::new("relationship_suggestion", "edge");
        item.suggested_content_json = Some(
            serde_json::json!({
                "sourceEntityId": "e1",
                "sourceType": source_type,
                "targetEntityId": "e2",
                "targetType": target_type,
                "relationshipType": relationship_type,
            })
            .to_string(),
        );
        item
    }

    #[tokio::test]
    async fn flags_invalid_type_pair() {
        let db = Database::new_in_memory().await.unwrap();
        let context = ctx(&db);
        let provider = AnthropicProvider::new("", "");
        let input = vec![suggestion("member_of", "location", "faction")];
        let items = GraphExpertAgent.run(&context, &provider, &input).await;
        assert!(items.iter().any(|i| i.detection_type == "type_pair_violation"));
    }

    #[tokio::test]
    async fn valid_pair_is_silent() {
        let db = Database::new_in_memory().await.unwrap();
        let context = ctx(&db);
        let provider = AnthropicProvider::new("", "");
        let input = vec![suggestion("member_of", "npc", "faction")];
        let items = GraphExpertAgent.run(&context, &provider, &input).await;
        assert!(items.is_empty());
    }
}
