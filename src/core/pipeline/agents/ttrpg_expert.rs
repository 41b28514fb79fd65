use super::Agent;
use crate::core::pipeline::{llm::LlmProvider, PipelineContext, PipelineItem};
use async_trait::async_trait;

/// Validates each accepted entity's `entityType` against the campaign's
/// closed ontology, emitting `schema_violation` items for mismatches.
pub struct TtrpgExpertAgent;

#[async_trait]
impl Agent for TtrpgExpertAgent {
    fn name(&self) -> &'static str {
        "ttrpg-expert"
    }

    async fn run(&self, ctx: &PipelineContext<'_>, _provider: &dyn LlmProvider, _input: &[PipelineItem]) -> Vec<PipelineItem> {
        ctx.entities
            .iter()
            .filter(|e| !ctx.ontology.is_valid_entity_type(&e.entity_type))
            .map(|e| {
                let mut item = PipelineItem::new("schema_violation", e.name.clone());
                item.entity_id = Some(e.id.clone());
                item.suggested_content_json = Some(
                    serde_json::json!({
                        "entityType": e.entity_type,
                        "reason": "entity type is not in the campaign's closed ontology",
                    })
                    .to_string(),
                );
                item
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::llm::AnthropicProvider;
    use crate::core::pipeline::ontology::Ontology;
    use crate::core::rag::ContextBundle;
    use crate::database::{Database, EntityRecord};

    fn entity(entity_type: &str) -> EntityRecord {
        EntityRecord {
            id: "e1".to_string(),
            campaign_id: "c1".to_string(),
            entity_type: entity_type.to_string(),
            name: "Viktor".to_string(),
            description: None,
            gm_notes: None,
            attributes_json: "{}".to_string(),
            tags_json: "[]".to_string(),
            source_confidence: "draft".to_string(),
            created_at: "now".to_string(),
            updated_at: "now".to_string(),
        }
    }

    #[tokio::test]
    async fn flags_entity_type_outside_closed_set() {
        let db = Database::new_in_memory().await.unwrap();
        let ctx = PipelineContext {
            campaign_id: "c1".to_string(),
            game_system: "generic".to_string(),
            source_text: String::new(),
            entities: vec![entity("deity")],
            context: ContextBundle::default(),
            ontology: Ontology::default_for_system("generic"),
            db: &db,
        };
        let provider = AnthropicProvider::new("", "");
        let items = TtrpgExpertAgent.run(&ctx, &provider, &[]).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].detection_type, "schema_violation");
    }

    #[tokio::test]
    async fn valid_entity_type_is_silent() {
        let db = Database::new_in_memory().await.unwrap();
        let ctx = PipelineContext {
            campaign_id: "c1".to_string(),
            game_system: "generic".to_string(),
            source_text: String::new(),
            entities: vec![entity("npc")],
            context: ContextBundle::default(),
            ontology: Ontology::default_for_system("generic"),
            db: &db,
        };
        let provider = AnthropicProvider::new("", "");
        let items = TtrpgExpertAgent.run(&ctx, &provider, &[]).await;
        assert!(items.is_empty());
    }
}
