use super::Agent;
use crate::core::pipeline::{llm::LlmProvider, PipelineContext, PipelineItem};
use async_trait::async_trait;

/// Opposite-state word pairs checked between an entity's existing
/// description and the newly analysed source text. A deliberately
/// small, deterministic heuristic rather than an LLM call — canon
/// contradictions this blunt are common in TTRPG prep notes (a
/// character noted dead in one chapter, alive in the next).
const CONTRADICTION_PAIRS: &[(&str, &str)] = &[
    ("alive", "dead"),
    ("alive", "deceased"),
    ("ally", "enemy"),
    ("friend", "enemy"),
    ("trusted", "betrayed"),
    ("loyal", "traitor"),
];

/// Flags entities whose stored description and the freshly analysed
/// source text assert opposite states, emitting `canon_conflict` items.
pub struct CanonExpertAgent;

#[async_trait]
impl Agent for CanonExpertAgent {
    fn name(&self) -> &'static str {
        "canon-expert"
    }

    async fn run(&self, ctx: &PipelineContext<'_>, _provider: &dyn LlmProvider, _input: &[PipelineItem]) -> Vec<PipelineItem> {
        let source_lower = ctx.source_text.to_lowercase();
        let mut items = Vec::new();

        for entity in &ctx.entities {
            if !source_lower.contains(&entity.name.to_lowercase()) {
                continue;
            }
            let Some(description) = entity.description.as_deref() else { continue };
            let description_lower = description.to_lowercase();

            for &(a, b) in CONTRADICTION_PAIRS {
                let conflict = (description_lower.contains(a) && source_lower.contains(b))
                    || (description_lower.contains(b) && source_lower.contains(a));
                if conflict {
                    let mut item = PipelineItem::new("canon_conflict", entity.name.clone());
                    item.entity_id = Some(entity.id.clone());
                    item.suggested_content_json = Some(
                        serde_json::json!({
                            "severity": "medium",
                            "existingDescription": description,
                            "conflictingTerms": [a, b],
                        })
                        .to_string(),
                    );
                    items.push(item);
                    break;
                }
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::llm::AnthropicProvider;
    use crate::core::pipeline::ontology::Ontology;
    use crate::core::rag::ContextBundle;
    use crate::database::{Database, EntityRecord};

    fn entity(description: &str) -> EntityRecord {
        EntityRecord {
            id: "e1".to_string(),
            campaign_id: "c1".to_string(),
            entity_type: "npc".to_string(),
            name: "Viktor".to_string(),
            description: Some(description.to_string()),
            gm_notes: None,
            attributes_json: "{}".to_string(),
            tags_json: "[]".to_string(),
            source_confidence: "draft".to_string(),
            created_at: "now".to_string(),
            updated_at: "now".to_string(),
        }
    }

    #[tokio::test]
    async fn flags_alive_dead_contradiction() {
        let db = Database::new_in_memory().await.unwrap();
        let ctx = PipelineContext {
            campaign_id: "c1".to_string(),
            game_system: "generic".to_string(),
            source_text: "Viktor was found dead in the tavern.".to_string(),
            entities: vec![entity("Viktor is alive and running the tavern.")],
            context: ContextBundle::default(),
            ontology: Ontology::default_for_system("generic"),
            db: &db,
        };
        let provider = AnthropicProvider::new("", "");
        let items = CanonExpertAgent.run(&ctx, &provider, &[]).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].detection_type, "canon_conflict");
    }

    #[tokio::test]
    async fn consistent_text_is_silent() {
        let db = Database::new_in_memory().await.unwrap();
        let ctx = PipelineContext {
            campaign_id: "c1".to_string(),
            game_system: "generic".to_string(),
            source_text: "Viktor greeted the party warmly.".to_string(),
            entities: vec![entity("Viktor is alive and running the tavern.")],
            context: ContextBundle::default(),
            ontology: Ontology::default_for_system("generic"),
            db: &db,
        };
        let provider = AnthropicProvider::new("", "");
        let items = CanonExpertAgent.run(&ctx, &provider, &[]).await;
        assert!(items.is_empty());
    }
}
