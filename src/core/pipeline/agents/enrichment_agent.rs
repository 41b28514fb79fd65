use super::Agent;
use crate::core::pipeline::{llm::{ChatMessage, LlmProvider}, PipelineContext, PipelineItem};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct NewEntityProposal {
    name: String,
    #[serde(rename = "entityType")]
    entity_type: String,
    description: String,
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct EnrichmentReply {
    new_entities: Vec<NewEntityProposal>,
}

fn system_prompt(entity_types: &[String]) -> String {
    format!(
        "You are the enrichment agent for a tabletop RPG campaign archive. \
         Given the source text, the known entities, and retrieved context, \
         propose new entities worth tracking that are clearly present in the \
         source text but not yet in the entity list.\n\n\
         Respond with a single JSON object of the exact shape:\n\
         {{\"new_entities\": [{{\"name\": string, \"entityType\": one of [{}], \
         \"description\": string (2-3 sentences), \"reasoning\": string}}]}}\n\n\
         Output ONLY that JSON object. No Markdown, no commentary, no code fences.",
        entity_types.join(", ")
    )
}

fn user_prompt(ctx: &PipelineContext<'_>) -> String {
    let known = ctx
        .entities
        .iter()
        .map(|e| format!("- {} ({})", e.name, e.entity_type))
        .collect::<Vec<_>>()
        .join("\n");
    let retrieved = ctx
        .context
        .snippets
        .iter()
        .map(|s| format!("- [{}] {}", s.kind, s.chunk_text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "SOURCE TEXT:\n{}\n\nKNOWN ENTITIES:\n{}\n\nRETRIEVED CONTEXT:\n{}\n",
        ctx.source_text, known, retrieved
    )
}

/// Proposes new entities by prompting an LLM with the source text, the
/// known-entity list, and the retrieval bundle, then parses a strict
/// JSON reply. A parse failure is recorded as an `enrichment_error`
/// item rather than fabricating entities (§4.6 Prompt contract).
pub struct EnrichmentAgent;

#[async_trait]
impl Agent for EnrichmentAgent {
    fn name(&self) -> &'static str {
        "enrichment-agent"
    }

    async fn run(&self, ctx: &PipelineContext<'_>, provider: &dyn LlmProvider, _input: &[PipelineItem]) -> Vec<PipelineItem> {
        let messages = vec![
            ChatMessage::system(system_prompt(&ctx.ontology.entity_types)),
            ChatMessage::user(user_prompt(ctx)),
        ];

        let raw = match provider.complete(&messages).await {
            Ok(text) => text,
            Err(e) => return vec![error_item(format!("LLM call failed: {e}"))],
        };

        let parsed: Result<EnrichmentReply, _> = serde_json::from_str(raw.trim());
        match parsed {
            Ok(reply) => reply
                .new_entities
                .into_iter()
                .filter(|p| ctx.ontology.is_valid_entity_type(&p.entity_type))
                .map(|p| {
                    let mut item = PipelineItem::new("new_entity_suggestion", p.name.clone());
                    item.suggested_content_json = Some(
                        serde_json::json!({
                            "name": p.name,
                            "entityType": p.entity_type,
                            "description": p.description,
                            "reasoning": p.reasoning,
                        })
                        .to_string(),
                    );
                    item
                })
                .collect(),
            Err(e) => vec![error_item(format!("malformed LLM reply: {e}"))],
        }
    }
}

fn error_item(message: String) -> PipelineItem {
    let mut item = PipelineItem::new("enrichment_error", "enrichment-agent");
    item.suggested_content_json = Some(serde_json::json!({ "error": message }).to_string());
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::ontology::Ontology;
    use crate::core::rag::ContextBundle;
    use crate::database::Database;
    use anyhow::Result;

    struct FixedProvider(String);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn bare_ctx(db: &Database) -> PipelineContext<'_> {
        PipelineContext {
            campaign_id: "c1".to_string(),
            game_system: "generic".to_string(),
            source_text: "Brennar the smith forged the blade.".to_string(),
            entities: vec![],
            context: ContextBundle::default(),
            ontology: Ontology::default_for_system("generic"),
            db,
        }
    }

    #[tokio::test]
    async fn parses_well_formed_reply() {
        let db = Database::new_in_memory().await.unwrap();
        let ctx = bare_ctx(&db);
        let provider = FixedProvider(
            r#"{"new_entities":[{"name":"Brennar","entityType":"npc","description":"A smith.","reasoning":"named actor"}]}"#
                .to_string(),
        );
        let items = EnrichmentAgent.run(&ctx, &provider, &[]).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].detection_type, "new_entity_suggestion");
    }

    #[tokio::test]
    async fn malformed_reply_emits_error_item_not_panic() {
        let db = Database::new_in_memory().await.unwrap();
        let ctx = bare_ctx(&db);
        let provider = FixedProvider("not json at all".to_string());
        let items = EnrichmentAgent.run(&ctx, &provider, &[]).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].detection_type, "enrichment_error");
    }

    #[tokio::test]
    async fn entity_type_outside_closed_set_is_dropped() {
        let db = Database::new_in_memory().await.unwrap();
        let ctx = bare_ctx(&db);
        let provider = FixedProvider(
            r#"{"new_entities":[{"name":"Brennar","entityType":"deity","description":"x","reasoning":"y"}]}"#
                .to_string(),
        );
        let items = EnrichmentAgent.run(&ctx, &provider, &[]).await;
        assert!(items.is_empty());
    }
}
