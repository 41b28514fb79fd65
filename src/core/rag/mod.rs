//! Context Builder / RAG (C5).
//!
//! Assembles a token-budgeted retrieval bundle of campaign and rulebook
//! snippets for the enrichment pipeline.

use crate::config::RagBudgetConfig;
use crate::database::{ChunkOps, ContentChunkRecord, Database};
use async_trait::async_trait;
use serde::Serialize;

/// One retrieval hit before packing, carrying both legs' raw scores.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub chunk: ContentChunkRecord,
    pub vector_similarity: Option<f64>,
    pub lexical_score: Option<f64>,
}

/// Source attribution emitted alongside every packed snippet.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnippet {
    #[serde(rename = "type")]
    pub kind: String,
    pub entity_id: Option<String>,
    pub entity_name: Option<String>,
    pub chunk_text: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextBundle {
    pub snippets: Vec<ContextSnippet>,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

/// External embedding/vector search capability. Absent by default; when
/// no implementation is configured the builder degrades to
/// lexical-only search (§4.5 Fallback).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, query: &str, campaign_id: Option<&str>, limit: usize) -> anyhow::Result<Vec<(ContentChunkRecord, f64)>>;
}

/// BM25 lexical search over the chunk store. Backed by SQLite FTS5 in
/// production; swappable for tests.
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    async fn search(&self, query: &str, campaign_id: Option<&str>, limit: usize) -> anyhow::Result<Vec<(ContentChunkRecord, f64)>>;
}

/// [`LexicalIndex`] backed by the service's own database.
pub struct SqliteLexicalIndex {
    db: Database,
}

impl SqliteLexicalIndex {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LexicalIndex for SqliteLexicalIndex {
    async fn search(&self, query: &str, campaign_id: Option<&str>, limit: usize) -> anyhow::Result<Vec<(ContentChunkRecord, f64)>> {
        Ok(self.db.search_chunks(query, campaign_id, limit as i64).await?)
    }
}

const VECTOR_WEIGHT: f64 = 0.7;
const LEXICAL_WEIGHT: f64 = 0.3;
/// Conservative estimate used to stay inside the token budget without a
/// real tokenizer dependency: ~4 characters per token, matching the
/// rule of thumb used elsewhere in the corpus for budget math.
const CHARS_PER_TOKEN: usize = 4;

pub struct ContextBuilder<'a> {
    pub vector_index: Option<&'a dyn VectorIndex>,
    pub lexical_index: &'a dyn LexicalIndex,
    pub budget: RagBudgetConfig,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(lexical_index: &'a dyn LexicalIndex, vector_index: Option<&'a dyn VectorIndex>, budget: RagBudgetConfig) -> Self {
        Self {
            vector_index,
            lexical_index,
            budget,
        }
    }

    /// Builds a context bundle for `query`, scoped to `campaign_id` when
    /// given. Returns an empty bundle rather than failing when no
    /// retrieval capability is configured.
    pub async fn build(&self, query: &str, campaign_id: Option<&str>) -> ContextBundle {
        if query.trim().is_empty() {
            return ContextBundle::default();
        }

        let lexical_hits = self
            .lexical_index
            .search(query, campaign_id, 50)
            .await
            .unwrap_or_default();

        let vector_hits = if let Some(index) = self.vector_index {
            index.search(query, campaign_id, 50).await.unwrap_or_default()
        } else {
            Vec::new()
        };

        let merged = merge_hits(vector_hits, lexical_hits);
        pack(merged, &self.budget)
    }
}

fn merge_hits(
    vector_hits: Vec<(ContentChunkRecord, f64)>,
    lexical_hits: Vec<(ContentChunkRecord, f64)>,
) -> Vec<RetrievalHit> {
    use std::collections::HashMap;

    let mut by_key: HashMap<(String, String), RetrievalHit> = HashMap::new();

    for (chunk, score) in vector_hits {
        let key = chunk_key(&chunk);
        by_key
            .entry(key)
            .or_insert_with(|| RetrievalHit {
                chunk: chunk.clone(),
                vector_similarity: None,
                lexical_score: None,
            })
            .vector_similarity = Some(score);
    }

    for (chunk, score) in lexical_hits {
        let key = chunk_key(&chunk);
        let entry = by_key.entry(key).or_insert_with(|| RetrievalHit {
            chunk: chunk.clone(),
            vector_similarity: None,
            lexical_score: None,
        });
        // BM25 scores from FTS5 are negative-is-better; normalise to a
        // 0..1-ish "higher is better" scale so the weighted sum is sane.
        entry.lexical_score = Some(1.0 / (1.0 + score.max(0.0)));
    }

    by_key.into_values().collect()
}

fn chunk_key(chunk: &ContentChunkRecord) -> (String, String) {
    (
        chunk.source_table.clone().unwrap_or_default(),
        chunk.source_id.clone().unwrap_or_default(),
    )
}

fn combined_score(hit: &RetrievalHit) -> f64 {
    VECTOR_WEIGHT * hit.vector_similarity.unwrap_or(0.0) + LEXICAL_WEIGHT * hit.lexical_score.unwrap_or(0.0)
}

fn pack(mut hits: Vec<RetrievalHit>, budget: &RagBudgetConfig) -> ContextBundle {
    hits.sort_by(|a, b| combined_score(b).partial_cmp(&combined_score(a)).unwrap_or(std::cmp::Ordering::Equal));

    let campaign_budget_chars = (budget.token_budget as f64 * budget.campaign_share as f64) as usize * CHARS_PER_TOKEN;
    let rulebook_budget_chars = (budget.token_budget as f64 * budget.rulebook_share as f64) as usize * CHARS_PER_TOKEN;

    let mut campaign_used = 0usize;
    let mut rulebook_used = 0usize;
    let mut snippets = Vec::new();

    for hit in hits {
        let is_rulebook = hit.chunk.chunk_kind == "rulebook";
        let (used, cap) = if is_rulebook {
            (&mut rulebook_used, rulebook_budget_chars)
        } else {
            (&mut campaign_used, campaign_budget_chars)
        };
        if *used >= cap {
            continue;
        }
        let remaining = cap - *used;
        let text: String = hit.chunk.chunk_text.chars().take(remaining).collect();
        if text.is_empty() {
            continue;
        }
        *used += text.chars().count();

        snippets.push(ContextSnippet {
            kind: hit.chunk.chunk_kind.clone(),
            entity_id: hit.chunk.entity_id.clone(),
            entity_name: hit.chunk.entity_name.clone(),
            chunk_text: text,
            score: combined_score(&hit),
        });
    }

    ContextBundle { snippets }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyLexical;

    #[async_trait]
    impl LexicalIndex for EmptyLexical {
        async fn search(&self, _query: &str, _campaign_id: Option<&str>, _limit: usize) -> anyhow::Result<Vec<(ContentChunkRecord, f64)>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn empty_query_returns_empty_bundle() {
        let lexical = EmptyLexical;
        let builder = ContextBuilder::new(&lexical, None, RagBudgetConfig::default());
        let bundle = builder.build("", None).await;
        assert!(bundle.is_empty());
    }

    #[tokio::test]
    async fn no_retrieval_capability_yields_empty_bundle_not_error() {
        let lexical = EmptyLexical;
        let builder = ContextBuilder::new(&lexical, None, RagBudgetConfig::default());
        let bundle = builder.build("Viktor the ranger", None).await;
        assert!(bundle.is_empty());
    }

    #[test]
    fn pack_respects_campaign_rulebook_split() {
        fn chunk(kind: &str, text: &str) -> ContentChunkRecord {
            ContentChunkRecord {
                id: 1,
                campaign_id: Some("c1".to_string()),
                chunk_kind: kind.to_string(),
                source_table: Some("entities".to_string()),
                source_id: Some(uuid::Uuid::new_v4().to_string()),
                entity_id: None,
                entity_name: None,
                chunk_text: text.to_string(),
                created_at: "now".to_string(),
            }
        }
        let hits = vec![
            RetrievalHit { chunk: chunk("campaign", &"a".repeat(100)), vector_similarity: Some(0.9), lexical_score: None },
            RetrievalHit { chunk: chunk("rulebook", &"b".repeat(100)), vector_similarity: Some(0.8), lexical_score: None },
        ];
        let budget = RagBudgetConfig { token_budget: 100, campaign_share: 0.7, rulebook_share: 0.3 };
        let bundle = pack(hits, &budget);
        assert_eq!(bundle.snippets.len(), 2);
    }
}
