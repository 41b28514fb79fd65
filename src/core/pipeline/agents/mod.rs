//! Pipeline agents (§4.6 default composition).

pub mod canon_expert;
pub mod enrichment_agent;
pub mod graph_expert;
pub mod ttrpg_expert;

use super::{llm::LlmProvider, PipelineContext, PipelineItem};
use async_trait::async_trait;

/// `name` and `run(ctx, provider, input) -> items`, exactly as named in
/// the pipeline contract. Agents never propagate errors outward: a
/// failed agent records an error item itself and returns normally so
/// the rest of the stage still runs.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &PipelineContext<'_>, provider: &dyn LlmProvider, input: &[PipelineItem]) -> Vec<PipelineItem>;
}
