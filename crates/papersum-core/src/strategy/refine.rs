use std::future::Future;
use std::pin::Pin;

use super::{RunContext, SummarizationStrategy, complete_step};
use crate::chunk::Chunk;
use crate::llm::CompletionClient;
use crate::{AggregationMethod, Phase, Summary, SummaryError, prompts};

/// Sequential accumulation.
///
/// The first chunk seeds a running summary; every later chunk gets one call
/// that may revise it. Each call's prompt embeds the previous call's output,
/// so the calls cannot overlap: `n` chunks cost exactly `n` calls, one after
/// another.
#[derive(Debug, Default, Clone, Copy)]
pub struct RefineStrategy;

impl SummarizationStrategy for RefineStrategy {
    fn method(&self) -> AggregationMethod {
        AggregationMethod::Refine
    }

    fn run<'a>(
        &'a self,
        chunks: &'a [Chunk],
        client: &'a dyn CompletionClient,
        ctx: &'a RunContext,
    ) -> Pin<Box<dyn Future<Output = Result<Summary, SummaryError>> + Send + 'a>> {
        Box::pin(async move {
            let (first, rest) = chunks.split_first().ok_or(SummaryError::EmptyInput)?;
            let total = chunks.len();

            tracing::debug!(document = %ctx.document, chunks = total, "refine: initial summary");
            let mut summary = complete_step(
                client,
                prompts::research_messages(prompts::initial_summary(&first.text)),
                ctx,
            )
            .await?;
            ctx.step(Phase::Initial, 1, total);

            for (i, chunk) in rest.iter().enumerate() {
                tracing::debug!(
                    document = %ctx.document,
                    chunk = chunk.index,
                    "refine: revising summary"
                );
                summary = complete_step(
                    client,
                    prompts::research_messages(prompts::refine_summary(&summary, &chunk.text)),
                    ctx,
                )
                .await?;
                ctx.step(Phase::Refine, i + 2, total);
            }

            Ok(summary)
        })
    }
}
