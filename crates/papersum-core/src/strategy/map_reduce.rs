use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{StreamExt, TryStreamExt, stream};

use super::{RunContext, SummarizationStrategy, complete_step};
use crate::chunk::Chunk;
use crate::llm::CompletionClient;
use crate::{AggregationMethod, DEFAULT_MAP_CONCURRENCY, Phase, Summary, SummaryError, prompts};

/// Independent per-chunk summaries followed by one synthesis call.
///
/// Map calls have no data dependency on each other and run up to
/// `concurrency` at a time; partial summaries keep chunk order regardless of
/// completion order. The first failure drops every outstanding map call and
/// aborts the run, so partial summaries never escape.
#[derive(Debug, Clone, Copy)]
pub struct MapReduceStrategy {
    concurrency: usize,
}

impl MapReduceStrategy {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

impl Default for MapReduceStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_MAP_CONCURRENCY)
    }
}

impl SummarizationStrategy for MapReduceStrategy {
    fn method(&self) -> AggregationMethod {
        AggregationMethod::Reduce
    }

    fn run<'a>(
        &'a self,
        chunks: &'a [Chunk],
        client: &'a dyn CompletionClient,
        ctx: &'a RunContext,
    ) -> Pin<Box<dyn Future<Output = Result<Summary, SummaryError>> + Send + 'a>> {
        Box::pin(async move {
            if chunks.is_empty() {
                return Err(SummaryError::EmptyInput);
            }
            let total = chunks.len() + 1;
            let completed = AtomicUsize::new(0);
            let completed = &completed;

            tracing::debug!(
                document = %ctx.document,
                chunks = chunks.len(),
                concurrency = self.concurrency,
                "map-reduce: map phase"
            );
            let map_calls: Vec<_> = chunks
                .iter()
                .map(|chunk| async move {
                    let partial = complete_step(
                        client,
                        prompts::research_messages(prompts::page_summary(&chunk.text)),
                        ctx,
                    )
                    .await?;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    ctx.step(Phase::Map, done, total);
                    Ok::<_, SummaryError>(partial)
                })
                .collect();
            let partials: Vec<String> = stream::iter(map_calls)
                .buffered(self.concurrency)
                .try_collect()
                .await?;

            tracing::debug!(document = %ctx.document, partials = partials.len(), "map-reduce: reduce phase");
            let summary = complete_step(
                client,
                prompts::research_messages(prompts::final_summary(&partials)),
                ctx,
            )
            .await?;
            ctx.step(Phase::Reduce, total, total);

            Ok(summary)
        })
    }
}
