//! Method selection: route a chunk sequence to the strategy registered for
//! an aggregation method.

use std::collections::HashMap;
use std::sync::Arc;

use crate::chunk::Chunk;
use crate::llm::CompletionClient;
use crate::strategy::{MapReduceStrategy, RefineStrategy, RunContext, SummarizationStrategy};
use crate::{AggregationMethod, Config, Summary, SummaryError};

/// Registry of strategies keyed by [`AggregationMethod`].
#[derive(Clone)]
pub struct Dispatcher {
    strategies: HashMap<AggregationMethod, Arc<dyn SummarizationStrategy>>,
}

impl Dispatcher {
    /// A dispatcher with the built-in Refine and Map-Reduce strategies.
    pub fn new(config: &Config) -> Self {
        Self::empty()
            .with_strategy(Arc::new(RefineStrategy))
            .with_strategy(Arc::new(MapReduceStrategy::new(config.map_concurrency)))
    }

    /// A dispatcher with nothing registered.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register `strategy` under its own method, replacing any previous one.
    pub fn with_strategy(mut self, strategy: Arc<dyn SummarizationStrategy>) -> Self {
        self.strategies.insert(strategy.method(), strategy);
        self
    }

    pub fn methods(&self) -> Vec<AggregationMethod> {
        let mut methods: Vec<_> = self.strategies.keys().copied().collect();
        methods.sort_by_key(|m| m.as_str());
        methods
    }

    /// Summarize `chunks` with the method named by `method`.
    ///
    /// The name is parsed before any other check, so an unknown name fails
    /// with [`SummaryError::UnknownMethod`] even for empty input, and no call
    /// reaches `client`.
    pub async fn dispatch(
        &self,
        method: &str,
        chunks: &[Chunk],
        client: &dyn CompletionClient,
        ctx: &RunContext,
    ) -> Result<Summary, SummaryError> {
        let method: AggregationMethod = method.parse()?;
        self.run(method, chunks, client, ctx).await
    }

    pub async fn run(
        &self,
        method: AggregationMethod,
        chunks: &[Chunk],
        client: &dyn CompletionClient,
        ctx: &RunContext,
    ) -> Result<Summary, SummaryError> {
        let strategy = self
            .strategies
            .get(&method)
            .ok_or_else(|| SummaryError::UnknownMethod(method.to_string()))?;
        tracing::debug!(
            document = %ctx.document,
            method = %method,
            model = client.model(),
            chunks = chunks.len(),
            "dispatching"
        );
        strategy.run(chunks, client, ctx).await
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("methods", &self.methods())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockClient, MockReply};

    fn two_chunks() -> Vec<Chunk> {
        vec![Chunk::new(0, "one"), Chunk::new(1, "two")]
    }

    #[tokio::test]
    async fn routes_by_method_name() {
        let dispatcher = Dispatcher::default();
        let ctx = RunContext::default();

        let refine = MockClient::new(MockReply::text("r"));
        dispatcher
            .dispatch("refine", &two_chunks(), &refine, &ctx)
            .await
            .unwrap();
        assert_eq!(refine.call_count(), 2);

        let reduce = MockClient::new(MockReply::text("m"));
        dispatcher
            .dispatch("reduce", &two_chunks(), &reduce, &ctx)
            .await
            .unwrap();
        assert_eq!(reduce.call_count(), 3);
    }

    #[tokio::test]
    async fn unknown_method_fails_before_any_call() {
        let mock = MockClient::new(MockReply::text("unused"));
        let err = Dispatcher::default()
            .dispatch("stuff", &[], &mock, &RunContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SummaryError::UnknownMethod(ref m) if m == "stuff"));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn unregistered_method_is_reported() {
        let dispatcher = Dispatcher::empty().with_strategy(Arc::new(RefineStrategy));
        assert_eq!(dispatcher.methods(), vec![AggregationMethod::Refine]);

        let mock = MockClient::new(MockReply::text("unused"));
        let err = dispatcher
            .run(
                AggregationMethod::Reduce,
                &two_chunks(),
                &mock,
                &RunContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SummaryError::UnknownMethod(_)));
        assert_eq!(mock.call_count(), 0);
    }
}
