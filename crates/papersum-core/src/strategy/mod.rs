//! Aggregation strategies that reduce a chunk sequence to one summary.

pub mod map_reduce;
pub mod refine;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::chunk::Chunk;
use crate::llm::{CompletionClient, CompletionError, Message};
use crate::{AggregationMethod, Phase, ProgressEvent, Summary, SummaryError};

pub use map_reduce::MapReduceStrategy;
pub use refine::RefineStrategy;

/// An algorithm that drives completion calls over a chunk sequence.
pub trait SummarizationStrategy: Send + Sync {
    /// The method this strategy implements.
    fn method(&self) -> AggregationMethod;

    /// Summarize `chunks` in order. Fails with [`SummaryError::EmptyInput`]
    /// on an empty slice without calling `client`.
    fn run<'a>(
        &'a self,
        chunks: &'a [Chunk],
        client: &'a dyn CompletionClient,
        ctx: &'a RunContext,
    ) -> Pin<Box<dyn Future<Output = Result<Summary, SummaryError>> + Send + 'a>>;
}

/// Per-run settings shared by every completion call of one document.
#[derive(Clone)]
pub struct RunContext {
    /// Label used in progress events and logs.
    pub document: String,
    pub cancel: CancellationToken,
    /// Upper bound on each completion call. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
    pub progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

impl RunContext {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            cancel: CancellationToken::new(),
            call_timeout: Some(Duration::from_secs(crate::DEFAULT_CALL_TIMEOUT_SECS)),
            progress: Arc::new(|_: ProgressEvent| {}),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>) -> Self {
        self.progress = progress;
        self
    }

    pub(crate) fn step(&self, phase: Phase, completed: usize, total: usize) {
        (self.progress)(ProgressEvent::Step {
            document: self.document.clone(),
            phase,
            completed,
            total,
        });
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new("document")
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("document", &self.document)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

/// Issue one completion call under the run's timeout and cancellation.
///
/// A blank reply is rejected as [`CompletionError::EmptyResponse`] so that no
/// strategy ever folds an empty string into its result.
pub(crate) async fn complete_step(
    client: &dyn CompletionClient,
    messages: Vec<Message>,
    ctx: &RunContext,
) -> Result<String, SummaryError> {
    if ctx.cancel.is_cancelled() {
        return Err(SummaryError::Cancelled);
    }

    let call = client.complete(messages);
    let reply = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(SummaryError::Cancelled),
        reply = async {
            match ctx.call_timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or(Err(CompletionError::Timeout(limit))),
                None => call.await,
            }
        } => reply?,
    };

    if reply.trim().is_empty() {
        return Err(CompletionError::EmptyResponse.into());
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockClient, MockReply};

    #[tokio::test]
    async fn blank_reply_is_rejected() {
        let mock = MockClient::new(MockReply::text("   "));
        let err = complete_step(&mock, vec![Message::user("x")], &RunContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SummaryError::Completion(CompletionError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn cancelled_context_makes_no_call() {
        let mock = MockClient::new(MockReply::text("ok"));
        let ctx = RunContext::default();
        ctx.cancel.cancel();
        let err = complete_step(&mock, vec![Message::user("x")], &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, SummaryError::Cancelled));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let mock = MockClient::new(MockReply::text("late")).with_delay(Duration::from_secs(60));
        let ctx = RunContext::default().with_timeout(Some(Duration::from_secs(5)));
        let err = complete_step(&mock, vec![Message::user("x")], &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SummaryError::Completion(CompletionError::Timeout(d)) if d == Duration::from_secs(5)
        ));
    }
}
