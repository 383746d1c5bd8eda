use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod batch;
pub mod chunk;
pub mod config_file;
pub mod dispatch;
pub mod llm;
pub mod prompts;
pub mod store;
pub mod strategy;

// Re-export for convenience
pub use batch::{
    BatchReport, DocumentFailure, discover_documents, document_id, summarize_directory,
    summarize_document,
};
pub use chunk::{Chunk, ChunkError, ChunkProvider, TextFileProvider};
pub use dispatch::Dispatcher;
pub use llm::{CompletionClient, CompletionError, Message, OpenAiClient, OpenAiConfig, Role};
pub use store::{FsSummaryStore, MemoryStore, StoreError, SummaryStore};
pub use strategy::{MapReduceStrategy, RefineStrategy, RunContext, SummarizationStrategy};

/// A partial or final summary. Non-empty whenever it is returned as `Ok`.
pub type Summary = String;

/// Which aggregation algorithm reduces a document's chunks to one summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    /// Sequential accumulation: each chunk may revise the running summary.
    Refine,
    /// Independent per-chunk summaries followed by one synthesis call.
    Reduce,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::Refine => "refine",
            AggregationMethod::Reduce => "reduce",
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationMethod {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refine" => Ok(AggregationMethod::Refine),
            "reduce" | "map-reduce" => Ok(AggregationMethod::Reduce),
            _ => Err(SummaryError::UnknownMethod(s.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("no chunks to summarize")]
    EmptyInput,
    #[error("unknown aggregation method: {0:?} (expected \"refine\" or \"reduce\")")]
    UnknownMethod(String),
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Source(#[from] ChunkError),
    #[error("summary store error: {0}")]
    Store(#[from] StoreError),
    #[error("no documents to summarize in {}", .0.display())]
    NoDocuments(PathBuf),
    #[error("summarization cancelled")]
    Cancelled,
}

/// Phase of an aggregation run, reported through [`ProgressEvent::Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Refine: summary of the first chunk.
    Initial,
    /// Refine: revision against a later chunk.
    Refine,
    /// Map-Reduce: one chunk summarized on its own.
    Map,
    /// Map-Reduce: synthesis over all partial summaries.
    Reduce,
}

/// Progress events emitted while summarizing.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    DocumentStarted {
        index: usize,
        total: usize,
        document: String,
    },
    /// The store already held a summary; no completion calls were made.
    DocumentCached {
        index: usize,
        total: usize,
        document: String,
    },
    ChunksLoaded {
        document: String,
        chunks: usize,
    },
    /// One completion call finished.
    Step {
        document: String,
        phase: Phase,
        completed: usize,
        total: usize,
    },
    DocumentComplete {
        index: usize,
        total: usize,
        document: String,
        elapsed: Duration,
    },
    DocumentFailed {
        index: usize,
        total: usize,
        document: String,
        message: String,
    },
}

/// Default upper bound on concurrent map-phase calls.
pub const DEFAULT_MAP_CONCURRENCY: usize = 4;

/// Default per-call timeout in seconds.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;

/// Configuration for a summarization run.
#[derive(Debug, Clone)]
pub struct Config {
    pub method: AggregationMethod,
    /// Maximum number of map-phase calls in flight (Map-Reduce only).
    pub map_concurrency: usize,
    /// Timeout applied to each completion call. `0` disables it.
    pub call_timeout_secs: u64,
    /// Regenerate summaries even when the store already has one.
    pub overwrite: bool,
}

impl Config {
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            method: AggregationMethod::Reduce,
            map_concurrency: DEFAULT_MAP_CONCURRENCY,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            overwrite: false,
        }
    }
}

/// Summarize an ordered chunk sequence with the method named by `method`.
///
/// The selector is validated before anything else runs: an unrecognized name
/// fails with [`SummaryError::UnknownMethod`] and no completion call is made.
pub async fn summarize_chunks(
    chunks: &[Chunk],
    client: &dyn CompletionClient,
    method: &str,
    config: &Config,
    ctx: &RunContext,
) -> Result<Summary, SummaryError> {
    Dispatcher::new(config)
        .dispatch(method, chunks, client, ctx)
        .await
}
