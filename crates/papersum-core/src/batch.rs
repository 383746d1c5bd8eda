//! Directory-level driver: discover documents, summarize each one, and keep
//! the results in a [`SummaryStore`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::chunk::{ChunkError, ChunkProvider};
use crate::dispatch::Dispatcher;
use crate::llm::CompletionClient;
use crate::store::SummaryStore;
use crate::strategy::RunContext;
use crate::{AggregationMethod, Config, ProgressEvent, Summary, SummaryError};

/// A document whose summary could not be produced.
#[derive(Debug, Clone)]
pub struct DocumentFailure {
    pub document: String,
    pub error: String,
}

/// Outcome of [`summarize_directory`].
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Final summaries by document id, both fresh and cached.
    pub summaries: BTreeMap<String, Summary>,
    /// Documents summarized during this run.
    pub generated: usize,
    /// Documents whose summary was already in the store.
    pub cached: usize,
    pub failures: Vec<DocumentFailure>,
    /// The run stopped early because the cancellation token fired.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// List the documents in `dir` with one of `extensions`, sorted by name.
///
/// The scan is not recursive and matches extensions case-insensitively.
pub fn discover_documents(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, SummaryError> {
    if !dir.is_dir() {
        return Err(ChunkError::SourceNotFound(dir.display().to_string()).into());
    }

    let mut docs: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(ChunkError::Io)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        })
        .collect();

    if docs.is_empty() {
        return Err(SummaryError::NoDocuments(dir.to_path_buf()));
    }
    docs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(docs)
}

/// Document id used as the store key: the file stem.
pub fn document_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Summarize one document without touching any store.
///
/// Text extraction runs on a blocking thread since PDF parsing is sync and
/// CPU-bound.
pub async fn summarize_document(
    path: &Path,
    provider: Arc<dyn ChunkProvider>,
    client: &dyn CompletionClient,
    dispatcher: &Dispatcher,
    method: AggregationMethod,
    ctx: &RunContext,
) -> Result<Summary, SummaryError> {
    let source = path.to_path_buf();
    let chunks = tokio::task::spawn_blocking(move || provider.load(&source))
        .await
        .map_err(|e| ChunkError::ExtractionError(format!("extraction task failed: {e}")))??;

    tracing::debug!(path = %path.display(), chunks = chunks.len(), "chunks loaded");
    (ctx.progress)(ProgressEvent::ChunksLoaded {
        document: ctx.document.clone(),
        chunks: chunks.len(),
    });

    dispatcher.run(method, &chunks, client, ctx).await
}

/// Summarize every document in `dir` that `provider` can read.
///
/// Documents are processed one at a time in name order. A document already in
/// `store` is reused unless `config.overwrite` is set. A failure on one
/// document is recorded and the run moves on; cancellation stops the run and
/// returns what was finished.
pub async fn summarize_directory(
    dir: &Path,
    provider: Arc<dyn ChunkProvider>,
    client: &dyn CompletionClient,
    store: &dyn SummaryStore,
    config: &Config,
    progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
    cancel: CancellationToken,
) -> Result<BatchReport, SummaryError> {
    let docs = discover_documents(dir, provider.extensions())?;
    let total = docs.len();
    let dispatcher = Dispatcher::new(config);
    let mut report = BatchReport::default();

    tracing::info!(
        dir = %dir.display(),
        documents = total,
        method = %config.method,
        model = client.model(),
        "starting batch"
    );

    for (index, path) in docs.iter().enumerate() {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let id = document_id(path);

        // Checked before any completion call: an id the store rejects could
        // never be saved.
        let exists = match store.has(&id) {
            Ok(exists) => exists,
            Err(e) => {
                record_failure(&mut report, &progress, index, total, id, e.into());
                continue;
            }
        };

        if exists && !config.overwrite {
            match store.get(&id) {
                Ok(summary) => {
                    tracing::info!(document = %id, "summary exists, skipping");
                    progress(ProgressEvent::DocumentCached {
                        index,
                        total,
                        document: id.clone(),
                    });
                    report.summaries.insert(id, summary);
                    report.cached += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(document = %id, error = %e, "stored summary unreadable, regenerating");
                }
            }
        }

        progress(ProgressEvent::DocumentStarted {
            index,
            total,
            document: id.clone(),
        });
        let started = Instant::now();
        let ctx = RunContext::new(id.clone())
            .with_cancel(cancel.clone())
            .with_timeout(config.call_timeout())
            .with_progress(progress.clone());

        let result = match summarize_document(
            path,
            provider.clone(),
            client,
            &dispatcher,
            config.method,
            &ctx,
        )
        .await
        {
            Ok(summary) => store.put(&id, &summary).map(|()| summary).map_err(Into::into),
            Err(e) => Err(e),
        };

        match result {
            Ok(summary) => {
                let elapsed = started.elapsed();
                tracing::info!(
                    document = %id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "document summarized"
                );
                progress(ProgressEvent::DocumentComplete {
                    index,
                    total,
                    document: id.clone(),
                    elapsed,
                });
                report.summaries.insert(id, summary);
                report.generated += 1;
            }
            Err(SummaryError::Cancelled) => {
                tracing::info!(document = %id, "cancelled");
                report.cancelled = true;
                break;
            }
            Err(e) => record_failure(&mut report, &progress, index, total, id, e),
        }
    }

    tracing::info!(
        generated = report.generated,
        cached = report.cached,
        failed = report.failures.len(),
        cancelled = report.cancelled,
        "batch finished"
    );
    Ok(report)
}

fn record_failure(
    report: &mut BatchReport,
    progress: &Arc<dyn Fn(ProgressEvent) + Send + Sync>,
    index: usize,
    total: usize,
    document: String,
    error: SummaryError,
) {
    let message = error.to_string();
    tracing::warn!(document = %document, error = %message, "document failed");
    progress(ProgressEvent::DocumentFailed {
        index,
        total,
        document: document.clone(),
        message: message.clone(),
    });
    report.failures.push(DocumentFailure {
        document,
        error: message,
    });
}
