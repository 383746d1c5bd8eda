use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use papersum_core::{
    ChunkProvider, Dispatcher, FsSummaryStore, OpenAiClient, ProgressEvent, RunContext,
    TextFileProvider,
};
use papersum_pdf_mupdf::MupdfChunkProvider;
use tokio_util::sync::CancellationToken;

mod logging;
mod output;
mod settings;

use output::ColorMode;
use settings::RunArgs;

/// Summarize scientific papers with an OpenAI-compatible chat model
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize every PDF in a directory into <dir>/summaries/<name>_summary.md
    Summarize {
        /// Directory containing the papers
        #[arg(default_value = "./papers")]
        papers_dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Where to write summaries (default: <papers_dir>/summaries)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Regenerate summaries that already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Summarize a single PDF (or form-feed separated .txt) file
    Paper {
        /// Path to the document
        file: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Write the summary to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Command::Summarize {
            papers_dir,
            run,
            output_dir,
            overwrite,
        } => summarize(papers_dir, run, output_dir, overwrite).await,
        Command::Paper { file, run, output } => paper(file, run, output).await,
    }
}

/// Cancellation token wired to Ctrl+C.
fn ctrl_c_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            cancel_clone.cancel();
        }
    });
    cancel
}

fn provider_for(path: &Path) -> Arc<dyn ChunkProvider> {
    let is_txt = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
    if is_txt {
        Arc::new(TextFileProvider)
    } else {
        Arc::new(MupdfChunkProvider::new())
    }
}

async fn summarize(
    papers_dir: PathBuf,
    run: RunArgs,
    output_dir: Option<PathBuf>,
    overwrite: bool,
) -> anyhow::Result<()> {
    if !papers_dir.is_dir() {
        anyhow::bail!("Papers directory not found: {}", papers_dir.display());
    }

    let file_config = papersum_core::config_file::load_config();
    let mut settings = settings::resolve(&run, |k| std::env::var(k).ok(), &file_config)?;
    settings.summary.overwrite = overwrite;
    let output_dir = output_dir
        .or(settings.output_dir.take())
        .unwrap_or_else(|| settings::default_output_dir(&papers_dir));

    let color = ColorMode(!run.no_color);
    let store = FsSummaryStore::open(&output_dir)?;
    let client = OpenAiClient::new(settings.openai)?;
    let cancel = ctrl_c_token();

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} {wide_msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = {
        let bar = bar.clone();
        Arc::new(move |event: ProgressEvent| {
            match &event {
                ProgressEvent::DocumentStarted { total, .. } => bar.set_length(*total as u64),
                ProgressEvent::DocumentCached { total, .. } => {
                    bar.set_length(*total as u64);
                    bar.inc(1);
                }
                ProgressEvent::DocumentComplete { .. } | ProgressEvent::DocumentFailed { .. } => {
                    bar.inc(1);
                }
                _ => {}
            }
            if let Some(msg) = output::progress_message(&event) {
                bar.set_message(msg);
            }
            if let Some(line) = output::progress_line(&event, color) {
                bar.println(line);
            }
        })
    };

    let report = papersum_core::summarize_directory(
        &papers_dir,
        Arc::new(MupdfChunkProvider::new()),
        &client,
        &store,
        &settings.summary,
        progress,
        cancel,
    )
    .await;
    bar.finish_and_clear();
    let report = report?;

    let mut stdout = std::io::stdout();
    output::print_report(&mut stdout, &report, store.dir(), color)?;
    stdout.flush()?;

    if report.cancelled {
        anyhow::bail!("cancelled");
    }
    if !report.failures.is_empty() {
        anyhow::bail!("{} document(s) failed", report.failures.len());
    }
    Ok(())
}

async fn paper(file: PathBuf, run: RunArgs, output: Option<PathBuf>) -> anyhow::Result<()> {
    if !file.is_file() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let file_config = papersum_core::config_file::load_config();
    let settings = settings::resolve(&run, |k| std::env::var(k).ok(), &file_config)?;
    let client = OpenAiClient::new(settings.openai)?;
    let dispatcher = Dispatcher::new(&settings.summary);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {wide_msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));

    let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = {
        let spinner = spinner.clone();
        Arc::new(move |event: ProgressEvent| {
            if let Some(msg) = output::progress_message(&event) {
                spinner.set_message(msg);
            }
        })
    };

    let ctx = RunContext::new(papersum_core::document_id(&file))
        .with_cancel(ctrl_c_token())
        .with_timeout(settings.summary.call_timeout())
        .with_progress(progress);

    let result = papersum_core::summarize_document(
        &file,
        provider_for(&file),
        &client,
        &dispatcher,
        settings.summary.method,
        &ctx,
    )
    .await;
    spinner.finish_and_clear();
    let summary = result?;

    match output {
        Some(path) => {
            std::fs::write(&path, &summary)?;
            tracing::info!(path = %path.display(), "summary written");
        }
        None => {
            let mut stdout = std::io::stdout();
            writeln!(stdout, "{summary}")?;
        }
    }
    Ok(())
}
