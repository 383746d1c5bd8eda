//! Resolve run settings: CLI flags > environment > config file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use papersum_core::config_file::ConfigFile;
use papersum_core::{AggregationMethod, Config, OpenAiConfig};

/// Flags shared by every subcommand that talks to the model.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Aggregation method: "reduce" (map-reduce) or "refine"
    #[arg(short, long)]
    pub method: Option<String>,

    /// Chat model name
    #[arg(long)]
    pub model: Option<String>,

    /// OpenAI-compatible API root (e.g. http://localhost:8000/v1)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Maximum concurrent page summaries per document (reduce only)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-call timeout in seconds (0 disables)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Everything a run needs, fully resolved.
#[derive(Debug)]
pub struct Settings {
    pub openai: OpenAiConfig,
    pub summary: Config,
    pub output_dir: Option<PathBuf>,
}

/// Build [`Settings`] from flags, an environment lookup and the config file.
///
/// `env` is injected so the precedence rules can be tested without touching
/// the process environment.
pub fn resolve(
    args: &RunArgs,
    env: impl Fn(&str) -> Option<String>,
    file: &ConfigFile,
) -> anyhow::Result<Settings> {
    let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
    let llm = file.llm.clone().unwrap_or_default();
    let summary = file.summary.clone().unwrap_or_default();

    let api_key = env("OPENAI_API_KEY").ok_or_else(|| {
        anyhow::anyhow!("OPENAI_API_KEY must be set (in the environment or a .env file)")
    })?;

    let method = match args
        .method
        .clone()
        .or_else(|| env("PAPERSUM_METHOD"))
        .or(summary.method)
    {
        Some(name) => name.parse::<AggregationMethod>()?,
        None => AggregationMethod::Reduce,
    };

    let call_timeout_secs = args
        .timeout
        .or(summary.call_timeout_secs)
        .unwrap_or(papersum_core::DEFAULT_CALL_TIMEOUT_SECS);

    let mut openai = OpenAiConfig::new(api_key);
    if let Some(model) = args.model.clone().or_else(|| env("OPENAI_MODEL")).or(llm.model) {
        openai.model = model;
    }
    if let Some(url) = args
        .base_url
        .clone()
        .or_else(|| env("OPENAI_BASE_URL"))
        .or(llm.base_url)
    {
        openai.base_url = url;
    }
    openai.temperature = llm.temperature;
    openai.max_tokens = llm.max_tokens;
    openai.requests_per_second = llm.requests_per_second;
    openai.timeout = http_timeout(llm.timeout_secs, call_timeout_secs);

    Ok(Settings {
        openai,
        summary: Config {
            method,
            map_concurrency: args
                .concurrency
                .or(summary.map_concurrency)
                .unwrap_or(papersum_core::DEFAULT_MAP_CONCURRENCY)
                .max(1),
            call_timeout_secs,
            overwrite: false,
        },
        output_dir: summary.output_dir.map(PathBuf::from),
    })
}

/// HTTP timeout for the client. An explicit `[llm] timeout_secs` wins;
/// otherwise it tracks the per-call timeout with 5 s of headroom so the
/// per-call timeout fires first. `0` disables either.
fn http_timeout(llm_timeout_secs: Option<u64>, call_timeout_secs: u64) -> Option<Duration> {
    match llm_timeout_secs {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None if call_timeout_secs == 0 => None,
        None => Some(Duration::from_secs(call_timeout_secs + 5)),
    }
}

/// Where summaries for `papers_dir` go when no directory was given.
pub fn default_output_dir(papers_dir: &Path) -> PathBuf {
    papers_dir.join("summaries")
}
