use std::path::{Path, PathBuf};

use serde::Deserialize;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
///
/// ```toml
/// [llm]
/// model = "gpt-3.5-turbo"
/// requests_per_second = 3
///
/// [summary]
/// method = "refine"
/// map_concurrency = 8
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub llm: Option<LlmConfig>,
    pub summary: Option<SummaryConfig>,
}

/// Completion service settings. The API key is deliberately absent: it only
/// comes from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub requests_per_second: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryConfig {
    /// `"refine"` or `"reduce"`; validated when the run starts.
    pub method: Option<String>,
    pub map_concurrency: Option<usize>,
    pub call_timeout_secs: Option<u64>,
    pub output_dir: Option<String>,
}

impl LlmConfig {
    fn merge(self, overlay: LlmConfig) -> LlmConfig {
        LlmConfig {
            model: overlay.model.or(self.model),
            base_url: overlay.base_url.or(self.base_url),
            temperature: overlay.temperature.or(self.temperature),
            max_tokens: overlay.max_tokens.or(self.max_tokens),
            requests_per_second: overlay.requests_per_second.or(self.requests_per_second),
            timeout_secs: overlay.timeout_secs.or(self.timeout_secs),
        }
    }
}

impl SummaryConfig {
    fn merge(self, overlay: SummaryConfig) -> SummaryConfig {
        SummaryConfig {
            method: overlay.method.or(self.method),
            map_concurrency: overlay.map_concurrency.or(self.map_concurrency),
            call_timeout_secs: overlay.call_timeout_secs.or(self.call_timeout_secs),
            output_dir: overlay.output_dir.or(self.output_dir),
        }
    }
}

/// Platform config directory path: `<config_dir>/papersum/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("papersum").join("config.toml"))
}

/// Load config by cascading CWD `.papersum.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".papersum.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        llm: merge_section(base.llm, overlay.llm, LlmConfig::merge),
        summary: merge_section(base.summary, overlay.summary, SummaryConfig::merge),
    }
}

fn merge_section<T>(base: Option<T>, overlay: Option<T>, f: fn(T, T) -> T) -> Option<T> {
    match (base, overlay) {
        (Some(b), Some(o)) => Some(f(b, o)),
        (b, o) => o.or(b),
    }
}
