//! TOML configuration.
//!
//! Every section is optional; a missing key falls back to the value the
//! service was tuned with. [`load_config`] parses and validates in one pass,
//! so a bad file aborts startup before anything is built.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use school_counselor_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use school_counselor_core::index::DEFAULT_BATCH_SIZE;
use school_counselor_core::links::LinkRules;
use school_counselor_core::pages::RelevanceFilter;
use school_counselor_core::records::{default_shapes, RecordLoader, RecordShape};
use school_counselor_core::responder::{default_crisis_contacts, DEFAULT_TOP_K};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub school: SchoolConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub links: LinkRules,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchoolConfig {
    #[serde(default = "default_school_name")]
    pub name: String,
    /// Extra names students use for the school; treated as in-scope terms.
    #[serde(default = "default_aliases")]
    pub aliases: Vec<String>,
    #[serde(default = "default_crisis_contacts")]
    pub crisis_contacts: Vec<String>,
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            name: default_school_name(),
            aliases: default_aliases(),
            crisis_contacts: default_crisis_contacts(),
        }
    }
}

fn default_school_name() -> String {
    "Green Level High School".to_string()
}
fn default_aliases() -> Vec<String> {
    vec![
        "green level".to_string(),
        "glhs".to_string(),
        "gators".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Remove `[1]`-style citation markers from rendered records.
    #[serde(default = "default_true")]
    pub strip_citations: bool,
    #[serde(default)]
    pub pdf_filter: PdfFilterConfig,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            strip_citations: true,
            pdf_filter: PdfFilterConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_include_globs() -> Vec<String> {
    ["**/*.json", "**/*.ljson", "**/*.jsonl", "**/*.pdf"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_true() -> bool {
    true
}

/// Relevance filter for PDF pages. `allow` / `block` replace the built-in
/// lists when present.
#[derive(Debug, Deserialize, Clone)]
pub struct PdfFilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub allow: Option<Vec<String>>,
    #[serde(default)]
    pub block: Option<Vec<String>>,
}

impl Default for PdfFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow: None,
            block: None,
        }
    }
}

impl PdfFilterConfig {
    pub fn filter(&self) -> Option<RelevanceFilter> {
        if !self.enabled {
            return None;
        }
        let mut filter = RelevanceFilter::default();
        if let Some(allow) = &self.allow {
            filter.allow = allow.clone();
        }
        if let Some(block) = &self.block {
            filter.block = block.clone();
        }
        Some(filter)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window size in characters.
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/index.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible gateway or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: 0,
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            url: None,
            temperature: default_temperature(),
            max_retries: 0,
            timeout_secs: default_completion_timeout(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}
fn default_completion_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    /// Sessions idle longer than this are dropped by the sweep.
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_timeout_minutes(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_timeout_minutes() -> u64 {
    5
}
fn default_sweep_interval() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

/// `[[loader.shapes]]` replaces the built-in record shapes when present.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoaderConfig {
    #[serde(default)]
    pub shapes: Option<Vec<RecordShape>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Record loader for the configured shapes and citation handling.
    pub fn record_loader(&self) -> RecordLoader {
        let shapes = self.loader.shapes.clone().unwrap_or_else(default_shapes);
        RecordLoader::new(shapes, self.data.strip_citations)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.school.name.trim().is_empty() {
        bail!("school.name must not be empty");
    }

    // Validate chunking
    if config.chunking.size == 0 {
        bail!("chunking.size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.size {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.size ({})",
            config.chunking.overlap,
            config.chunking.size
        );
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Validate completion
    match config.completion.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if config.completion.model.is_none() {
                bail!(
                    "completion.model must be specified when provider is '{}'",
                    config.completion.provider
                );
            }
        }
        other => bail!(
            "Unknown completion provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        bail!("completion.temperature must be in [0.0, 2.0]");
    }

    if config.sessions.timeout_minutes == 0 {
        bail!("sessions.timeout_minutes must be > 0");
    }
    if config.sessions.sweep_interval_secs == 0 {
        bail!("sessions.sweep_interval_secs must be > 0");
    }

    if let Some(shapes) = &config.loader.shapes {
        if shapes.is_empty() {
            bail!("loader.shapes must list at least one shape when present");
        }
        for shape in shapes {
            if shape.key_sets.iter().all(|keys| keys.is_empty()) {
                bail!(
                    "loader.shapes: shape '{}' needs at least one non-empty key set",
                    shape.category
                );
            }
        }
    }

    for candidate in &config.links.candidates {
        if candidate.url.trim().is_empty() {
            bail!("links.candidates: '{}' has an empty url", candidate.label);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.school.name, "Green Level High School");
        assert_eq!(config.chunking.size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.sessions.timeout_minutes, 5);
        assert_eq!(config.sessions.sweep_interval_secs, 300);
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.embedding.max_retries, 0);
        assert!(config.data.pdf_filter.filter().is_some());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = parse_config("[chunking]\nsize = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("chunking.overlap"));
        assert!(parse_config("[chunking]\nsize = 0\noverlap = 0\n").is_err());
    }

    #[test]
    fn test_enabled_embedding_needs_model_and_dims() {
        let err = parse_config("[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
        assert!(parse_config("[embedding]\nprovider = \"openai\"\nmodel = \"m\"\ndims = 8\n").is_ok());
        assert!(parse_config("[embedding]\nprovider = \"cohere\"\n").is_err());
    }

    #[test]
    fn test_completion_needs_model() {
        assert!(parse_config("[completion]\nprovider = \"ollama\"\n").is_err());
        assert!(parse_config("[completion]\nprovider = \"ollama\"\nmodel = \"llama3.2\"\n").is_ok());
    }

    #[test]
    fn test_custom_shapes_replace_builtin() {
        let toml = r#"
[[loader.shapes]]
category = "bell_schedule"
key_sets = [["period", "start"]]
fields = [{ key = "period", label = "Period" }]
"#;
        let config = parse_config(toml).unwrap();
        let loader = config.record_loader();
        assert_eq!(loader.shapes().len(), 1);
        assert_eq!(loader.shapes()[0].category, "bell_schedule");
    }

    #[test]
    fn test_pdf_filter_overrides_and_disable() {
        let config = parse_config("[data.pdf_filter]\nblock = [\"other school\"]\n").unwrap();
        let filter = config.data.pdf_filter.filter().unwrap();
        assert_eq!(filter.block, vec!["other school".to_string()]);
        assert!(!filter.allow.is_empty());

        let config = parse_config("[data.pdf_filter]\nenabled = false\n").unwrap();
        assert!(config.data.pdf_filter.filter().is_none());
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = parse_config(include_str!("../config/counselor.example.toml")).unwrap();
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.links.candidates.len(), 2);
        assert!(config.links.club_directory.is_some());
    }

    #[test]
    fn test_link_candidates_parse() {
        let toml = r#"
[links]
min_score = 2
club_directory = { label = "Club directory", url = "https://example.org/clubs" }

[[links.candidates]]
label = "Career & College Promise"
url = "https://example.org/ccp"
source_tag = "wake_tech"
tiers = [{ weight = 3, keywords = ["ccp"] }]
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.links.min_score, 2);
        assert_eq!(config.links.candidates.len(), 1);
        assert!(!config.links.club_keywords.is_empty());
    }
}
