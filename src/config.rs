//! TOML configuration: read, parse, normalize, validate.
//!
//! Secrets never live here; API keys come from the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::providers::RetryPolicy;
use crate::research::ResearchBudgets;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config file at {path:?}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path:?}")]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{message}")]
    Validation { message: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub providers: Providers,
    #[serde(default)]
    pub judge: Judge,
    #[serde(default)]
    pub fetch: Fetch,
    #[serde(default)]
    pub index: Index,
    pub research: Research,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub path: PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sift.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Used when `GEMINI_MODEL` is unset.
    pub model: Option<String>,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_attempts: 3,
            initial_backoff_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Providers {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    /// Minimum pause between requests to the same provider.
    pub min_interval_ms: u64,
    pub semantic_scholar: SemanticScholar,
    pub openalex: OpenAlex,
}

impl Default for Providers {
    fn default() -> Self {
        Self {
            base_delay_ms: 5000,
            max_delay_ms: 60_000,
            max_attempts: 5,
            min_interval_ms: 1000,
            semantic_scholar: SemanticScholar::default(),
            openalex: OpenAlex::default(),
        }
    }
}

impl Providers {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SemanticScholar {
    pub base_url: Option<String>,
    pub page_size: usize,
    /// Comma-separated, e.g. "JournalArticle,Review".
    pub publication_types: Option<String>,
    /// A year or range, e.g. "2015-".
    pub year: Option<String>,
}

impl Default for SemanticScholar {
    fn default() -> Self {
        Self {
            base_url: None,
            page_size: crate::providers::semantic_scholar::PAGE_SIZE,
            publication_types: None,
            year: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAlex {
    pub base_url: Option<String>,
    pub page_size: usize,
    /// Contact address for the polite pool.
    pub mailto: Option<String>,
}

impl Default for OpenAlex {
    fn default() -> Self {
        Self {
            base_url: None,
            page_size: crate::providers::openalex::PAGE_SIZE,
            mailto: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Judge {
    pub relevance_char_limit: usize,
    pub finding_char_limit: usize,
}

impl Default for Judge {
    fn default() -> Self {
        Self {
            relevance_char_limit: crate::judge::relevance::DEFAULT_CHAR_LIMIT,
            finding_char_limit: crate::judge::findings::DEFAULT_CHAR_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Fetch {
    pub max_bytes: usize,
    pub max_chars: usize,
}

impl Default for Fetch {
    fn default() -> Self {
        Self {
            max_bytes: crate::fetch::DEFAULT_MAX_BYTES,
            max_chars: crate::fetch::DEFAULT_MAX_CHARS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Index {
    /// Cached searches kept before the cache is dropped wholesale.
    pub cache_capacity: usize,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            cache_capacity: crate::index::DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Research budgets. Every field is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Research {
    pub max_evaluations: usize,
    pub relevant_target: usize,
    pub local_min_documents: usize,
    pub local_min_relevant: usize,
    pub api_fetch_size: usize,
    pub relevance_threshold: u8,
    pub score_threshold: u8,
    pub local_search_limit: usize,
    pub local_keyword_count: usize,
    pub fallback_keyword_count: usize,
    pub full_text: bool,
    pub pause_ms: u64,
}

impl Research {
    pub fn budgets(&self) -> ResearchBudgets {
        ResearchBudgets {
            max_evaluations: self.max_evaluations,
            relevant_target: self.relevant_target,
            local_min_documents: self.local_min_documents,
            local_min_relevant: self.local_min_relevant,
            api_fetch_size: self.api_fetch_size,
            relevance_threshold: self.relevance_threshold,
            score_threshold: self.score_threshold,
            local_search_limit: self.local_search_limit,
            local_keyword_count: self.local_keyword_count,
            fallback_keyword_count: self.fallback_keyword_count,
            full_text: self.full_text,
            pause: Duration::from_millis(self.pause_ms),
        }
    }
}

pub fn load(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path).map_err(|source| Error::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|source| Error::ParseConfig {
        path: path.to_path_buf(),
        source,
    })?;

    normalize(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

fn normalize(cfg: &mut Config) {
    for value in [
        &mut cfg.oracle.model,
        &mut cfg.providers.semantic_scholar.publication_types,
        &mut cfg.providers.semantic_scholar.year,
        &mut cfg.providers.openalex.mailto,
    ] {
        normalize_optional(value);
    }
    for base_url in [
        &mut cfg.providers.semantic_scholar.base_url,
        &mut cfg.providers.openalex.base_url,
    ] {
        normalize_optional(base_url);
        if let Some(url) = base_url {
            *url = url.trim_end_matches('/').to_string();
        }
    }
}

fn normalize_optional(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
}

fn invalid(message: &str) -> Error {
    Error::Validation {
        message: message.to_string(),
    }
}

pub fn validate(cfg: &Config) -> Result<()> {
    let research = &cfg.research;
    if research.max_evaluations == 0 {
        return Err(invalid("research.max_evaluations must be greater than zero."));
    }
    if research.relevant_target == 0 {
        return Err(invalid("research.relevant_target must be greater than zero."));
    }
    if research.api_fetch_size == 0 {
        return Err(invalid("research.api_fetch_size must be greater than zero."));
    }
    if research.local_search_limit == 0 {
        return Err(invalid("research.local_search_limit must be greater than zero."));
    }
    if research.relevance_threshold > 10 {
        return Err(invalid("research.relevance_threshold must be in the range 0-10."));
    }
    if research.score_threshold > 10 {
        return Err(invalid("research.score_threshold must be in the range 0-10."));
    }

    let providers = &cfg.providers;
    if providers.max_attempts == 0 {
        return Err(invalid("providers.max_attempts must be greater than zero."));
    }
    if providers.base_delay_ms > providers.max_delay_ms {
        return Err(invalid("providers.base_delay_ms must not exceed providers.max_delay_ms."));
    }
    if providers.semantic_scholar.page_size == 0 {
        return Err(invalid("providers.semantic_scholar.page_size must be greater than zero."));
    }
    if providers.openalex.page_size == 0 {
        return Err(invalid("providers.openalex.page_size must be greater than zero."));
    }

    if cfg.oracle.max_attempts == 0 {
        return Err(invalid("oracle.max_attempts must be greater than zero."));
    }
    if cfg.judge.relevance_char_limit == 0 || cfg.judge.finding_char_limit == 0 {
        return Err(invalid("judge char limits must be greater than zero."));
    }
    if cfg.fetch.max_bytes == 0 || cfg.fetch.max_chars == 0 {
        return Err(invalid("fetch.max_bytes and fetch.max_chars must be greater than zero."));
    }
    if cfg.index.cache_capacity == 0 {
        return Err(invalid("index.cache_capacity must be greater than zero."));
    }
    if cfg.storage.path.as_os_str().is_empty() {
        return Err(invalid("storage.path must be non-empty."));
    }
    Ok(())
}
