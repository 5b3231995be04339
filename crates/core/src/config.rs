use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str) -> bool {
    matches!(
        profiled_env_or(profile, key, "false").to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub reference: ReferenceConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub analysis: AnalysisConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `DOCAUDIT_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("DOCAUDIT_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            reference: ReferenceConfig::from_env_profiled(p),
            chunking: ChunkingConfig::from_env_profiled(p),
            retrieval: RetrievalConfig::from_env_profiled(p),
            analysis: AnalysisConfig::from_env_profiled(p),
            llm: LlmConfig::from_env_profiled(p),
            embedding: EmbeddingConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject settings the chunker and worker pool cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.reference.reference_doc.is_none() {
            return Err(CoreError::InvalidConfig(
                "reference document is required (--reference-doc or REFERENCE_DOC)".into(),
            ));
        }
        if self.chunking.chunk_size == 0 {
            return Err(CoreError::InvalidConfig("CHUNK_SIZE must be positive".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(CoreError::InvalidConfig(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.analysis.prompt_reservation >= self.analysis.max_prompt_chars {
            return Err(CoreError::InvalidConfig(format!(
                "PROMPT_RESERVATION ({}) must be smaller than MAX_PROMPT_CHARS ({})",
                self.analysis.prompt_reservation, self.analysis.max_prompt_chars
            )));
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(CoreError::InvalidConfig(format!(
                "MIN_SIMILARITY must be within [0, 1], got {}",
                self.retrieval.min_similarity
            )));
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  reference:   doc={}, data_dir={}, force_reindex={}",
            self.reference
                .reference_doc
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".into()),
            self.reference.data_dir.display(),
            self.reference.force_reindex
        );
        tracing::info!(
            "  chunking:    size={}, overlap={}, method={}",
            self.chunking.chunk_size,
            self.chunking.chunk_overlap,
            self.chunking.chunk_method.as_deref().unwrap_or("(auto)")
        );
        tracing::info!(
            "  retrieval:   top_k={}, min_similarity={}",
            self.retrieval.top_k, self.retrieval.min_similarity
        );
        tracing::info!(
            "  analysis:    concurrency={}, prompt_chars={}",
            self.analysis.max_concurrency, self.analysis.max_prompt_chars
        );
        tracing::info!("  llm:         url={}, model={}", self.llm.url, self.llm.model);
        tracing::info!("  embedding:   url={}, model={}", self.embedding.url, self.embedding.model);
    }
}

// ── Reference document ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub reference_doc: Option<PathBuf>,
    pub data_dir: PathBuf,
    /// Rebuild the index even when a snapshot exists.
    pub force_reindex: bool,
    /// Pause between sequential add-to-store calls while indexing.
    pub index_delay_ms: u64,
}

impl ReferenceConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            reference_doc: profiled_env_opt(p, "REFERENCE_DOC").map(PathBuf::from),
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "./data")),
            force_reindex: profiled_env_bool(p, "FORCE_REINDEX"),
            index_delay_ms: profiled_env_parse(p, "INDEX_DELAY_MS", 150),
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            reference_doc: None,
            data_dir: PathBuf::from("./data"),
            force_reindex: false,
            index_delay_ms: 150,
        }
    }
}

// ── Chunking ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters carried from the tail of one chunk into the next.
    pub chunk_overlap: usize,
    /// Explicit chunker name; `None` sniffs the file extension.
    pub chunk_method: Option<String>,
}

impl ChunkingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            chunk_size: profiled_env_parse(p, "CHUNK_SIZE", 1000),
            chunk_overlap: profiled_env_parse(p, "CHUNK_OVERLAP", 200),
            chunk_method: profiled_env_opt(p, "CHUNK_METHOD"),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            chunk_method: None,
        }
    }
}

// ── Retrieval ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_similarity: f32,
}

impl RetrievalConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            top_k: profiled_env_parse(p, "TOP_K", 5),
            min_similarity: profiled_env_parse(p, "MIN_SIMILARITY", 0.5),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5, min_similarity: 0.5 }
    }
}

// ── Analysis pipeline ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Upper bound on concurrently running chunk workers.
    pub max_concurrency: usize,
    /// Total character budget for an outgoing prompt.
    pub max_prompt_chars: usize,
    /// Characters held back for the instruction block.
    pub prompt_reservation: usize,
}

impl AnalysisConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_concurrency: profiled_env_parse::<usize>(p, "MAX_CONCURRENCY", 3).max(1),
            max_prompt_chars: profiled_env_parse(p, "MAX_PROMPT_CHARS", 6000),
            prompt_reservation: profiled_env_parse(p, "PROMPT_RESERVATION", 500),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            max_prompt_chars: 6000,
            prompt_reservation: 500,
        }
    }
}

// ── Generative model (OpenAI-compatible) ──────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL, e.g. `http://localhost:11434/v1`; `/chat/completions` is appended.
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "LLM_URL", "http://localhost:11434/v1"),
            api_key: profiled_env_opt(p, "LLM_API_KEY"),
            model: profiled_env_or(p, "LLM_MODEL", "gemma3"),
            max_tokens: profiled_env_parse(p, "LLM_MAX_TOKENS", 2048),
            temperature: profiled_env_parse(p, "LLM_TEMPERATURE", 0.3),
            timeout_secs: profiled_env_parse(p, "LLM_TIMEOUT_SECS", 300),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/v1".into(),
            api_key: None,
            model: "gemma3".into(),
            max_tokens: 2048,
            temperature: 0.3,
            timeout_secs: 300,
        }
    }
}

// ── Embedding ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL; `/embeddings` is appended.
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl EmbeddingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "EMBED_URL", "http://localhost:11434/v1"),
            api_key: profiled_env_opt(p, "EMBED_API_KEY"),
            model: profiled_env_or(p, "EMBED_MODEL", "nomic-embed-text"),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/v1".into(),
            api_key: None,
            model: "nomic-embed-text".into(),
        }
    }
}
