//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.concierge/config.json`) and environment.
//! Every field has a default, so an empty `{}` file is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Decision loop thresholds and limits.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Chat/embedding backend (Ollama or an OpenAI-compatible server).
    #[serde(default)]
    pub llm: LlmConfig,

    /// Knowledge base location, chunking and embedder.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

/// Thresholds for one conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Answers below this self-reported confidence become a clarification request (default 0.7).
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Number of chunks requested from the retriever (default 5).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Chunks scoring below this similarity are dropped (default 0.5).
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    /// Messages with intent "other" shorter than this many characters are small talk and skip retrieval (default 16).
    #[serde(default = "default_small_talk_max_chars")]
    pub small_talk_max_chars: usize,
    /// Timeout applied to every retriever/generator call, in seconds (default 30).
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Most recent conversation messages passed to the generator (default 20).
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
}

fn default_confidence_threshold() -> f32 {
    0.7
}

fn default_top_k() -> usize {
    5
}

fn default_min_similarity() -> f32 {
    0.5
}

fn default_small_talk_max_chars() -> usize {
    16
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_max_history_messages() -> usize {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            small_talk_max_chars: default_small_talk_max_chars(),
            call_timeout_secs: default_call_timeout_secs(),
            max_history_messages: default_max_history_messages(),
        }
    }
}

/// Which LLM server speaks for the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ollama native API (`/api/chat`, `/api/embed`).
    #[default]
    Ollama,
    /// OpenAI-compatible API (`/chat/completions`, `/embeddings`), e.g. LM Studio or OpenAI.
    #[serde(alias = "lmstudio", alias = "lm_studio")]
    Openai,
}

/// LLM backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Server base URL. When absent the backend's local default is used. Overridden by CONCIERGE_LLM_BASE_URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Chat model id as the backend names it (e.g. "llama3.2:latest"). Overridden by CONCIERGE_MODEL.
    #[serde(default)]
    pub model: Option<String>,
    /// Embedding model id, used when knowledge.embedder is "backend".
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Bearer token for OpenAI-compatible servers. Overridden by CONCIERGE_LLM_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            base_url: None,
            model: None,
            embedding_model: None,
            temperature: default_temperature(),
            api_key: None,
        }
    }
}

/// How chunk and query vectors are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Feature-hashed bag of words computed locally. No server needed.
    #[default]
    Hashing,
    /// The configured LLM backend's embedding endpoint.
    Backend,
}

/// Knowledge base settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeConfig {
    /// Directory of .md/.txt/.json documents. Relative paths are resolved against the config file's parent. Default: `knowledge` next to the config file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub embedder: EmbedderKind,
    /// Words per chunk (default 200).
    #[serde(default = "default_chunk_words")]
    pub chunk_words: usize,
    /// Words shared by consecutive chunks (default 20).
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Vector width of the hashing embedder (default 512).
    #[serde(default = "default_hashing_dimensions")]
    pub hashing_dimensions: usize,
}

fn default_chunk_words() -> usize {
    200
}

fn default_chunk_overlap() -> usize {
    20
}

fn default_hashing_dimensions() -> usize {
    512
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            directory: None,
            embedder: EmbedderKind::default(),
            chunk_words: default_chunk_words(),
            chunk_overlap: default_chunk_overlap(),
            hashing_dimensions: default_hashing_dimensions(),
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the backend base URL: env CONCIERGE_LLM_BASE_URL overrides config.
pub fn resolve_llm_base_url(config: &Config) -> Option<String> {
    env_nonempty("CONCIERGE_LLM_BASE_URL").or_else(|| trimmed(config.llm.base_url.as_ref()))
}

/// Resolve the backend API key: env CONCIERGE_LLM_API_KEY overrides config.
pub fn resolve_llm_api_key(config: &Config) -> Option<String> {
    env_nonempty("CONCIERGE_LLM_API_KEY").or_else(|| trimmed(config.llm.api_key.as_ref()))
}

/// Resolve the chat model: env CONCIERGE_MODEL overrides config.
pub fn resolve_model(config: &Config) -> Option<String> {
    env_nonempty("CONCIERGE_MODEL").or_else(|| trimmed(config.llm.model.as_ref()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("CONCIERGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".concierge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, or the default path (or CONCIERGE_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving the config directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Default knowledge directory: `knowledge` subdirectory of the config file's parent.
pub fn knowledge_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("knowledge")
}

/// Resolve the knowledge directory: `config.knowledge.directory` if set (relative paths resolved against the config file's parent), otherwise the default.
pub fn resolve_knowledge_dir(config: &Config, config_path: &Path) -> PathBuf {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.knowledge.directory {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                config_parent.join(d)
            }
        }
        _ => knowledge_dir(config_path),
    }
}
