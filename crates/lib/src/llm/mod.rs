//! LLM abstraction with Ollama and OpenAI-compatible clients.
//!
//! Both clients support non-streaming chat, embeddings and model listing. `Backend` picks
//! one of them from config so the rest of the crate only sees `LlmBackend`.

mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{self, BackendKind, Config};

/// One chat message on the wire (role is "system", "user" or "assistant").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling options passed with every chat request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("llm api error: {0}")]
    Api(String),
    #[error("llm response malformed: {0}")]
    Malformed(String),
}

/// Chat and embedding calls against an LLM server.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short backend name for logs ("ollama", "openai").
    fn name(&self) -> &'static str;

    /// Non-streaming chat completion; returns the assistant message content.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, LlmError>;

    /// One embedding vector per input, in input order.
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Model ids the server reports.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

#[async_trait]
impl<T: LlmBackend + ?Sized> LlmBackend for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, LlmError> {
        (**self).chat(model, messages, options).await
    }

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        (**self).embed(model, inputs).await
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        (**self).list_models().await
    }
}

const DEFAULT_MODEL_OLLAMA: &str = "llama3.2:latest";
const DEFAULT_MODEL_OPENAI: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL_OLLAMA: &str = "nomic-embed-text";
const DEFAULT_EMBEDDING_MODEL_OPENAI: &str = "text-embedding-3-small";

/// Backend chosen by `llm.backend`.
#[derive(Clone)]
pub enum Backend {
    Ollama(OllamaClient),
    OpenAi(OpenAiClient),
}

impl Backend {
    pub fn from_config(config: &Config) -> Self {
        let base_url = config::resolve_llm_base_url(config);
        match config.llm.backend {
            BackendKind::Ollama => Backend::Ollama(OllamaClient::new(base_url)),
            BackendKind::Openai => Backend::OpenAi(OpenAiClient::new(
                base_url,
                config::resolve_llm_api_key(config),
            )),
        }
    }

    /// Chat model from config/env, falling back to a per-backend default.
    pub fn resolve_model(&self, config: &Config) -> String {
        config::resolve_model(config).unwrap_or_else(|| {
            let fallback = match self {
                Backend::Ollama(_) => DEFAULT_MODEL_OLLAMA,
                Backend::OpenAi(_) => DEFAULT_MODEL_OPENAI,
            };
            log::debug!("llm: no model configured, using {}", fallback);
            fallback.to_string()
        })
    }

    /// Embedding model from config, falling back to a per-backend default.
    pub fn resolve_embedding_model(&self, config: &Config) -> String {
        config
            .llm
            .embedding_model
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| match self {
                Backend::Ollama(_) => DEFAULT_EMBEDDING_MODEL_OLLAMA.to_string(),
                Backend::OpenAi(_) => DEFAULT_EMBEDDING_MODEL_OPENAI.to_string(),
            })
    }
}

#[async_trait]
impl LlmBackend for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Ollama(c) => c.name(),
            Backend::OpenAi(c) => c.name(),
        }
    }

    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, LlmError> {
        match self {
            Backend::Ollama(c) => c.chat(model, messages, options).await,
            Backend::OpenAi(c) => c.chat(model, messages, options).await,
        }
    }

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        match self {
            Backend::Ollama(c) => c.embed(model, inputs).await,
            Backend::OpenAi(c) => c.embed(model, inputs).await,
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        match self {
            Backend::Ollama(c) => c.list_models().await,
            Backend::OpenAi(c) => c.list_models().await,
        }
    }
}
