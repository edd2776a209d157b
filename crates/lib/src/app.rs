//! Wire config, backend, knowledge base and agent together.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::{LlmGenerator, SupportAgent};
use crate::config::{self, Config, EmbedderKind};
use crate::knowledge::{
    load_dir, BackendEmbedder, Chunker, Embedder, HashingEmbedder, KnowledgeBase,
};
use crate::llm::{Backend, LlmBackend};

/// A ready-to-use agent and the pieces it was built from.
pub struct App {
    pub config: Config,
    pub config_path: PathBuf,
    pub backend: Backend,
    pub model: String,
    pub knowledge: Arc<KnowledgeBase>,
    pub agent: SupportAgent,
}

/// Embedder selected by `knowledge.embedder`.
pub fn build_embedder(config: &Config, backend: &Backend) -> Arc<dyn Embedder> {
    match config.knowledge.embedder {
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::new(config.knowledge.hashing_dimensions)),
        EmbedderKind::Backend => {
            let model = backend.resolve_embedding_model(config);
            Arc::new(BackendEmbedder::new(backend.clone(), model))
        }
    }
}

/// Build an empty knowledge base and index every document under `dir`.
pub async fn load_knowledge(
    config: &Config,
    backend: &Backend,
    dir: &Path,
) -> Result<Arc<KnowledgeBase>> {
    let chunker = Chunker::new(config.knowledge.chunk_words, config.knowledge.chunk_overlap);
    let kb = KnowledgeBase::new(build_embedder(config, backend), chunker);
    let documents = load_dir(dir)?;
    if documents.is_empty() {
        log::warn!("knowledge: no documents found in {}", dir.display());
    } else {
        let chunks = kb
            .add_documents(&documents)
            .await
            .with_context(|| format!("indexing documents from {}", dir.display()))?;
        log::info!(
            "knowledge: indexed {} document(s) as {} chunk(s) from {}",
            documents.len(),
            chunks,
            dir.display()
        );
    }
    Ok(Arc::new(kb))
}

/// Build the app from an already loaded config.
pub async fn build(config: Config, config_path: PathBuf) -> Result<App> {
    let backend = Backend::from_config(&config);
    let model = backend.resolve_model(&config);
    log::info!("agent: using {} model {}", backend.name(), model);

    let dir = config::resolve_knowledge_dir(&config, &config_path);
    let knowledge = load_knowledge(&config, &backend, &dir).await?;

    let generator = LlmGenerator::new(backend.clone(), model.clone())
        .with_temperature(config.llm.temperature)
        .with_max_history(config.agent.max_history_messages);
    let agent = SupportAgent::new(knowledge.clone(), Arc::new(generator), config.agent.clone());

    Ok(App {
        config,
        config_path,
        backend,
        model,
        knowledge,
        agent,
    })
}

