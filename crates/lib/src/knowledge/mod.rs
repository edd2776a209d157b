//! Knowledge retrieval: the retriever capability used by the decision loop and an
//! in-memory similarity index that implements it.
//!
//! Documents are loaded from the knowledge directory, chunked, embedded and searched
//! by cosine similarity. Vector storage is deliberately simple: everything lives in memory
//! and is rebuilt from the directory at startup.

mod chunker;
mod embed;
mod loader;
mod store;

pub use chunker::Chunker;
pub use embed::{cosine_similarity, BackendEmbedder, Embedder, HashingEmbedder};
pub use loader::{load_dir, parse_csv_documents, parse_json_documents, Document, SUPPORTED_EXTENSIONS};
pub use store::{KnowledgeBase, KnowledgeStats, MetadataFilter};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chunk returned by a search. Lives for one turn only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Identifier of the document the chunk came from (e.g. "return_policy.md").
    pub source_id: String,
    pub text: String,
    /// Similarity in [0, 1].
    pub score: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("retriever unavailable: {0}")]
    Unavailable(String),
}

impl From<crate::llm::LlmError> for RetrieverError {
    fn from(e: crate::llm::LlmError) -> Self {
        RetrieverError::Embedding(e.to_string())
    }
}

/// Search capability the decision loop retrieves through.
///
/// Returns at most `top_k` chunks with `score >= min_score`, best first. An empty
/// result is a valid answer, not an error.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievedChunk>, RetrieverError>;
}
