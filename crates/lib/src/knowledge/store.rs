//! In-memory similarity index over chunked documents.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    cosine_similarity, Chunker, Document, Embedder, KnowledgeRetriever, RetrievedChunk,
    RetrieverError,
};

/// Metadata key/value pairs a chunk must carry to be returned. `source` matches the document source.
pub type MetadataFilter = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone)]
struct IndexedChunk {
    document_id: String,
    source: String,
    text: String,
    metadata: BTreeMap<String, serde_json::Value>,
    embedding: Vec<f32>,
}

impl IndexedChunk {
    fn matches(&self, filter: &MetadataFilter) -> bool {
        filter.iter().all(|(key, want)| match self.metadata.get(key) {
            Some(have) => have == want,
            None => key == "source" && want.as_str() == Some(self.source.as_str()),
        })
    }
}

/// Counts reported by `KnowledgeBase::stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeStats {
    pub documents: usize,
    pub chunks: usize,
    pub embedder: String,
}

/// Chunk embeddings held in memory; searched by cosine similarity.
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    index: Arc<RwLock<Vec<IndexedChunk>>>,
}

impl KnowledgeBase {
    pub fn new(embedder: Arc<dyn Embedder>, chunker: Chunker) -> Self {
        Self {
            embedder,
            chunker,
            index: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Chunk, embed and index documents. Returns the number of chunks added.
    /// Nothing is indexed if embedding fails.
    pub async fn add_documents(&self, documents: &[Document]) -> Result<usize, RetrieverError> {
        let mut pending: Vec<(&Document, String)> = Vec::new();
        for doc in documents {
            for text in self.chunker.split(&doc.text) {
                pending.push((doc, text));
            }
        }
        if pending.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = pending.iter().map(|(_, t)| t.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != pending.len() {
            return Err(RetrieverError::Embedding(format!(
                "expected {} vectors, got {}",
                pending.len(),
                embeddings.len()
            )));
        }
        let added = pending.len();
        let mut index = self.index.write().await;
        index.extend(
            pending
                .into_iter()
                .zip(embeddings)
                .map(|((doc, text), embedding)| IndexedChunk {
                    document_id: doc.id.clone(),
                    source: doc.source.clone(),
                    text,
                    metadata: doc.metadata.clone(),
                    embedding,
                }),
        );
        log::info!(
            "knowledge: indexed {} chunk(s) from {} document(s)",
            added,
            documents.len()
        );
        Ok(added)
    }

    pub async fn stats(&self) -> KnowledgeStats {
        let index = self.index.read().await;
        let documents: HashSet<&str> = index.iter().map(|c| c.document_id.as_str()).collect();
        KnowledgeStats {
            documents: documents.len(),
            chunks: index.len(),
            embedder: self.embedder.name(),
        }
    }

    /// Search restricted to chunks whose metadata matches every entry of `filter`.
    /// An empty filter searches everything.
    pub async fn search_filtered(
        &self,
        query: &str,
        top_k: usize,
        min_score: f32,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedChunk>, RetrieverError> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RetrieverError::Embedding("no query vector returned".to_string()))?;

        let index = self.index.read().await;
        let mut hits: Vec<RetrievedChunk> = index
            .iter()
            .filter(|c| c.matches(filter))
            .map(|c| RetrievedChunk {
                source_id: c.source.clone(),
                text: c.text.clone(),
                score: cosine_similarity(&query_vec, &c.embedding).clamp(0.0, 1.0),
            })
            .filter(|c| c.score >= min_score)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        log::debug!("knowledge: {} hit(s) for query", hits.len());
        Ok(hits)
    }

    /// Drop every indexed chunk.
    pub async fn clear(&self) {
        self.index.write().await.clear();
        log::info!("knowledge: index cleared");
    }
}

#[async_trait]
impl KnowledgeRetriever for KnowledgeBase {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievedChunk>, RetrieverError> {
        self.search_filtered(query, top_k, min_score, &MetadataFilter::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::HashingEmbedder;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new(Arc::new(HashingEmbedder::new(256)), Chunker::new(50, 5))
    }

    fn docs() -> Vec<Document> {
        vec![
            Document::new(
                "return_policy.md",
                "Our return policy allows returns within 30 days of purchase.",
            ),
            Document::new(
                "shipping.md",
                "Standard shipping takes 3-5 business days. Express shipping is available.",
            ),
            Document::new("warranty.md", "All electronics include a one year warranty."),
        ]
    }

    #[tokio::test]
    async fn best_match_first_and_min_score_applied() {
        let kb = kb();
        assert_eq!(kb.add_documents(&docs()).await.unwrap(), 3);

        let hits = kb.search("what is the return policy", 5, 0.2).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].source_id, "return_policy.md");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(hits.iter().all(|h| h.score >= 0.2 && h.score <= 1.0));

        let none = kb.search("zebra xylophone", 5, 0.5).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn top_k_truncates() {
        let kb = kb();
        kb.add_documents(&docs()).await.unwrap();
        let hits = kb.search("shipping returns warranty days", 1, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(kb.search("shipping", 0, 0.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_and_clear() {
        let kb = kb();
        kb.add_documents(&docs()).await.unwrap();
        let stats = kb.stats().await;
        assert_eq!(stats.documents, 3);
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.embedder, "hashing-256");
        kb.clear().await;
        assert_eq!(kb.stats().await.chunks, 0);
        assert!(kb.search("return policy", 5, 0.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn metadata_filter_restricts_hits() {
        let kb = kb();
        let mut docs = docs();
        docs[0]
            .metadata
            .insert("category".to_string(), serde_json::json!("policy"));
        docs[2]
            .metadata
            .insert("category".to_string(), serde_json::json!("policy"));
        kb.add_documents(&docs).await.unwrap();

        let mut filter = MetadataFilter::new();
        filter.insert("category".to_string(), serde_json::json!("policy"));
        let hits = kb
            .search_filtered("shipping returns warranty days", 5, 0.0, &filter)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.source_id != "shipping.md"));

        let mut by_source = MetadataFilter::new();
        by_source.insert("source".to_string(), serde_json::json!("shipping.md"));
        let hits = kb
            .search_filtered("shipping returns warranty days", 5, 0.0, &by_source)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_id, "shipping.md");

        let mut nothing = MetadataFilter::new();
        nothing.insert("category".to_string(), serde_json::json!("billing"));
        assert!(kb
            .search_filtered("return policy", 5, 0.0, &nothing)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn csv_rows_are_searchable_by_row_number() {
        let kb = kb();
        let rows = crate::knowledge::parse_csv_documents(
            "product,warranty\nKettle,1 year\nToaster,2 years\n",
            "catalog.csv",
        )
        .unwrap();
        kb.add_documents(&rows).await.unwrap();
        let mut filter = MetadataFilter::new();
        filter.insert("row_number".to_string(), serde_json::json!(1));
        let hits = kb.search_filtered("warranty", 5, 0.0, &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("Toaster"));
    }
}
