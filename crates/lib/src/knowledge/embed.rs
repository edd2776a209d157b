//! Embedders: text -> unit vectors.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::RetrieverError;
use crate::llm::LlmBackend;

/// Produces one vector per input text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> String;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrieverError>;
}

/// Feature-hashed bag of words. Deterministic within a build, needs no server.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dim];
        for token in tokens(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dim;
            vec[idx] += 1.0;
        }
        normalize(&mut vec);
        vec
    }
}

/// Lowercased alphanumeric tokens; punctuation splits words ("policy?" -> "policy").
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> String {
        format!("hashing-{}", self.dim)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrieverError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Embeddings from the configured LLM backend's embedding endpoint.
pub struct BackendEmbedder<B> {
    backend: B,
    model: String,
}

impl<B: LlmBackend> BackendEmbedder<B> {
    pub fn new(backend: B, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

#[async_trait]
impl<B: LlmBackend> Embedder for BackendEmbedder<B> {
    fn name(&self) -> String {
        format!("{}:{}", self.backend.name(), self.model)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrieverError> {
        let mut vectors = self.backend.embed(&self.model, texts).await?;
        for v in vectors.iter_mut() {
            normalize(v);
        }
        Ok(vectors)
    }
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity; 0.0 for empty, zero or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_embedder_is_unit_length_and_stable() {
        let e = HashingEmbedder::new(64);
        let a = e.embed_one("Return policy: 30 days");
        let b = e.embed_one("return POLICY 30 days!");
        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let e = HashingEmbedder::new(8);
        let v = e.embed_one("   ");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &v), 0.0);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }
}
