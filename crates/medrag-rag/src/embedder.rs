//! Deterministic feature-hashing embedder
//!
//! Produces unit-length vectors from word and bigram hashes. It needs no
//! model or network, which makes it the embedder used by the test suites.
//! Its vectors are not comparable with those of a sentence-embedding model,
//! so an index must never mix the two.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use medrag_core::{Embedder, EmbeddingConfig, Result};

pub struct HashingEmbedder {
    config: EmbeddingConfig,
}

impl HashingEmbedder {
    pub const MODEL_NAME: &'static str = "feature-hashing";

    /// Panics if `dimension` is zero.
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "embedding dimension must be greater than zero");
        Self {
            config: EmbeddingConfig {
                model: Self::MODEL_NAME.to_string(),
                dimension,
                ..Default::default()
            },
        }
    }

    fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let dimension = self.config.dimension;
        let normalized: String = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let mut vector = vec![0.0f32; dimension];

        for (i, word) in words.iter().enumerate() {
            let hash = Self::hash_of(*word);
            // Earlier words weigh slightly more.
            let weight = 1.0 / (1.0 + i as f32 * 0.1);
            vector[(hash as usize) % dimension] += weight;

            if word.len() > 3 {
                vector[((hash >> 16) as usize) % dimension] += weight * 0.5;
            }
        }

        for window in words.windows(2) {
            let hash = Self::hash_of(&format!("{} {}", window[0], window[1]));
            vector[(hash as usize) % dimension] += 0.3;
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.config.validate_input(text)?;
        Ok(self.generate(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}
