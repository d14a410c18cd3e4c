//! Embedder trait and the shared embedding configuration

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;

use crate::{Error, Result};

/// Embedding model settings shared by ingestion and serving.
///
/// Both sides of the system must embed with the same model and dimension or
/// nearest-neighbour search silently degrades, so this is the one place the
/// model name and dimension are defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            dimension: Self::DEFAULT_DIMENSION,
            max_input_chars: 8000,
        }
    }
}

impl EmbeddingConfig {
    pub const DEFAULT_MODEL: &'static str = "text-embedding-004";
    pub const DEFAULT_DIMENSION: usize = 384;

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            if model.trim().is_empty() {
                return Err(Error::Configuration(
                    "EMBEDDING_MODEL is set but empty".to_string(),
                ));
            }
            config.model = model.trim().to_string();
        }

        if let Ok(raw) = env::var("EMBEDDING_DIMENSION") {
            config.dimension = raw.trim().parse().map_err(|_| {
                Error::Configuration(format!("EMBEDDING_DIMENSION is not a number: {}", raw))
            })?;
        }

        if config.dimension == 0 {
            return Err(Error::Configuration(
                "EMBEDDING_DIMENSION must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }

    /// Reject input the model cannot embed before spending a request on it.
    pub fn validate_input(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::Embedding("cannot embed empty text".to_string()));
        }
        let len = text.chars().count();
        if len > self.max_input_chars {
            return Err(Error::Embedding(format!(
                "input of {} characters exceeds the {} character limit of {}",
                len, self.max_input_chars, self.model
            )));
        }
        Ok(())
    }

    /// Check a vector returned by the model against the configured dimension.
    pub fn check_vector(&self, vector: &[f32]) -> Result<()> {
        ensure_dimension(self.dimension, vector.len())
    }
}

/// Fail unless `actual` equals `expected`.
pub fn ensure_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Trait for text embedding models
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning vectors in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The model and dimension this embedder produces
    fn config(&self) -> &EmbeddingConfig;

    fn dimension(&self) -> usize {
        self.config().dimension
    }
}
