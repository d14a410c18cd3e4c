//! Vector index trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Similarity metric an index is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclidean,
}

/// Name, dimension and metric of an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
}

impl IndexSpec {
    /// Fallback index name when none is configured
    pub const DEFAULT_NAME: &'static str = "medi-chatbot";

    pub fn cosine(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Metadata stored alongside every vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub text: String,
    pub source: String,
}

/// A vector and its metadata as stored in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// A query hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub metadata: Option<RecordMetadata>,
}

/// Configuration for vector search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub top_k: usize,
    pub include_metadata: bool,
    pub score_threshold: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            include_metadata: true,
            score_threshold: None,
        }
    }
}

/// Summary reported by an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub name: String,
    pub dimension: usize,
    pub total_vector_count: u64,
}

/// Trait for vector indexes (e.g., Qdrant, Pinecone, etc.)
///
/// Implementations must reject vectors whose length differs from
/// `spec().dimension` instead of coercing them, and must surface
/// connectivity failures as errors rather than empty results.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The index this handle points at
    fn spec(&self) -> &IndexSpec;

    /// Whether the index already exists on the backing service
    async fn exists(&self) -> Result<bool>;

    /// Create the index with the configured dimension and metric
    async fn create(&self) -> Result<()>;

    /// Create the index unless it already exists. Returns `true` when it was created.
    async fn ensure_exists(&self) -> Result<bool> {
        if self.exists().await? {
            return Ok(false);
        }
        self.create().await?;
        Ok(true)
    }

    /// Insert or overwrite records, returning how many were written
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize>;

    /// Nearest neighbours of `vector`, best match first
    async fn query(&self, vector: &[f32], config: &SearchConfig) -> Result<Vec<ScoredRecord>>;

    /// Current index statistics
    async fn stats(&self) -> Result<IndexStats>;
}
