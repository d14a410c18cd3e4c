//! Core traits and types for medrag
//!
//! This crate defines the data model and the capability-facing interfaces
//! for embedders, vector indexes, chat models and responders, so the
//! ingestion job and the HTTP server can be tested without live services.

pub mod document;
pub mod embedder;
pub mod error;
pub mod llm;
pub mod rag;
pub mod vector_store;

pub use document::{Chunk, ChunkingConfig, Document, LoadedDocument};
pub use embedder::{Embedder, EmbeddingConfig, ensure_dimension};
pub use error::{Error, Result};
pub use llm::{ChatModel, GenerationConfig, GenerationResult};
pub use rag::{Answer, Responder, RetrievedContext};
pub use vector_store::{
    DistanceMetric, IndexSpec, IndexStats, RecordMetadata, ScoredRecord, SearchConfig,
    VectorIndex, VectorRecord,
};
