//! Documents and chunks flowing through the ingestion pipeline

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A page of text as produced by a document loader, with whatever metadata
/// the loader attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedDocument {
    pub page_content: String,
    pub metadata: serde_json::Value,
}

impl LoadedDocument {
    /// The `source` metadata entry, if the loader set one.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|s| s.as_str())
    }
}

/// A document reduced to its text and source attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source: String,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
        }
    }
}

/// A bounded slice of a document, the unit that gets embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    /// Ordinal of this chunk among all chunks cut from the same source.
    pub position: usize,
}

/// Parameters for splitting documents into chunks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 20,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}
