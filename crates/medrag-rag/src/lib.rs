//! Ingestion and retrieval for the medrag chatbot
//!
//! The offline side turns a directory of PDFs into records in a vector
//! index. The online side embeds a question, retrieves the closest chunks
//! and asks a chat model to answer from them.

pub mod chunker;
pub mod embedder;
pub mod engine;
pub mod loader;
pub mod pipeline;
pub mod prompt;
pub mod vector_store;

#[cfg(test)]
mod tests;

pub use chunker::TextSplitter;
pub use embedder::HashingEmbedder;
pub use engine::{DEFAULT_TOP_K, RagResponder};
pub use loader::{PdfDirectoryLoader, filter_to_minimal_docs, load_pdf_file};
pub use pipeline::{
    DEFAULT_BATCH_SIZE, IngestionEvent, IngestionPipeline, IngestionReport, Stage, record_id,
};
pub use prompt::{DISCLAIMER, build_prompt, ensure_disclaimer, has_disclaimer};
pub use vector_store::{InMemoryVectorIndex, QdrantIndexConfig, QdrantVectorIndex};
