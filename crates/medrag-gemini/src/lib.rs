//! Gemini integration for medrag
//!
//! This crate provides the Gemini implementation of both the `ChatModel` and
//! the `Embedder` traits, so ingestion and serving embed through the same
//! client and configuration.

mod client;
mod config;


pub use client::GeminiClient;
pub use config::GeminiConfig;

// Re-export core types for convenience
pub use medrag_core::{
    ChatModel, Embedder, EmbeddingConfig, GenerationConfig, GenerationResult, Error, Result,
};
