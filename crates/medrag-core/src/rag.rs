//! Retrieval-augmented responder trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Result, ScoredRecord};

/// What retrieval found for a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub matches: Vec<ScoredRecord>,
    /// Matched texts joined with newlines, best match first
    pub context: String,
    /// False when no match carried any text
    pub has_context: bool,
}

impl RetrievedContext {
    pub fn empty() -> Self {
        Self {
            matches: Vec::new(),
            context: String::new(),
            has_context: false,
        }
    }

    /// Distinct sources of the matches, in match order
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for source in self
            .matches
            .iter()
            .filter_map(|m| m.metadata.as_ref().map(|meta| &meta.source))
        {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
        sources
    }
}

/// An answer to a user question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub has_context: bool,
    pub sources: Vec<String>,
}

/// Trait for question answering over the vector index
#[async_trait]
pub trait Responder: Send + Sync {
    /// Retrieve the context for a question without generating an answer
    async fn retrieve(&self, question: &str) -> Result<RetrievedContext>;

    /// Answer a question
    async fn respond(&self, question: &str) -> Result<Answer>;
}
