//! Retrieval-augmented responder

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use medrag_core::{
    Answer, ChatModel, Embedder, Error, Responder, Result, RetrievedContext, ScoredRecord,
    SearchConfig, VectorIndex, ensure_dimension,
};

use crate::prompt::{build_prompt, ensure_disclaimer};

pub const DEFAULT_TOP_K: usize = 3;

/// Answers questions from the top matches in a vector index
pub struct RagResponder<E: Embedder + ?Sized, V: VectorIndex + ?Sized, C: ChatModel + ?Sized> {
    embedder: Arc<E>,
    index: Arc<V>,
    chat_model: Arc<C>,
    search: SearchConfig,
}

impl<E, V, C> RagResponder<E, V, C>
where
    E: Embedder + ?Sized,
    V: VectorIndex + ?Sized,
    C: ChatModel + ?Sized,
{
    /// Fails when the embedder and the index disagree on vector dimension
    pub fn new(embedder: Arc<E>, index: Arc<V>, chat_model: Arc<C>) -> Result<Self> {
        ensure_dimension(index.spec().dimension, embedder.dimension())?;
        Ok(Self {
            embedder,
            index,
            chat_model,
            search: SearchConfig {
                top_k: DEFAULT_TOP_K,
                include_metadata: true,
                score_threshold: None,
            },
        })
    }

    pub fn with_top_k(mut self, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::Configuration(
                "top_k must be greater than zero".to_string(),
            ));
        }
        self.search.top_k = top_k;
        Ok(self)
    }

    fn build_context(&self, matches: Vec<ScoredRecord>) -> RetrievedContext {
        let context = matches
            .iter()
            .filter_map(|m| m.metadata.as_ref().map(|meta| meta.text.as_str()))
            .collect::<Vec<_>>()
            .join("\n");

        RetrievedContext {
            has_context: !context.trim().is_empty(),
            matches,
            context,
        }
    }
}

#[async_trait]
impl<E, V, C> Responder for RagResponder<E, V, C>
where
    E: Embedder + ?Sized,
    V: VectorIndex + ?Sized,
    C: ChatModel + ?Sized,
{
    async fn retrieve(&self, question: &str) -> Result<RetrievedContext> {
        let vector = self.embedder.embed(question).await?;
        let matches = self.index.query(&vector, &self.search).await?;
        debug!("Retrieved {} matches", matches.len());
        Ok(self.build_context(matches))
    }

    async fn respond(&self, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(Error::Validation("No message provided".to_string()));
        }

        let context = self.retrieve(question).await?;
        let prompt = build_prompt(&context, question);

        let generated = self.chat_model.generate(&prompt).await?;
        info!(
            "Generated answer with {} ({} matches, context: {})",
            generated.model_id,
            context.matches.len(),
            context.has_context
        );

        Ok(Answer {
            text: ensure_disclaimer(&generated.text),
            has_context: context.has_context,
            sources: context.sources(),
        })
    }
}
