//! Gemini REST client implementation

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use medrag_core::{
    ChatModel, Embedder, EmbeddingConfig, Error, GenerationConfig, GenerationResult, Result,
};

use crate::config::GeminiConfig;

/// Gemini client serving both chat completions and embeddings
pub struct GeminiClient {
    config: GeminiConfig,
    embedding: EmbeddingConfig,
    client: Client,
    batch_size: usize,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn user(text: &'a str) -> Self {
        Self {
            role: Some("user"),
            parts: vec![Part { text }],
        }
    }

    fn plain(text: &'a str) -> Self {
        Self {
            role: None,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationParams,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
    output_dimensionality: usize,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u32>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GeminiClient {
    /// Most requests the batch embedding endpoint accepts at once
    pub const MAX_BATCH_SIZE: usize = 100;

    /// Create a new Gemini client from configuration
    pub fn new(config: GeminiConfig, embedding: EmbeddingConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            embedding,
            client,
            batch_size: 64,
        })
    }

    /// Create a new Gemini client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = GeminiConfig::from_env()?;
        let embedding = EmbeddingConfig::from_env()?;
        Self::new(config, embedding)
    }

    /// Set how many texts go into one batch embedding request
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, Self::MAX_BATCH_SIZE);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.api_url.trim_end_matches('/'),
            model.trim_start_matches("models/"),
            method
        )
    }

    fn qualified_embedding_model(&self) -> String {
        let model = &self.embedding.model;
        if model.starts_with("models/") {
            model.clone()
        } else {
            format!("models/{}", model)
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> reqwest::Result<Response> {
        self.client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
    }

    /// Perform the actual generation request
    async fn perform_generation(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let request_body = GenerateRequest {
            contents: vec![Content::user(prompt)],
            generation_config: GenerationParams {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                stop_sequences: config.stop_sequences.clone(),
            },
        };

        let url = self.endpoint(&config.model_id, "generateContent");
        debug!("Calling {} ({} prompt chars)", config.model_id, prompt.chars().count());
        let response = self
            .post(&url, &request_body)
            .await
            .map_err(|e| Error::ChatModel(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("generateContent returned {}", status);
            return Err(Error::ChatModel(format!(
                "Gemini API request failed with status {}: {}",
                status, error_text
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::ChatModel(format!("malformed generateContent response: {}", e)))?;

        let tokens_used = body
            .usage_metadata
            .as_ref()
            .and_then(|usage| usage.total_token_count);
        let text = extract_text(body)?;

        Ok(GenerationResult {
            text,
            model_id: config.model_id.clone(),
            tokens_used,
        })
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.qualified_embedding_model();
        let request_body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: model.clone(),
                    content: Content::plain(text),
                    output_dimensionality: self.embedding.dimension,
                })
                .collect(),
        };

        let url = self.endpoint(&self.embedding.model, "batchEmbedContents");
        debug!("Embedding batch of {} texts", texts.len());
        let response = self
            .post(&url, &request_body)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;
        let body: BatchEmbedResponse = read_embedding_response(response).await?;

        if body.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Gemini returned {} embeddings for {} inputs",
                body.embeddings.len(),
                texts.len()
            )));
        }

        body.embeddings
            .into_iter()
            .map(|embedding| {
                self.embedding.check_vector(&embedding.values)?;
                Ok(embedding.values)
            })
            .collect()
    }
}

async fn read_embedding_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(Error::Embedding(format!(
            "Gemini embedding request failed with status {}: {}",
            status, error_text
        )));
    }
    response
        .json()
        .await
        .map_err(|e| Error::Embedding(format!("malformed embedding response: {}", e)))
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: GenerateResponse) -> Result<String> {
    let Some(candidate) = body.candidates.into_iter().next() else {
        let reason = body
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(Error::ChatModel(format!("Gemini returned no answer: {}", reason)));
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(Error::ChatModel(format!(
            "Empty response from Gemini API (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
        let config = GenerationConfig {
            model_id: self.config.chat_model.clone(),
            timeout: self.config.timeout(),
            ..Default::default()
        };
        self.generate_with_config(prompt, &config).await
    }

    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let generation_future = self.perform_generation(prompt, config);

        match timeout(config.timeout, generation_future).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "Gemini did not answer within {}s",
                config.timeout.as_secs()
            ))),
        }
    }

    fn model_id(&self) -> &str {
        &self.config.chat_model
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedding.validate_input(text)?;

        let request_body = EmbedRequest {
            model: self.qualified_embedding_model(),
            content: Content::plain(text),
            output_dimensionality: self.embedding.dimension,
        };

        let url = self.endpoint(&self.embedding.model, "embedContent");
        let response = self
            .post(&url, &request_body)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;
        let body: EmbedResponse = read_embedding_response(response).await?;

        self.embedding.check_vector(&body.embedding.values)?;
        Ok(body.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        for text in texts {
            self.embedding.validate_input(text)?;
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_chunk(chunk).await?);
        }
        Ok(vectors)
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.embedding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> GenerateResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = parse(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Fever is "}, {"text": "a symptom."}]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_text(body).unwrap(), "Fever is a symptom.");
    }

    #[test]
    fn test_extract_text_reports_block_reason() {
        let body = parse(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        let err = extract_text(body).unwrap_err();
        assert!(matches!(err, Error::ChatModel(_)));
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_extract_text_rejects_empty_candidate() {
        let body = parse(json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]
        }));
        let err = extract_text(body).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn test_endpoint_and_model_names() {
        let config = GeminiConfig::new("key".to_string()).with_api_url("http://localhost:9/");
        let embedding = EmbeddingConfig {
            model: "models/text-embedding-004".to_string(),
            ..Default::default()
        };
        let client = GeminiClient::new(config, embedding).unwrap();

        assert_eq!(
            client.endpoint("models/text-embedding-004", "embedContent"),
            "http://localhost:9/v1beta/models/text-embedding-004:embedContent"
        );
        assert_eq!(client.qualified_embedding_model(), "models/text-embedding-004");
    }

    #[test]
    fn test_batch_size_is_clamped() {
        let config = GeminiConfig::new("key".to_string());
        let client = GeminiClient::new(config, EmbeddingConfig::default())
            .unwrap()
            .with_batch_size(1000);
        assert_eq!(client.batch_size(), GeminiClient::MAX_BATCH_SIZE);
    }
}
