//! Vector index implementations

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointId, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::env;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use medrag_core::{
    DistanceMetric, Error, IndexSpec, IndexStats, RecordMetadata, Result, ScoredRecord,
    SearchConfig, VectorIndex, VectorRecord, ensure_dimension,
};

/// In-memory vector index with exact search
pub struct InMemoryVectorIndex {
    spec: IndexSpec,
    created: AtomicBool,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorIndex {
    /// Create a handle to an index that does not exist yet
    pub fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            created: AtomicBool::new(false),
            records: RwLock::new(HashMap::new()),
        }
    }

    fn require_created(&self) -> Result<()> {
        if !self.created.load(Ordering::SeqCst) {
            return Err(Error::VectorIndex(format!(
                "index '{}' does not exist",
                self.spec.name
            )));
        }
        Ok(())
    }

    /// Simple cosine similarity calculation
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }

    /// Higher is more similar for every metric
    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.spec.metric {
            DistanceMetric::Cosine => Self::cosine_similarity(a, b),
            DistanceMetric::Dot => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
            DistanceMetric::Euclidean => {
                let distance: f32 = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                -distance
            }
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.created.load(Ordering::SeqCst))
    }

    async fn create(&self) -> Result<()> {
        if self.created.swap(true, Ordering::SeqCst) {
            return Err(Error::VectorIndex(format!(
                "index '{}' already exists",
                self.spec.name
            )));
        }
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        self.require_created()?;
        for record in &records {
            ensure_dimension(self.spec.dimension, record.vector.len())?;
        }

        let mut stored = self
            .records
            .write()
            .map_err(|e| Error::VectorIndex(format!("Lock error: {}", e)))?;
        let count = records.len();
        for record in records {
            stored.insert(record.id.clone(), record);
        }
        Ok(count)
    }

    async fn query(&self, vector: &[f32], config: &SearchConfig) -> Result<Vec<ScoredRecord>> {
        self.require_created()?;
        ensure_dimension(self.spec.dimension, vector.len())?;

        let stored = self
            .records
            .read()
            .map_err(|e| Error::VectorIndex(format!("Lock error: {}", e)))?;

        let mut results: Vec<ScoredRecord> = stored
            .values()
            .map(|record| ScoredRecord {
                id: record.id.clone(),
                score: self.score(vector, &record.vector),
                metadata: config.include_metadata.then(|| record.metadata.clone()),
            })
            .filter(|hit| config.score_threshold.is_none_or(|t| hit.score >= t))
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        results.truncate(config.top_k);

        Ok(results)
    }

    async fn stats(&self) -> Result<IndexStats> {
        self.require_created()?;
        let stored = self
            .records
            .read()
            .map_err(|e| Error::VectorIndex(format!("Lock error: {}", e)))?;

        Ok(IndexStats {
            name: self.spec.name.clone(),
            dimension: self.spec.dimension,
            total_vector_count: stored.len() as u64,
        })
    }
}

/// Connection settings for a hosted Qdrant collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantIndexConfig {
    pub url: String,
    pub api_key: String,
    pub collection: String,
    pub timeout_secs: u64,
}

impl QdrantIndexConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = env::var("QDRANT_URL").map_err(|_| {
            Error::Configuration("QDRANT_URL environment variable not found".to_string())
        })?;

        let api_key = env::var("QDRANT_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration("QDRANT_API_KEY environment variable not found".to_string())
            })?;

        let collection = env::var("QDRANT_COLLECTION")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| IndexSpec::DEFAULT_NAME.to_string());

        let config = Self {
            url,
            api_key,
            collection,
            timeout_secs: 30,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.url).map_err(|e| {
            Error::Configuration(format!("QDRANT_URL is not a valid URL ({}): {}", e, self.url))
        })?;
        Ok(())
    }
}

/// Vector index backed by a Qdrant collection
pub struct QdrantVectorIndex {
    client: Qdrant,
    spec: IndexSpec,
}

/// gRPC codes for calls that never reached the service: Cancelled,
/// DeadlineExceeded and Unavailable.
const UNREACHABLE_CODES: [i32; 3] = [1, 4, 14];

/// Connectivity failures become `IndexUnavailable`; anything the service
/// answered with stays a `VectorIndex` rejection.
fn index_error(err: QdrantError) -> Error {
    let unreachable = match &err {
        QdrantError::ResponseError { status } => {
            UNREACHABLE_CODES.contains(&i32::from(status.code()))
                || status.message().starts_with("Failed to connect")
        }
        QdrantError::Io(_) => true,
        _ => false,
    };

    if unreachable {
        Error::IndexUnavailable(err.to_string())
    } else {
        Error::VectorIndex(err.to_string())
    }
}

fn distance_for(metric: DistanceMetric) -> Distance {
    match metric {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Dot => Distance::Dot,
        DistanceMetric::Euclidean => Distance::Euclid,
    }
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key) {
        Some(Value {
            kind: Some(Kind::StringValue(s)),
        }) => Some(s.clone()),
        _ => None,
    }
}

fn point_id_string(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => "unknown".to_string(),
    }
}

impl QdrantVectorIndex {
    /// Connect to the configured collection, expecting vectors of `dimension`
    pub fn new(config: &QdrantIndexConfig, dimension: usize) -> Result<Self> {
        config.validate()?;

        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            spec: IndexSpec::cosine(config.collection.clone(), dimension),
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    async fn exists(&self) -> Result<bool> {
        self.client
            .collection_exists(self.spec.name.as_str())
            .await
            .map_err(index_error)
    }

    async fn create(&self) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(self.spec.name.as_str()).vectors_config(
                    VectorParamsBuilder::new(
                        self.spec.dimension as u64,
                        distance_for(self.spec.metric),
                    ),
                ),
            )
            .await
            .map_err(index_error)?;
        info!(
            "Created Qdrant collection {} ({} dims, {:?})",
            self.spec.name, self.spec.dimension, self.spec.metric
        );
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        for record in &records {
            ensure_dimension(self.spec.dimension, record.vector.len())?;
        }
        if records.is_empty() {
            return Ok(0);
        }

        let count = records.len();
        let points = records
            .into_iter()
            .map(|record| {
                let payload = Payload::try_from(json!({
                    "text": record.metadata.text,
                    "source": record.metadata.source,
                }))
                .map_err(|e| Error::Serialization(e.to_string()))?;
                Ok(PointStruct::new(record.id, record.vector, payload))
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.spec.name.as_str(), points).wait(true))
            .await
            .map_err(index_error)?;
        debug!("Upserted {} points into {}", count, self.spec.name);
        Ok(count)
    }

    async fn query(&self, vector: &[f32], config: &SearchConfig) -> Result<Vec<ScoredRecord>> {
        ensure_dimension(self.spec.dimension, vector.len())?;

        let mut request =
            SearchPointsBuilder::new(self.spec.name.as_str(), vector.to_vec(), config.top_k as u64)
                .with_payload(config.include_metadata);
        if let Some(threshold) = config.score_threshold {
            request = request.score_threshold(threshold);
        }

        let response = self.client.search_points(request).await.map_err(index_error)?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let metadata = if config.include_metadata {
                    payload_string(&point.payload, "text").map(|text| RecordMetadata {
                        text,
                        source: payload_string(&point.payload, "source").unwrap_or_default(),
                    })
                } else {
                    None
                };
                ScoredRecord {
                    id: point_id_string(point.id),
                    score: point.score,
                    metadata,
                }
            })
            .collect())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let info = self
            .client
            .collection_info(self.spec.name.as_str())
            .await
            .map_err(index_error)?;

        Ok(IndexStats {
            name: self.spec.name.clone(),
            dimension: self.spec.dimension,
            total_vector_count: info.result.and_then(|r| r.points_count).unwrap_or(0),
        })
    }
}
