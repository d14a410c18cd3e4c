//! Offline ingestion: PDF directory to populated vector index

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use medrag_core::{
    Chunk, ChunkingConfig, Document, Embedder, Error, RecordMetadata, Result, VectorIndex,
    VectorRecord, ensure_dimension,
};

use crate::chunker::TextSplitter;
use crate::loader::{PdfDirectoryLoader, filter_to_minimal_docs};

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Ingestion stages, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Filter,
    Chunk,
    EnsureIndex,
    Upsert,
    Verify,
}

/// Progress notifications emitted while a pipeline runs
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionEvent {
    StageStarted(Stage),
    DocumentsLoaded(usize),
    ChunksCreated(usize),
    IndexReady { created: bool },
    BatchUpserted { done: usize, total: usize },
    Verified { total_vector_count: u64 },
}

type Observer = Box<dyn Fn(&IngestionEvent) + Send + Sync>;

/// Summary of one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub index_name: String,
    pub documents_loaded: usize,
    pub chunks_created: usize,
    pub vectors_upserted: usize,
    pub index_created: bool,
    pub total_vector_count: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Stable record id for a chunk. Re-ingesting the same file overwrites its
/// records instead of duplicating them.
pub fn record_id(chunk: &Chunk) -> String {
    let key = format!("{}\u{0}{}\u{0}{}", chunk.source, chunk.position, chunk.content);
    Uuid::from_bytes(md5::compute(key.as_bytes()).0).to_string()
}

/// Load, filter, chunk, embed and store a directory of PDFs
pub struct IngestionPipeline<E: Embedder + ?Sized, V: VectorIndex + ?Sized> {
    embedder: Arc<E>,
    index: Arc<V>,
    splitter: TextSplitter,
    batch_size: usize,
    observer: Option<Observer>,
}

impl<E: Embedder + ?Sized, V: VectorIndex + ?Sized> IngestionPipeline<E, V> {
    /// Fails when the embedder and the index disagree on vector dimension
    pub fn new(embedder: Arc<E>, index: Arc<V>) -> Result<Self> {
        ensure_dimension(index.spec().dimension, embedder.dimension())?;
        Ok(Self {
            embedder,
            index,
            splitter: TextSplitter::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            observer: None,
        })
    }

    pub fn with_chunking(mut self, config: ChunkingConfig) -> Result<Self> {
        self.splitter = TextSplitter::new(config)?;
        Ok(self)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Configuration(
                "batch size must be greater than zero".to_string(),
            ));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn with_observer(
        mut self,
        observer: impl Fn(&IngestionEvent) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    fn emit(&self, event: IngestionEvent) {
        debug!("{:?}", event);
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    /// Ingest every PDF directly inside `data_dir`
    pub async fn run(&self, data_dir: impl AsRef<Path>) -> Result<IngestionReport> {
        let started_at = Utc::now();
        let dir: PathBuf = data_dir.as_ref().to_path_buf();

        self.emit(IngestionEvent::StageStarted(Stage::Load));
        let loader = PdfDirectoryLoader::new(dir);
        let loaded = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| Error::Other(format!("PDF loading task failed: {}", e)))??;
        self.emit(IngestionEvent::DocumentsLoaded(loaded.len()));

        self.emit(IngestionEvent::StageStarted(Stage::Filter));
        let documents = filter_to_minimal_docs(loaded);

        self.ingest_from(&documents, started_at).await
    }

    /// Run the stages after loading on already-filtered documents
    pub async fn ingest_documents(&self, documents: &[Document]) -> Result<IngestionReport> {
        self.ingest_from(documents, Utc::now()).await
    }

    async fn ingest_from(
        &self,
        documents: &[Document],
        started_at: DateTime<Utc>,
    ) -> Result<IngestionReport> {
        self.emit(IngestionEvent::StageStarted(Stage::Chunk));
        let chunks = self.splitter.split_documents(documents);
        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );
        self.emit(IngestionEvent::ChunksCreated(chunks.len()));

        self.emit(IngestionEvent::StageStarted(Stage::EnsureIndex));
        let index_created = self.index.ensure_exists().await?;
        if index_created {
            info!("Created vector index {}", self.index.spec().name);
        }
        self.emit(IngestionEvent::IndexReady {
            created: index_created,
        });

        self.emit(IngestionEvent::StageStarted(Stage::Upsert));
        let vectors_upserted = self.upsert_chunks(&chunks).await?;

        self.emit(IngestionEvent::StageStarted(Stage::Verify));
        let stats = self.index.stats().await?;
        self.emit(IngestionEvent::Verified {
            total_vector_count: stats.total_vector_count,
        });
        info!(
            "Index {} now holds {} vectors",
            stats.name, stats.total_vector_count
        );

        Ok(IngestionReport {
            index_name: stats.name,
            documents_loaded: documents.len(),
            chunks_created: chunks.len(),
            vectors_upserted,
            index_created,
            total_vector_count: stats.total_vector_count,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut done = 0;
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            let records = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| VectorRecord {
                    id: record_id(chunk),
                    vector,
                    metadata: RecordMetadata {
                        text: chunk.content.clone(),
                        source: chunk.source.clone(),
                    },
                })
                .collect();

            done += self.index.upsert(records).await?;
            self.emit(IngestionEvent::BatchUpserted {
                done,
                total: chunks.len(),
            });
        }
        Ok(done)
    }
}
