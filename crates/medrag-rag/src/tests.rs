//! Ingestion and retrieval tests over the in-memory index

use async_trait::async_trait;
use insta::assert_yaml_snapshot;
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};
use std::path::Path;
use std::sync::{Arc, Mutex};

use medrag_core::{
    ChatModel, Document, Embedder, EmbeddingConfig, Error, GenerationConfig, GenerationResult,
    IndexSpec, IndexStats, Responder, Result, ScoredRecord, SearchConfig, VectorIndex,
    VectorRecord,
};

use crate::{
    DISCLAIMER, HashingEmbedder, InMemoryVectorIndex, IngestionEvent, IngestionPipeline,
    PdfDirectoryLoader, RagResponder, Stage, filter_to_minimal_docs,
};

const DIMENSION: usize = 384;

/// Chat model that records prompts and replies with a fixed text
struct ScriptedChatModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedChatModel {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
        self.generate_with_config(prompt, &GenerationConfig::default()).await
    }

    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(GenerationResult {
            text: self.reply.clone(),
            model_id: config.model_id.clone(),
            tokens_used: None,
        })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

/// Index whose backing service is unreachable
struct UnreachableIndex {
    spec: IndexSpec,
}

#[async_trait]
impl VectorIndex for UnreachableIndex {
    fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    async fn exists(&self) -> Result<bool> {
        Err(Error::IndexUnavailable("connection refused".to_string()))
    }

    async fn create(&self) -> Result<()> {
        Err(Error::IndexUnavailable("connection refused".to_string()))
    }

    async fn upsert(&self, _records: Vec<VectorRecord>) -> Result<usize> {
        Err(Error::IndexUnavailable("connection refused".to_string()))
    }

    async fn query(&self, _vector: &[f32], _config: &SearchConfig) -> Result<Vec<ScoredRecord>> {
        Err(Error::IndexUnavailable("connection refused".to_string()))
    }

    async fn stats(&self) -> Result<IndexStats> {
        Err(Error::IndexUnavailable("connection refused".to_string()))
    }
}

/// Embedder that claims one dimension and produces vectors one shorter
struct ShortEmbedder {
    config: EmbeddingConfig,
}

#[async_trait]
impl Embedder for ShortEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.5; self.config.dimension - 1])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|_| vec![0.5; self.config.dimension - 1])
            .collect())
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

/// Write a PDF with one text line per page
fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn fresh_index() -> Arc<InMemoryVectorIndex> {
    Arc::new(InMemoryVectorIndex::new(IndexSpec::cosine(
        IndexSpec::DEFAULT_NAME,
        DIMENSION,
    )))
}

#[tokio::test]
async fn test_ingest_pdf_then_answer_from_it() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(
        &dir.path().join("fever.pdf"),
        &["Fever is a temperature above 38C."],
    );

    let embedder = Arc::new(HashingEmbedder::new(DIMENSION));
    let index = fresh_index();
    let pipeline = IngestionPipeline::new(embedder.clone(), index.clone()).unwrap();

    let report = pipeline.run(dir.path()).await.unwrap();
    assert_eq!(report.documents_loaded, 1);
    assert_eq!(report.chunks_created, 1);
    assert_eq!(report.vectors_upserted, 1);
    assert!(report.index_created);
    assert_eq!(report.total_vector_count, 1);

    let chat = Arc::new(ScriptedChatModel::new(
        "A fever is a body temperature above 38C.",
    ));
    let responder = RagResponder::new(embedder, index, chat.clone()).unwrap();

    let retrieved = responder.retrieve("What is fever?").await.unwrap();
    assert!(retrieved.has_context);
    assert_eq!(retrieved.matches.len(), 1);
    assert!(retrieved.context.starts_with("Fever is a temperature"));
    let source = &retrieved.matches[0].metadata.as_ref().unwrap().source;
    assert!(source.ends_with("fever.pdf"));

    let answer = responder.respond("What is fever?").await.unwrap();
    assert!(answer.has_context);
    assert!(answer.text.starts_with("A fever is a body temperature above 38C."));
    assert!(answer.text.ends_with(DISCLAIMER));
    assert_eq!(answer.sources.len(), 1);

    let prompt = chat.last_prompt();
    assert!(prompt.contains("Medical Context:"));
    assert!(prompt.contains("Fever"));
    assert!(prompt.contains("User Question: What is fever?"));
}

#[test]
fn test_loader_yields_one_document_per_page_in_file_order() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(
        &dir.path().join("b.pdf"),
        &["Bee one", "Bee two", "Bee three"],
    );
    write_pdf(&dir.path().join("a.pdf"), &["Aye one", "Aye two"]);

    let loaded = PdfDirectoryLoader::new(dir.path()).load().unwrap();
    let pages: Vec<(String, u64, u64)> = loaded
        .iter()
        .map(|doc| {
            let file = Path::new(doc.source().unwrap())
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned();
            (
                file,
                doc.metadata["page"].as_u64().unwrap(),
                doc.metadata["total_pages"].as_u64().unwrap(),
            )
        })
        .collect();

    assert_eq!(
        pages,
        vec![
            ("a.pdf".to_string(), 0, 2),
            ("a.pdf".to_string(), 1, 2),
            ("b.pdf".to_string(), 0, 3),
            ("b.pdf".to_string(), 1, 3),
            ("b.pdf".to_string(), 2, 3),
        ]
    );

    let documents = filter_to_minimal_docs(loaded);
    assert_eq!(documents[0].content, "Aye one");
    assert_eq!(documents[4].content, "Bee three");
    assert!(documents[2].source.ends_with("b.pdf"));
}

#[tokio::test]
async fn test_reingesting_does_not_duplicate_records() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("cough.pdf"), &["A cough clears the airways."]);

    let embedder = Arc::new(HashingEmbedder::new(DIMENSION));
    let index = fresh_index();
    let pipeline = IngestionPipeline::new(embedder, index.clone()).unwrap();

    let first = pipeline.run(dir.path()).await.unwrap();
    let second = pipeline.run(dir.path()).await.unwrap();

    assert!(first.index_created);
    assert!(!second.index_created);
    assert_eq!(second.vectors_upserted, 1);
    assert_eq!(second.total_vector_count, first.total_vector_count);
}

#[tokio::test]
async fn test_missing_data_dir_fails_before_touching_index() {
    let index = fresh_index();
    let pipeline =
        IngestionPipeline::new(Arc::new(HashingEmbedder::new(DIMENSION)), index.clone()).unwrap();

    let err = pipeline.run("/definitely/not/here").await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(!index.exists().await.unwrap());
}

#[tokio::test]
async fn test_blank_pages_produce_no_records() {
    let index = fresh_index();
    let pipeline =
        IngestionPipeline::new(Arc::new(HashingEmbedder::new(DIMENSION)), index.clone()).unwrap();

    let documents = vec![Document::new("   \n\n ", "data/blank.pdf")];
    let report = pipeline.ingest_documents(&documents).await.unwrap();

    assert_eq!(report.chunks_created, 0);
    assert_eq!(report.vectors_upserted, 0);
    assert_eq!(report.total_vector_count, 0);
}

#[tokio::test]
async fn test_report_snapshot() {
    let embedder = Arc::new(HashingEmbedder::new(DIMENSION));
    let pipeline = IngestionPipeline::new(embedder, fresh_index()).unwrap();

    let documents = vec![
        Document::new("Fever is a temperature above 38C.", "data/fever.pdf"),
        Document::new("A cough clears the airways.", "data/cough.pdf"),
    ];
    let report = pipeline.ingest_documents(&documents).await.unwrap();

    assert_yaml_snapshot!(report, {
        ".started_at" => "[timestamp]",
        ".finished_at" => "[timestamp]",
    }, @r#"
    index_name: medi-chatbot
    documents_loaded: 2
    chunks_created: 2
    vectors_upserted: 2
    index_created: true
    total_vector_count: 2
    started_at: "[timestamp]"
    finished_at: "[timestamp]"
    "#);
}

#[tokio::test]
async fn test_observer_sees_stages_in_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let pipeline = IngestionPipeline::new(Arc::new(HashingEmbedder::new(DIMENSION)), fresh_index())
        .unwrap()
        .with_batch_size(1)
        .unwrap()
        .with_observer(move |event| sink.lock().unwrap().push(event.clone()));

    let documents = vec![
        Document::new("Fever is a temperature above 38C.", "data/fever.pdf"),
        Document::new("A cough clears the airways.", "data/cough.pdf"),
    ];
    pipeline.ingest_documents(&documents).await.unwrap();

    let events = events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            IngestionEvent::StageStarted(Stage::Chunk),
            IngestionEvent::ChunksCreated(2),
            IngestionEvent::StageStarted(Stage::EnsureIndex),
            IngestionEvent::IndexReady { created: true },
            IngestionEvent::StageStarted(Stage::Upsert),
            IngestionEvent::BatchUpserted { done: 1, total: 2 },
            IngestionEvent::BatchUpserted { done: 2, total: 2 },
            IngestionEvent::StageStarted(Stage::Verify),
            IngestionEvent::Verified {
                total_vector_count: 2
            },
        ]
    );
}

#[tokio::test]
async fn test_mismatched_dimensions_are_rejected() {
    let err = IngestionPipeline::new(Arc::new(HashingEmbedder::new(8)), fresh_index())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: 384,
            actual: 8
        }
    ));

    let embedder = Arc::new(ShortEmbedder {
        config: EmbeddingConfig::default(),
    });
    let index = fresh_index();
    let pipeline = IngestionPipeline::new(embedder, index.clone()).unwrap();
    let documents = vec![Document::new("Fever is a temperature above 38C.", "data/fever.pdf")];

    let err = pipeline.ingest_documents(&documents).await.unwrap_err();
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: 384,
            actual: 383
        }
    ));
    assert_eq!(index.stats().await.unwrap().total_vector_count, 0);
}

#[tokio::test]
async fn test_empty_index_answers_without_context() {
    let index = fresh_index();
    index.create().await.unwrap();
    let chat = Arc::new(ScriptedChatModel::new(
        "I could not find this in the documents. Please consult a healthcare professional.",
    ));
    let responder =
        RagResponder::new(Arc::new(HashingEmbedder::new(DIMENSION)), index, chat.clone()).unwrap();

    let answer = responder.respond("What is fever?").await.unwrap();
    assert!(!answer.has_context);
    assert!(answer.sources.is_empty());
    assert_eq!(
        answer.text,
        "I could not find this in the documents. Please consult a healthcare professional."
    );
    assert!(chat.last_prompt().contains("No relevant medical context was found"));
}

#[tokio::test]
async fn test_index_failure_propagates() {
    let index = Arc::new(UnreachableIndex {
        spec: IndexSpec::cosine(IndexSpec::DEFAULT_NAME, DIMENSION),
    });
    let chat = Arc::new(ScriptedChatModel::new("unused"));
    let responder =
        RagResponder::new(Arc::new(HashingEmbedder::new(DIMENSION)), index, chat.clone()).unwrap();

    let err = responder.respond("What is fever?").await.unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)));
    assert!(chat.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_question_is_a_validation_error() {
    let index = fresh_index();
    index.create().await.unwrap();
    let responder = RagResponder::new(
        Arc::new(HashingEmbedder::new(DIMENSION)),
        index,
        Arc::new(ScriptedChatModel::new("unused")),
    )
    .unwrap();

    let err = responder.respond("  ").await.unwrap_err();
    assert!(err.is_validation());
    assert!(responder.with_top_k(0).is_err());
}
