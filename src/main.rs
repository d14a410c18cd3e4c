use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use medrag_core::{Embedder, Responder};
use medrag_gemini::GeminiClient;
use medrag_rag::{
    DEFAULT_BATCH_SIZE, DEFAULT_TOP_K, IngestionEvent, IngestionPipeline, QdrantIndexConfig,
    QdrantVectorIndex, RagResponder, Stage,
};
use medrag_server::AppState;

mod logging;

#[derive(Parser)]
#[command(name = "medrag")]
#[command(about = "Medical question answering over PDF documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load PDFs from a directory into the vector index
    Ingest {
        /// Directory holding the PDF files
        #[arg(long, env = "MEDRAG_DATA_DIR", default_value = "data/")]
        data_dir: PathBuf,

        /// Chunks embedded and upserted per request
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Serve the chat API
    Serve {
        /// Address to listen on
        #[arg(long, env = "MEDRAG_BIND", default_value = "127.0.0.1:5000")]
        bind: String,

        /// Number of chunks retrieved per question
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
}

fn gemini_from_env() -> Result<GeminiClient> {
    GeminiClient::from_env().context("Gemini is not configured")
}

fn qdrant_from_env(dimension: usize) -> Result<Arc<QdrantVectorIndex>> {
    let qdrant_config = QdrantIndexConfig::from_env().context("Qdrant is not configured")?;
    Ok(Arc::new(QdrantVectorIndex::new(&qdrant_config, dimension)?))
}

fn print_event(event: &IngestionEvent) {
    match event {
        IngestionEvent::StageStarted(Stage::Load) => {
            println!("{}", "📂 Loading PDF files...".cyan())
        }
        IngestionEvent::DocumentsLoaded(count) => println!("✅ Loaded {} pages", count),
        IngestionEvent::ChunksCreated(count) => println!("✂️  Split into {} chunks", count),
        IngestionEvent::IndexReady { created: true } => println!("🆕 Created vector index"),
        IngestionEvent::IndexReady { created: false } => {
            println!("📦 Using existing vector index")
        }
        IngestionEvent::BatchUpserted { done, total } => {
            println!("⬆️  Upserted {}/{} chunks", done, total)
        }
        IngestionEvent::Verified { total_vector_count } => {
            println!("🔎 Index holds {} vectors", total_vector_count)
        }
        IngestionEvent::StageStarted(_) => {}
    }
}

async fn ingest(data_dir: PathBuf, batch_size: usize) -> Result<()> {
    let gemini = Arc::new(gemini_from_env()?.with_batch_size(batch_size));
    let index = qdrant_from_env(gemini.dimension())?;

    let pipeline = IngestionPipeline::new(gemini, index)?
        .with_batch_size(batch_size)?
        .with_observer(print_event);

    let report = pipeline
        .run(&data_dir)
        .await
        .with_context(|| format!("Ingestion of {} failed", data_dir.display()))?;

    let elapsed = report.finished_at - report.started_at;
    println!(
        "{}",
        format!(
            "🎉 Ingested {} chunks from {} pages into '{}' in {}s",
            report.vectors_upserted,
            report.documents_loaded,
            report.index_name,
            elapsed.num_seconds()
        )
        .green()
    );
    Ok(())
}

async fn serve(bind: String, top_k: usize) -> Result<()> {
    let gemini = Arc::new(gemini_from_env()?);
    let index = qdrant_from_env(gemini.dimension())?;
    let responder: Arc<dyn Responder> =
        Arc::new(RagResponder::new(gemini.clone(), index, gemini)?.with_top_k(top_k)?);

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    println!("{} http://{}", "🩺 Medical chatbot listening on".green(), listener.local_addr()?);

    medrag_server::serve(listener, AppState::new(responder))
        .await
        .context("Server error")?;
    Ok(())
}

/// One line naming the failure and every cause below it
fn failure_message(err: &anyhow::Error) -> String {
    format!("{} {:#}", "❌".red(), err)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ingest {
            data_dir,
            batch_size,
        } => ingest(data_dir, batch_size).await,
        Command::Serve { bind, top_k } => serve(bind, top_k).await,
    };

    if let Err(e) = result {
        eprintln!("{}", failure_message(&e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_lists_each_cause_once() {
        colored::control::set_override(false);
        let err = anyhow::anyhow!("QDRANT_URL environment variable not found")
            .context("Qdrant is not configured");

        assert_eq!(
            failure_message(&err),
            "❌ Qdrant is not configured: QDRANT_URL environment variable not found"
        );
    }
}
