//! PDF directory loader and metadata filter

use regex::Regex;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

use medrag_core::{Document, Error, LoadedDocument, Result};

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex is valid"));

/// Loads every `*.pdf` file directly inside a directory, one document per page
pub struct PdfDirectoryLoader {
    dir: PathBuf,
}

impl PdfDirectoryLoader {
    /// Create a loader for the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// PDF files in the directory, sorted by path. Other files are skipped.
    pub fn pdf_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("cannot read PDF directory {}: {}", self.dir.display(), e),
            ))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_pdf = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if is_pdf && path.is_file() {
                files.push(path);
            } else {
                debug!("Skipping non-PDF entry {}", path.display());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Load all pages of all PDF files
    pub fn load(&self) -> Result<Vec<LoadedDocument>> {
        let files = self.pdf_files()?;
        let mut documents = Vec::new();

        for path in &files {
            let pages = load_pdf_file(path)?;
            debug!("Loaded {} pages from {}", pages.len(), path.display());
            documents.extend(pages);
        }

        info!(
            "Loaded {} pages from {} PDF files in {}",
            documents.len(),
            files.len(),
            self.dir.display()
        );
        Ok(documents)
    }
}

/// Extract one document per page from a single PDF file
pub fn load_pdf_file(path: &Path) -> Result<Vec<LoadedDocument>> {
    let source = path.display().to_string();

    // pdf-extract panics on some malformed inputs instead of returning an error.
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_by_pages(path))
        .map_err(|_| Error::PdfExtraction {
            path: source.clone(),
            reason: "PDF parser panicked".to_string(),
        })?
        .map_err(|e| Error::PdfExtraction {
            path: source.clone(),
            reason: e.to_string(),
        })?;

    let total_pages = extracted.len();
    Ok(extracted
        .into_iter()
        .enumerate()
        .map(|(page, text)| LoadedDocument {
            page_content: normalize_page_text(&text),
            metadata: json!({
                "source": source,
                "page": page,
                "total_pages": total_pages,
            }),
        })
        .collect())
}

/// Trim the page and collapse runs of blank lines to one paragraph break
fn normalize_page_text(text: &str) -> String {
    EXCESS_NEWLINES.replace_all(text.trim(), "\n\n").into_owned()
}

/// Reduce loaded documents to their text and `source` metadata
pub fn filter_to_minimal_docs(documents: Vec<LoadedDocument>) -> Vec<Document> {
    documents
        .into_iter()
        .map(|doc| {
            let source = doc.source().unwrap_or_default().to_string();
            Document::new(doc.page_content, source)
        })
        .collect()
}
