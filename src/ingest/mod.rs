// Ingestion module
// Reads the source directory, embeds every document and replaces the collection

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::config::Config;
use crate::database::lancedb::{DocumentRecord, VectorStore};
use crate::embeddings::{EmbeddingFunction, GeminiEmbeddings};
use crate::{RagError, Result};

/// A document read from the source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub id: String,
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedDocuments {
    pub documents: Vec<SourceDocument>,
    /// Entries that were not `.txt` files or were blank
    pub skipped: usize,
}

/// Outcome of a successful ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub collection: String,
    pub store_path: PathBuf,
    pub documents_stored: u64,
    pub files_skipped: usize,
    pub vector_dimension: usize,
}

/// Read every non-blank `.txt` file in `source_dir`.
///
/// Ids are sequential over the qualifying files, in directory listing order or
/// by file name when `sort_by_name` is set.
#[inline]
pub fn load_documents(source_dir: &Path, sort_by_name: bool) -> Result<LoadedDocuments> {
    if !source_dir.is_dir() {
        return Err(RagError::NotFound(format!(
            "Source directory '{}' does not exist",
            source_dir.display()
        )));
    }

    info!("Loading documents from {}", source_dir.display());

    let mut paths = fs::read_dir(source_dir)
        .with_context(|| format!("Failed to list {}", source_dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<PathBuf>>>()
        .with_context(|| format!("Failed to list {}", source_dir.display()))?;

    if sort_by_name {
        paths.sort();
    }

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(paths.len() as u64).with_style(
            ProgressStyle::with_template("{bar:40} [{pos}/{len}] Reading {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut loaded = LoadedDocuments::default();

    for path in paths {
        bar.inc(1);

        let is_text_file = path.is_file() && path.extension().is_some_and(|ext| ext == "txt");
        if !is_text_file {
            debug!("Skipping non-text entry: {}", path.display());
            loaded.skipped += 1;
            continue;
        }

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        bar.set_message(source.clone());

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let text = content.trim();

        if text.is_empty() {
            debug!("Skipping empty file: {}", path.display());
            loaded.skipped += 1;
            continue;
        }

        loaded.documents.push(SourceDocument {
            id: loaded.documents.len().to_string(),
            source,
            text: text.to_string(),
        });
    }

    bar.finish_and_clear();

    if loaded.documents.is_empty() {
        return Err(RagError::EmptyInput(format!(
            "No non-empty .txt files found in '{}'",
            source_dir.display()
        )));
    }

    info!(
        "Loaded {} documents ({} entries skipped)",
        loaded.documents.len(),
        loaded.skipped
    );
    Ok(loaded)
}

/// Builds a collection from a directory of text files
pub struct Ingestor {
    config: Config,
    embedding_function: Arc<dyn EmbeddingFunction>,
}

impl Ingestor {
    /// Create an ingestor using the Gemini embedding service.
    ///
    /// Fails with `RagError::Config` when no API key is configured.
    #[inline]
    pub fn new(config: Config) -> Result<Self> {
        let embedding_function = Arc::new(GeminiEmbeddings::new(&config)?);
        Ok(Self::with_embedding_function(config, embedding_function))
    }

    #[inline]
    pub fn with_embedding_function(
        config: Config,
        embedding_function: Arc<dyn EmbeddingFunction>,
    ) -> Self {
        Self {
            config,
            embedding_function,
        }
    }

    /// Load, embed and store every document under `source_dir`.
    ///
    /// Documents are embedded before the store is opened, so missing input or an
    /// embedding failure leaves the existing collection untouched.
    #[inline]
    pub async fn run(&self, source_dir: &Path) -> Result<IngestReport> {
        info!("Starting ingestion from {}", source_dir.display());

        let loaded = load_documents(source_dir, self.config.ingest.sort_by_name)?;
        let texts: Vec<String> = loaded.documents.iter().map(|d| d.text.clone()).collect();

        info!(
            "Embedding {} documents with {}",
            texts.len(),
            self.embedding_function.model_name()
        );
        let vectors = self.embedding_function.embed_documents(&texts)?;

        if vectors.len() != loaded.documents.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} vectors, embedding service returned {}",
                loaded.documents.len(),
                vectors.len()
            )));
        }

        let ingested_at = Utc::now().to_rfc3339();
        let records: Vec<DocumentRecord> = loaded
            .documents
            .into_iter()
            .zip(vectors)
            .map(|(document, vector)| DocumentRecord {
                id: document.id,
                vector,
                document: document.text,
                source: document.source,
                ingested_at: ingested_at.clone(),
            })
            .collect();

        let store = VectorStore::open(&self.config).await?;
        let collection = store
            .replace_collection(
                &self.config.store.collection,
                &records,
                Arc::clone(&self.embedding_function),
            )
            .await?;

        let report = IngestReport {
            collection: collection.name().to_string(),
            store_path: store.path().to_path_buf(),
            documents_stored: collection.count().await?,
            files_skipped: loaded.skipped,
            vector_dimension: collection.vector_dimension().await?,
        };

        info!(
            "Ingestion complete: {} documents in collection {}",
            report.documents_stored, report.collection
        );
        Ok(report)
    }
}
