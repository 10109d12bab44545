//! Index builder: embeds the JSONL corpus into a flat index.
//!
//! Every build is a full rebuild: rows are read, validated, embedded in
//! batches, unit-normalized and written as a fresh collection.

use scholar_config::AppConfig;
use scholar_core::error::{Error, ProviderError, Result};
use scholar_core::provider::{EmbeddingRequest, Provider};
use scholar_index::{IndexManifest, IndexedDocument, normalize, write_collection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::records::{PaperRecord, read_records};

/// Outcome of one index build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: usize,
    pub manifest: IndexManifest,
}

/// Builds the index collection from a corpus file.
pub struct IndexBuilder {
    embedder: Arc<dyn Provider>,
    embedding_model: String,
    batch_size: usize,
    index_dir: PathBuf,
    collection: String,
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn Provider>,
        embedding_model: impl Into<String>,
        batch_size: usize,
        index_dir: impl Into<PathBuf>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            embedding_model: embedding_model.into(),
            batch_size: batch_size.max(1),
            index_dir: index_dir.into(),
            collection: collection.into(),
        }
    }

    pub fn from_config(config: &AppConfig, embedder: Arc<dyn Provider>) -> Self {
        Self::new(
            embedder,
            &config.retrieval.embedding_model,
            config.corpus.batch_size,
            &config.retrieval.index_dir,
            &config.retrieval.collection,
        )
    }

    /// Rebuild the collection from `corpus_path`.
    ///
    /// Fails with `ResourceNotFound` if the corpus file is missing and with
    /// `EmptyCorpus` if no row is valid; the previous index is left in place
    /// in both cases.
    pub async fn build(&self, corpus_path: &Path) -> Result<BuildReport> {
        if !corpus_path.is_file() {
            return Err(Error::not_found("Corpus file", corpus_path));
        }

        info!(
            corpus = %corpus_path.display(),
            collection = %self.collection,
            model = %self.embedding_model,
            "Building index"
        );

        let mut rows: Vec<IndexedDocument> = Vec::new();
        let mut batch: Vec<PaperRecord> = Vec::with_capacity(self.batch_size);
        let mut skipped = 0;

        for row in read_records(corpus_path)? {
            match row? {
                Ok(record) => {
                    batch.push(record);
                    if batch.len() >= self.batch_size {
                        self.embed_batch(&mut batch, &mut rows).await?;
                    }
                }
                Err(bad) => {
                    warn!(line = bad.line, reason = %bad.reason, "Skipping malformed corpus row");
                    skipped += 1;
                }
            }
        }
        self.embed_batch(&mut batch, &mut rows).await?;

        if rows.is_empty() {
            return Err(Error::EmptyCorpus {
                path: corpus_path.to_path_buf(),
                skipped,
            });
        }

        let manifest = write_collection(
            &self.index_dir,
            &self.collection,
            &self.embedding_model,
            &rows,
        )?;

        info!(indexed = rows.len(), skipped, "Index build complete");
        Ok(BuildReport {
            indexed: rows.len(),
            skipped,
            manifest,
        })
    }

    /// Embed the pending batch (abstracts only) and append it to `rows`.
    async fn embed_batch(
        &self,
        batch: &mut Vec<PaperRecord>,
        rows: &mut Vec<IndexedDocument>,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let inputs: Vec<String> = batch.iter().map(|r| r.abstract_text.clone()).collect();
        let response = self
            .embedder
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs,
            })
            .await?;

        if response.embeddings.len() != batch.len() {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: format!(
                    "Embedding batch of {} returned {} vectors",
                    batch.len(),
                    response.embeddings.len()
                ),
            }
            .into());
        }

        for (record, mut vector) in batch.drain(..).zip(response.embeddings) {
            normalize(&mut vector);
            rows.push(IndexedDocument {
                doc_index: rows.len() as u64,
                doc_id: record.id,
                title: record.title,
                abstract_text: record.abstract_text,
                vector,
            });
        }
        debug!(total = rows.len(), "Embedded batch");
        Ok(())
    }
}
