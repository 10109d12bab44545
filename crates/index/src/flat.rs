//! Flat index — exact nearest-neighbor search over a JSON-lines collection.
//!
//! Layout inside the index directory:
//! - `<collection>.jsonl`: one `IndexedDocument` per line
//! - `<collection>.manifest.json`: `IndexManifest` describing the build
//!
//! The whole collection is loaded into memory at open and never mutated;
//! a rebuild writes a fresh file and replaces the previous one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scholar_core::document::RetrievedDocument;
use scholar_core::error::{Error, IndexError, Result};
use scholar_core::index::VectorIndex;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::vector::cosine_distance;

/// One row of the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub doc_index: u64,
    pub doc_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub vector: Vec<f32>,
}

/// Build metadata stored next to the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub collection: String,
    pub embedding_model: String,
    pub dimension: usize,
    pub count: usize,
    pub built_at: DateTime<Utc>,
}

fn collection_path(index_dir: &Path, collection: &str) -> PathBuf {
    index_dir.join(format!("{collection}.jsonl"))
}

fn manifest_path(index_dir: &Path, collection: &str) -> PathBuf {
    index_dir.join(format!("{collection}.manifest.json"))
}

/// An in-memory, exact, brute-force vector index.
#[derive(Debug)]
pub struct FlatIndex {
    name: String,
    dimension: usize,
    rows: Vec<IndexedDocument>,
    manifest: Option<IndexManifest>,
}

impl FlatIndex {
    /// Open a collection from an index directory.
    ///
    /// Fails with `ResourceNotFound` if the directory or the collection file
    /// is missing, and with `IndexError::Corrupt` on unreadable rows or
    /// inconsistent vector dimensions.
    pub fn open(index_dir: &Path, collection: &str) -> Result<Self> {
        if !index_dir.is_dir() {
            return Err(Error::not_found("Index directory", index_dir));
        }

        let path = collection_path(index_dir, collection);
        if !path.is_file() {
            return Err(Error::not_found(
                format!("Index collection '{collection}'"),
                path,
            ));
        }

        let manifest = match std::fs::read_to_string(manifest_path(index_dir, collection)) {
            Ok(content) => Some(serde_json::from_str::<IndexManifest>(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let reader = BufReader::new(std::fs::File::open(&path)?);
        let mut rows = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row: IndexedDocument =
                serde_json::from_str(&line).map_err(|e| IndexError::Corrupt {
                    line: i + 1,
                    reason: e.to_string(),
                })?;
            rows.push(row);
        }

        let index = Self::from_rows(collection, rows)?;
        info!(
            collection,
            count = index.rows.len(),
            dimension = index.dimension,
            "Opened flat index"
        );
        Ok(Self { manifest, ..index })
    }

    /// Build an index from rows already in memory.
    pub fn from_rows(name: impl Into<String>, rows: Vec<IndexedDocument>) -> Result<Self> {
        let dimension = rows.first().map(|r| r.vector.len()).unwrap_or(0);
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.vector.len() != dimension)
        {
            return Err(IndexError::Corrupt {
                line: i + 1,
                reason: format!(
                    "vector for {} has {} dimensions, expected {dimension}",
                    row.doc_id,
                    row.vector.len()
                ),
            }
            .into());
        }

        Ok(Self {
            name: name.into(),
            dimension,
            rows,
            manifest: None,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The build manifest, when one was found next to the collection.
    pub fn manifest(&self) -> Option<&IndexManifest> {
        self.manifest.as_ref()
    }

    fn nearest(
        &self,
        query: &[f32],
        limit: usize,
    ) -> std::result::Result<Vec<RetrievedDocument>, IndexError> {
        if self.rows.is_empty() || limit == 0 {
            return Ok(vec![]);
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexedDocument)> = self
            .rows
            .iter()
            .map(|row| (cosine_distance(query, &row.vector), row))
            .collect();

        // Stable: equal distances keep corpus order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(distance, row)| {
                RetrievedDocument::new(
                    row.doc_index,
                    row.doc_id.clone(),
                    row.title.clone(),
                    row.abstract_text.clone(),
                    distance,
                )
            })
            .collect())
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> std::result::Result<Vec<RetrievedDocument>, IndexError> {
        let results = self.nearest(query, limit)?;
        debug!(index = %self.name, limit, returned = results.len(), "Flat search");
        Ok(results)
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Write a collection from scratch, replacing any previous build.
///
/// Rows go to a temporary file that is renamed over the collection once
/// complete, so readers never observe a half-written index.
pub fn write_collection(
    index_dir: &Path,
    collection: &str,
    embedding_model: &str,
    rows: &[IndexedDocument],
) -> Result<IndexManifest> {
    let dimension = rows.first().map(|r| r.vector.len()).unwrap_or(0);
    if let Some(row) = rows.iter().find(|r| r.vector.len() != dimension) {
        return Err(IndexError::DimensionMismatch {
            expected: dimension,
            actual: row.vector.len(),
        }
        .into());
    }

    std::fs::create_dir_all(index_dir)?;

    let final_path = collection_path(index_dir, collection);
    let tmp_path = index_dir.join(format!("{collection}.jsonl.tmp"));
    {
        let mut writer = BufWriter::new(std::fs::File::create(&tmp_path)?);
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp_path, &final_path)?;

    let manifest = IndexManifest {
        collection: collection.to_string(),
        embedding_model: embedding_model.to_string(),
        dimension,
        count: rows.len(),
        built_at: Utc::now(),
    };
    std::fs::write(
        manifest_path(index_dir, collection),
        serde_json::to_string_pretty(&manifest)?,
    )?;

    info!(
        collection,
        count = rows.len(),
        dimension,
        path = %final_path.display(),
        "Wrote index collection"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(doc_index: u64, doc_id: &str, vector: Vec<f32>) -> IndexedDocument {
        IndexedDocument {
            doc_index,
            doc_id: doc_id.into(),
            title: format!("Title {doc_id}"),
            abstract_text: format!("Abstract {doc_id}."),
            vector,
        }
    }

    fn sample_rows() -> Vec<IndexedDocument> {
        vec![
            row(0, "2501.00001v1", vec![1.0, 0.0]),
            row(1, "2501.00002v1", vec![0.0, 1.0]),
            row(2, "2501.00003v1", vec![0.7071, 0.7071]),
        ]
    }

    #[tokio::test]
    async fn search_orders_by_ascending_distance() {
        let index = FlatIndex::from_rows("papers", sample_rows()).unwrap();
        let results = index.search(&[1.0, 0.1], 3).await.unwrap();

        let ids: Vec<&str> = results.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["2501.00001v1", "2501.00003v1", "2501.00002v1"]);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(results.iter().all(|d| d.rerank_score.is_none()));
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let index = FlatIndex::from_rows("papers", sample_rows()).unwrap();
        assert_eq!(index.search(&[0.0, 1.0], 1).await.unwrap().len(), 1);
        assert_eq!(index.search(&[0.0, 1.0], 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn equal_distances_keep_corpus_order() {
        let rows = vec![
            row(0, "2501.00010v1", vec![1.0, 0.0]),
            row(1, "2501.00011v1", vec![1.0, 0.0]),
            row(2, "2501.00012v1", vec![1.0, 0.0]),
        ];
        let index = FlatIndex::from_rows("papers", rows).unwrap();
        let results = index.search(&[1.0, 0.0], 3).await.unwrap();
        let order: Vec<u64> = results.iter().map(|d| d.doc_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_index_error() {
        let index = FlatIndex::from_rows("papers", sample_rows()).unwrap();
        let err = index.search(&[1.0, 0.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn inconsistent_rows_rejected() {
        let rows = vec![row(0, "a", vec![1.0, 0.0]), row(1, "b", vec![1.0])];
        let err = FlatIndex::from_rows("papers", rows).unwrap_err();
        assert!(matches!(err, Error::Index(IndexError::Corrupt { line: 2, .. })));
    }

    #[test]
    fn open_missing_directory() {
        let err = FlatIndex::open(Path::new("/nonexistent/index"), "papers").unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }

    #[test]
    fn open_missing_collection() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlatIndex::open(dir.path(), "papers").unwrap_err();
        match err {
            Error::ResourceNotFound { path, .. } => assert!(path.ends_with("papers.jsonl")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn write_then_open_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("index");

        let manifest =
            write_collection(&index_dir, "papers", "nomic-embed-text", &sample_rows()).unwrap();
        assert_eq!(manifest.count, 3);
        assert_eq!(manifest.dimension, 2);
        assert!(!index_dir.join("papers.jsonl.tmp").exists());

        let index = FlatIndex::open(&index_dir, "papers").unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.manifest().unwrap().embedding_model, "nomic-embed-text");

        let top = index.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(top[0].doc_id, "2501.00002v1");
        assert_eq!(top[0].abstract_text, "Abstract 2501.00002v1.");
    }

    #[test]
    fn rebuild_replaces_previous_collection() {
        let dir = tempfile::tempdir().unwrap();
        write_collection(dir.path(), "papers", "m", &sample_rows()).unwrap();
        write_collection(dir.path(), "papers", "m", &sample_rows()[..1]).unwrap();

        let index = FlatIndex::open(dir.path(), "papers").unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn corrupt_row_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("papers.jsonl"),
            "{\"doc_index\":0,\"doc_id\":\"a\",\"title\":\"t\",\"abstract\":\"x\",\"vector\":[1.0]}\nnot json\n",
        )
        .unwrap();

        let err = FlatIndex::open(dir.path(), "papers").unwrap_err();
        assert!(matches!(err, Error::Index(IndexError::Corrupt { line: 2, .. })));
    }
}
