//! JSONL paper records.
//!
//! One JSON object per line with at least `id`, `title` and `abstract`.
//! `authors` and `categories` are comma-separated strings when present.

use scholar_core::error::Result;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One paper in the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<String>,
}

/// Why a corpus row was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line number
    pub line: usize,
    pub reason: String,
}

impl PaperRecord {
    /// Validate a parsed JSON row.
    ///
    /// `id`, `title` and `abstract` must be present and non-blank after
    /// trimming; numeric ids are accepted and stringified.
    fn from_value(value: serde_json::Value) -> std::result::Result<Self, String> {
        let obj = value.as_object().ok_or("row is not a JSON object")?;

        let field = |name: &str| -> std::result::Result<String, String> {
            let text = match obj.get(name) {
                Some(serde_json::Value::String(s)) => s.trim().to_string(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(_) => return Err(format!("field '{name}' has the wrong type")),
            };
            if text.is_empty() {
                Err(format!("missing or blank '{name}'"))
            } else {
                Ok(text)
            }
        };
        let optional = |name: &str| {
            obj.get(name)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        Ok(Self {
            id: field("id")?,
            title: field("title")?,
            abstract_text: field("abstract")?,
            authors: optional("authors"),
            categories: optional("categories"),
        })
    }
}

/// Stream records from a JSONL file.
///
/// Blank lines are ignored. Each other line yields either a valid record or
/// the reason it was rejected; I/O failures end the stream with an error.
pub fn read_records(
    path: &Path,
) -> Result<impl Iterator<Item = Result<std::result::Result<PaperRecord, RowError>>>> {
    let reader = BufReader::new(std::fs::File::open(path)?);

    Ok(reader
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = match line {
                Ok(l) => l,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() {
                return None;
            }
            let parsed = serde_json::from_str::<serde_json::Value>(&line)
                .map_err(|e| e.to_string())
                .and_then(PaperRecord::from_value)
                .map_err(|reason| RowError { line: i + 1, reason });
            Some(Ok(parsed))
        }))
}

/// Write records as JSON lines, creating parent directories.
///
/// The file is truncated first and flushed every `flush_every` records.
/// Returns the number of records written.
pub fn write_jsonl<'a>(
    records: impl IntoIterator<Item = &'a PaperRecord>,
    path: &Path,
    flush_every: usize,
) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    let flush_every = flush_every.max(1);
    let mut written = 0;

    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
        written += 1;
        if written % flush_every == 0 {
            writer.flush()?;
        }
    }
    writer.flush()?;

    tracing::debug!(path = %path.display(), written, "Wrote corpus file");
    Ok(written)
}
