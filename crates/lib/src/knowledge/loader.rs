//! Load knowledge documents from a directory.
//!
//! `.md` and `.txt` files become one document each (source = file name). `.json` files hold a
//! list of `{ "content": ..., "metadata": { "source": ..., ... } }` objects. `.csv` files give one
//! document per row, written as `column: value` lines.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["md", "txt", "json", "csv"];

/// A knowledge document before chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Source identifier surfaced to users (file name or metadata.source).
    pub source: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonDocument {
    #[serde(default)]
    id: Option<String>,
    content: String,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// Parse a JSON list of documents. `fallback_source` is used when an entry has no metadata.source.
pub fn parse_json_documents(s: &str, fallback_source: &str) -> Result<Vec<Document>> {
    let entries: Vec<JsonDocument> =
        serde_json::from_str(s).context("knowledge JSON must be a list of {content, metadata}")?;
    Ok(entries
        .into_iter()
        .filter(|e| !e.content.trim().is_empty())
        .map(|e| {
            let source = e
                .metadata
                .get("source")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| fallback_source.to_string());
            Document {
                id: e.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                source,
                text: e.content.trim().to_string(),
                metadata: e.metadata,
            }
        })
        .collect())
}

/// Parse CSV text with a header row. Each row becomes a document of `column: value` lines
/// (empty cells left out) with `row_number` (0-based) and `file_type` metadata.
pub fn parse_csv_documents(s: &str, source: &str) -> Result<Vec<Document>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(s.as_bytes());
    let headers = reader.headers().context("reading CSV header")?.clone();
    let mut docs = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading CSV row {}", row))?;
        let text = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, value)| !value.is_empty())
            .map(|(column, value)| format!("{}: {}", column, value))
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            continue;
        }
        let mut doc = Document::new(source, text);
        doc.metadata
            .insert("row_number".to_string(), serde_json::Value::from(row));
        doc.metadata
            .insert("file_type".to_string(), serde_json::Value::from("csv"));
        docs.push(doc);
    }
    Ok(docs)
}

fn load_file(path: &Path) -> Result<Vec<Document>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading knowledge file {}", path.display()))?;
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ext == "json" {
        return parse_json_documents(&s, &file_name)
            .with_context(|| format!("parsing knowledge file {}", path.display()));
    }
    if ext == "csv" {
        return parse_csv_documents(&s, &file_name)
            .with_context(|| format!("parsing knowledge file {}", path.display()));
    }
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut doc = Document::new(file_name, s.trim());
    doc.metadata.insert(
        "file_path".to_string(),
        serde_json::Value::String(path.display().to_string()),
    );
    Ok(vec![doc])
}

/// Load every supported file directly under `dir`, sorted by file name.
/// A missing directory yields no documents; unreadable or malformed files are logged and skipped.
pub fn load_dir(dir: &Path) -> Result<Vec<Document>> {
    if !dir.exists() {
        log::debug!("knowledge: directory not found, no documents: {}", dir.display());
        return Ok(Vec::new());
    }
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("listing knowledge directory {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
                    .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut docs = Vec::new();
    for path in paths {
        match load_file(&path) {
            Ok(mut d) => docs.append(&mut d),
            Err(e) => log::warn!("knowledge: skipping {}: {:#}", path.display(), e),
        }
    }
    log::info!("knowledge: loaded {} document(s) from {}", docs.len(), dir.display());
    Ok(docs)
}
