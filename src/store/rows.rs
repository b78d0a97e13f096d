//! Row types returned by store lookups.

use serde::{Deserialize, Serialize};

use crate::extract::Span;

/// A tracked source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRow {
    pub id: i64,
    /// Path relative to the index root, forward slashes, case-sensitive.
    pub path: String,
    pub language: String,
    /// Hex SHA-256 of the raw file bytes.
    pub content_hash: String,
    /// Filesystem mtime (seconds since epoch) at index time.
    pub mtime: i64,
    /// File size in bytes.
    pub size: i64,
    /// Unix timestamp when this file was last indexed.
    pub indexed_at: i64,
}

/// A stored symbol with its annotation columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRow {
    pub id: i64,
    pub file_id: i64,
    pub language: String,
    pub kind: String,
    pub name: String,
    pub qualified_name: String,
    pub span: Span,
    pub signature: Option<String>,
    pub exported: bool,
    /// SHA-256 of the code slice last summarized, written by the summarizer.
    pub chunk_hash: Option<String>,
    pub chunk_summary: Option<String>,
    pub summary_tokens: Option<i64>,
    pub summarized_at: Option<i64>,
}

/// File path + span of a symbol, resolved through the files table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub path: String,
    pub span: Span,
}

/// A call edge: caller invokes callee at a site in some file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRow {
    pub id: i64,
    pub caller_id: i64,
    pub callee_id: i64,
    pub file_id: i64,
    pub span: Span,
}

/// A reference edge: a non-call use of a symbol from some file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRow {
    pub id: i64,
    pub symbol_id: i64,
    pub source_file_id: i64,
    pub kind: String,
    pub span: Span,
}

/// A stored embedding for (symbol, model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRow {
    pub id: i64,
    pub symbol_id: i64,
    pub model: String,
    pub dim: i64,
    /// Packed little-endian f32 payload; `dim = vector.len() / 4`.
    #[serde(skip)]
    pub vector: Vec<u8>,
    pub chunk_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl EmbeddingRow {
    /// Decode the packed little-endian payload into f32 values.
    pub fn decode(&self) -> Vec<f32> {
        self.vector
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }
}

/// Pack an f32 vector into the little-endian blob layout.
pub fn pack_vector(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Metadata for a file row upsert.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub path: String,
    pub language: String,
    pub content_hash: String,
    pub mtime: i64,
    pub size: i64,
}
