//! Embedding row operations.
//!
//! One row per (symbol, model): a packed little-endian f32 payload with its
//! dimension and the chunk hash current at embedding time. Rows cascade away
//! with their symbol.

use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::rows::EmbeddingRow;
use super::{now_secs, Store, SymbolRow};
use crate::extract::Span;

fn row_to_embedding(row: &rusqlite::Row) -> rusqlite::Result<EmbeddingRow> {
    Ok(EmbeddingRow {
        id: row.get(0)?,
        symbol_id: row.get(1)?,
        model: row.get(2)?,
        dim: row.get(3)?,
        vector: row.get(4)?,
        chunk_hash: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const EMBEDDING_COLUMNS: &str =
    "id, symbol_id, model, dim, vector, chunk_hash, created_at, updated_at";

impl Store {
    /// Insert or refresh the embedding for (symbol, model).
    ///
    /// The dimension is derived from the payload: `dim = vector.len() / 4`.
    pub fn upsert_embedding(
        &mut self,
        symbol_id: i64,
        model: &str,
        vector: &[u8],
        chunk_hash: &str,
    ) -> Result<()> {
        if vector.is_empty() || vector.len() % 4 != 0 {
            anyhow::bail!(
                "embedding payload must be a non-empty multiple of 4 bytes, got {}",
                vector.len()
            );
        }
        let dim = (vector.len() / 4) as i64;
        let now = now_secs();
        self.conn().execute(
            "INSERT INTO embeddings (symbol_id, model, dim, vector, chunk_hash,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(symbol_id, model) DO UPDATE SET
                 dim = excluded.dim,
                 vector = excluded.vector,
                 chunk_hash = excluded.chunk_hash,
                 updated_at = excluded.updated_at",
            params![symbol_id, model, dim, vector, chunk_hash, now],
        )?;
        Ok(())
    }

    /// The embedding stored for (symbol, model), if any.
    pub fn embedding_for(&self, symbol_id: i64, model: &str) -> Result<Option<EmbeddingRow>> {
        let sql = format!(
            "SELECT {} FROM embeddings WHERE symbol_id = ?1 AND model = ?2",
            EMBEDDING_COLUMNS
        );
        Ok(self
            .conn()
            .query_row(&sql, params![symbol_id, model], row_to_embedding)
            .optional()?)
    }

    /// All embeddings for a model with their symbols attached, optionally
    /// filtered by symbol language and kind. This is the candidate-loading
    /// step of semantic search.
    pub fn embeddings_for_model(
        &self,
        model: &str,
        language: Option<&str>,
        kind: Option<&str>,
    ) -> Result<Vec<(EmbeddingRow, SymbolRow)>> {
        let mut sql = String::from(
            "SELECT e.id, e.symbol_id, e.model, e.dim, e.vector, e.chunk_hash,
                    e.created_at, e.updated_at,
                    s.id, s.file_id, s.language, s.kind, s.name, s.qualified_name,
                    s.start_line, s.start_col, s.end_line, s.end_col,
                    s.signature, s.exported,
                    s.chunk_hash, s.chunk_summary, s.summary_tokens, s.summarized_at
             FROM embeddings e JOIN symbols s ON s.id = e.symbol_id
             WHERE e.model = ?1",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(model.to_string())];
        if let Some(language) = language {
            sql.push_str(&format!(" AND s.language = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(language.to_string()));
        }
        if let Some(kind) = kind {
            sql.push_str(&format!(" AND s.kind = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(kind.to_string()));
        }
        sql.push_str(" ORDER BY e.id");

        let mut stmt = self.conn().prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            let embedding = row_to_embedding(row)?;
            let symbol = SymbolRow {
                id: row.get(8)?,
                file_id: row.get(9)?,
                language: row.get(10)?,
                kind: row.get(11)?,
                name: row.get(12)?,
                qualified_name: row.get(13)?,
                span: Span {
                    start_line: row.get::<_, i64>(14)? as usize,
                    start_col: row.get::<_, i64>(15)? as usize,
                    end_line: row.get::<_, i64>(16)? as usize,
                    end_col: row.get::<_, i64>(17)? as usize,
                },
                signature: row.get(18)?,
                exported: row.get::<_, i64>(19)? != 0,
                chunk_hash: row.get(20)?,
                chunk_summary: row.get(21)?,
                summary_tokens: row.get(22)?,
                summarized_at: row.get(23)?,
            };
            Ok((embedding, symbol))
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}
