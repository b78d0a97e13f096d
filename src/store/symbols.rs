//! Symbol row operations, including the summary annotation columns.

use anyhow::Result;
use rusqlite::{params, OptionalExtension, Transaction};

use super::rows::{SymbolLocation, SymbolRow};
use super::{now_secs, Store};
use crate::extract::{Extraction, Span, SymbolFact};

const SYMBOL_COLUMNS: &str = "id, file_id, language, kind, name, qualified_name, \
     start_line, start_col, end_line, end_col, signature, exported, \
     chunk_hash, chunk_summary, summary_tokens, summarized_at";

pub(super) fn row_to_symbol(row: &rusqlite::Row) -> rusqlite::Result<SymbolRow> {
    Ok(SymbolRow {
        id: row.get(0)?,
        file_id: row.get(1)?,
        language: row.get(2)?,
        kind: row.get(3)?,
        name: row.get(4)?,
        qualified_name: row.get(5)?,
        span: Span {
            start_line: row.get::<_, i64>(6)? as usize,
            start_col: row.get::<_, i64>(7)? as usize,
            end_line: row.get::<_, i64>(8)? as usize,
            end_col: row.get::<_, i64>(9)? as usize,
        },
        signature: row.get(10)?,
        exported: row.get::<_, i64>(11)? != 0,
        chunk_hash: row.get(12)?,
        chunk_summary: row.get(13)?,
        summary_tokens: row.get(14)?,
        summarized_at: row.get(15)?,
    })
}

/// Insert all extracted symbols for a file inside an open transaction.
///
/// Returns (id, fact) pairs in insertion order; the ids are needed for
/// call-site caller resolution within the same transaction.
pub(super) fn insert_symbols_tx<'a>(
    tx: &Transaction,
    file_id: i64,
    language: &str,
    extraction: &'a Extraction,
) -> Result<Vec<(i64, &'a SymbolFact)>> {
    let mut stmt = tx.prepare(
        "INSERT INTO symbols (file_id, language, kind, name, qualified_name,
             start_line, start_col, end_line, end_col, signature, exported)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    let mut inserted = Vec::with_capacity(extraction.symbols.len());
    for fact in &extraction.symbols {
        stmt.execute(params![
            file_id,
            language,
            fact.kind.as_str(),
            fact.name,
            fact.qualified_name,
            fact.span.start_line as i64,
            fact.span.start_col as i64,
            fact.span.end_line as i64,
            fact.span.end_col as i64,
            fact.signature,
            fact.exported as i64,
        ])?;
        inserted.push((tx.last_insert_rowid(), fact));
    }
    Ok(inserted)
}

impl Store {
    /// Symbols matching a short name, optionally restricted to a language.
    ///
    /// Ordered by id so that "first match" is deterministic.
    pub fn symbols_by_name(&self, name: &str, language: Option<&str>) -> Result<Vec<SymbolRow>> {
        let mut symbols = Vec::new();
        match language {
            Some(lang) => {
                let sql = format!(
                    "SELECT {} FROM symbols WHERE name = ?1 AND language = ?2 ORDER BY id",
                    SYMBOL_COLUMNS
                );
                let mut stmt = self.conn().prepare(&sql)?;
                let rows = stmt.query_map(params![name, lang], row_to_symbol)?;
                for row in rows {
                    symbols.push(row?);
                }
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM symbols WHERE name = ?1 ORDER BY id",
                    SYMBOL_COLUMNS
                );
                let mut stmt = self.conn().prepare(&sql)?;
                let rows = stmt.query_map([name], row_to_symbol)?;
                for row in rows {
                    symbols.push(row?);
                }
            }
        }
        Ok(symbols)
    }

    /// Look up one symbol by id.
    pub fn symbol_by_id(&self, id: i64) -> Result<Option<SymbolRow>> {
        let sql = format!("SELECT {} FROM symbols WHERE id = ?1", SYMBOL_COLUMNS);
        Ok(self
            .conn()
            .query_row(&sql, [id], row_to_symbol)
            .optional()?)
    }

    /// All symbols, ordered by id.
    pub fn all_symbols(&self) -> Result<Vec<SymbolRow>> {
        let sql = format!("SELECT {} FROM symbols ORDER BY id", SYMBOL_COLUMNS);
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    /// Symbols in one file, ordered by start line.
    pub fn symbols_in_file(&self, file_id: i64) -> Result<Vec<SymbolRow>> {
        let sql = format!(
            "SELECT {} FROM symbols WHERE file_id = ?1 ORDER BY start_line, id",
            SYMBOL_COLUMNS
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([file_id], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    /// Symbols whose qualified name starts with the given prefix.
    ///
    /// `%` and `_` in the prefix are escaped so they match literally.
    pub fn symbols_with_qualified_prefix(&self, prefix: &str) -> Result<Vec<SymbolRow>> {
        let escaped = prefix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("{}%", escaped);
        let sql = format!(
            "SELECT {} FROM symbols WHERE qualified_name LIKE ?1 ESCAPE '\\' ORDER BY id",
            SYMBOL_COLUMNS
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([pattern], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    /// Symbols of one kind, optionally restricted to a language.
    pub fn symbols_by_kind(&self, kind: &str, language: Option<&str>) -> Result<Vec<SymbolRow>> {
        let mut symbols = Vec::new();
        match language {
            Some(lang) => {
                let sql = format!(
                    "SELECT {} FROM symbols WHERE kind = ?1 AND language = ?2 ORDER BY id",
                    SYMBOL_COLUMNS
                );
                let mut stmt = self.conn().prepare(&sql)?;
                let rows = stmt.query_map(params![kind, lang], row_to_symbol)?;
                for row in rows {
                    symbols.push(row?);
                }
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM symbols WHERE kind = ?1 ORDER BY id",
                    SYMBOL_COLUMNS
                );
                let mut stmt = self.conn().prepare(&sql)?;
                let rows = stmt.query_map([kind], row_to_symbol)?;
                for row in rows {
                    symbols.push(row?);
                }
            }
        }
        Ok(symbols)
    }

    /// File path and span of a symbol, resolved through the files table.
    pub fn symbol_location(&self, id: i64) -> Result<Option<SymbolLocation>> {
        let sql = "SELECT f.path, s.start_line, s.start_col, s.end_line, s.end_col
             FROM symbols s JOIN files f ON f.id = s.file_id
             WHERE s.id = ?1";
        Ok(self
            .conn()
            .query_row(sql, [id], |row| {
                Ok(SymbolLocation {
                    path: row.get(0)?,
                    span: Span {
                        start_line: row.get::<_, i64>(1)? as usize,
                        start_col: row.get::<_, i64>(2)? as usize,
                        end_line: row.get::<_, i64>(3)? as usize,
                        end_col: row.get::<_, i64>(4)? as usize,
                    },
                })
            })
            .optional()?)
    }

    /// Delete one symbol by id; cascade removes its edges and embeddings.
    pub fn delete_symbol(&mut self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM symbols WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Write the summary annotation columns for a symbol.
    pub fn update_summary(
        &mut self,
        symbol_id: i64,
        chunk_hash: &str,
        summary: &str,
        tokens: i64,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE symbols SET chunk_hash = ?2, chunk_summary = ?3,
                 summary_tokens = ?4, summarized_at = ?5
             WHERE id = ?1",
            params![symbol_id, chunk_hash, summary, tokens, now_secs()],
        )?;
        if affected == 0 {
            anyhow::bail!("no symbol with id {}", symbol_id);
        }
        Ok(())
    }

    /// Symbols that have never been summarized.
    pub fn symbols_missing_summary(&self) -> Result<Vec<SymbolRow>> {
        let sql = format!(
            "SELECT {} FROM symbols WHERE chunk_summary IS NULL ORDER BY id",
            SYMBOL_COLUMNS
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    /// Symbols whose current chunk hash has no embedding for `model`.
    ///
    /// A symbol qualifies when it carries a chunk hash and no embedding row
    /// for the model matches that hash (stale or absent).
    pub fn symbols_missing_embedding(&self, model: &str) -> Result<Vec<SymbolRow>> {
        let sql = format!(
            "SELECT {} FROM symbols s
             WHERE s.chunk_hash IS NOT NULL
               AND NOT EXISTS (
                   SELECT 1 FROM embeddings e
                   WHERE e.symbol_id = s.id AND e.model = ?1
                     AND e.chunk_hash = s.chunk_hash
               )
             ORDER BY s.id",
            SYMBOL_COLUMNS
                .split(", ")
                .map(|c| format!("s.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([model], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }
}
