//! Call and reference edge operations.
//!
//! Edges are owned by their site file: re-indexing a file replaces only the
//! edges anchored in it. Resolution is name-only and best-effort; edges that
//! do not resolve are dropped silently, which is policy rather than error.

use anyhow::Result;
use rusqlite::{params, OptionalExtension, Transaction};

use super::rows::{CallRow, ReferenceRow};
use super::Store;
use crate::extract::{Extraction, Span, SymbolFact};

fn row_to_call(row: &rusqlite::Row) -> rusqlite::Result<CallRow> {
    Ok(CallRow {
        id: row.get(0)?,
        caller_id: row.get(1)?,
        callee_id: row.get(2)?,
        file_id: row.get(3)?,
        span: Span {
            start_line: row.get::<_, i64>(4)? as usize,
            start_col: row.get::<_, i64>(5)? as usize,
            end_line: row.get::<_, i64>(6)? as usize,
            end_col: row.get::<_, i64>(7)? as usize,
        },
    })
}

fn row_to_reference(row: &rusqlite::Row) -> rusqlite::Result<ReferenceRow> {
    Ok(ReferenceRow {
        id: row.get(0)?,
        symbol_id: row.get(1)?,
        source_file_id: row.get(2)?,
        kind: row.get(3)?,
        span: Span {
            start_line: row.get::<_, i64>(4)? as usize,
            start_col: row.get::<_, i64>(5)? as usize,
            end_line: row.get::<_, i64>(6)? as usize,
            end_col: row.get::<_, i64>(7)? as usize,
        },
    })
}

const CALL_COLUMNS: &str =
    "id, caller_id, callee_id, file_id, start_line, start_col, end_line, end_col";
const REFERENCE_COLUMNS: &str =
    "id, symbol_id, source_file_id, kind, start_line, start_col, end_line, end_col";

/// The innermost just-inserted symbol whose span contains the given line.
///
/// Smallest span wins when several qualify; ties keep insertion order.
fn innermost_enclosing(inserted: &[(i64, &SymbolFact)], line: usize) -> Option<i64> {
    inserted
        .iter()
        .filter(|(_, fact)| fact.span.contains_line(line))
        .min_by_key(|(_, fact)| fact.span.line_count())
        .map(|(id, _)| *id)
}

/// Insert resolved call edges for a file inside an open transaction.
///
/// The callee is the first symbol in the whole index matching the extracted
/// short name (including symbols inserted moments ago in this transaction);
/// the caller is the innermost enclosing symbol of the current file. A call
/// missing either endpoint is dropped.
pub(super) fn insert_calls_tx(
    tx: &Transaction,
    file_id: i64,
    extraction: &Extraction,
    inserted: &[(i64, &SymbolFact)],
) -> Result<usize> {
    let mut lookup = tx.prepare("SELECT id FROM symbols WHERE name = ?1 ORDER BY id LIMIT 1")?;
    let mut insert = tx.prepare(
        "INSERT INTO calls (caller_id, callee_id, file_id,
             start_line, start_col, end_line, end_col)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut count = 0;
    for call in &extraction.calls {
        let callee_id: Option<i64> = lookup
            .query_row([&call.callee], |row| row.get(0))
            .optional()?;
        let Some(callee_id) = callee_id else {
            continue;
        };
        let Some(caller_id) = innermost_enclosing(inserted, call.span.start_line) else {
            continue;
        };
        insert.execute(params![
            caller_id,
            callee_id,
            file_id,
            call.span.start_line as i64,
            call.span.start_col as i64,
            call.span.end_line as i64,
            call.span.end_col as i64,
        ])?;
        count += 1;
    }
    Ok(count)
}

/// Insert resolved references for a file inside an open transaction.
///
/// The target is the first symbol anywhere in the index matching the name;
/// unresolved references are dropped.
pub(super) fn insert_references_tx(
    tx: &Transaction,
    file_id: i64,
    extraction: &Extraction,
) -> Result<usize> {
    let mut lookup = tx.prepare("SELECT id FROM symbols WHERE name = ?1 ORDER BY id LIMIT 1")?;
    let mut insert = tx.prepare(
        r#"INSERT INTO "references" (symbol_id, source_file_id, kind,
               start_line, start_col, end_line, end_col)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
    )?;
    let mut count = 0;
    for reference in &extraction.references {
        let target_id: Option<i64> = lookup
            .query_row([&reference.name], |row| row.get(0))
            .optional()?;
        let Some(target_id) = target_id else {
            continue;
        };
        insert.execute(params![
            target_id,
            file_id,
            reference.kind.as_str(),
            reference.span.start_line as i64,
            reference.span.start_col as i64,
            reference.span.end_line as i64,
            reference.span.end_col as i64,
        ])?;
        count += 1;
    }
    Ok(count)
}

impl Store {
    /// Outgoing call edges of a symbol, in store order.
    pub fn calls_from(&self, symbol_id: i64) -> Result<Vec<CallRow>> {
        let sql = format!(
            "SELECT {} FROM calls WHERE caller_id = ?1 ORDER BY id",
            CALL_COLUMNS
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([symbol_id], row_to_call)?;
        let mut calls = Vec::new();
        for row in rows {
            calls.push(row?);
        }
        Ok(calls)
    }

    /// Incoming call edges of a symbol, in store order.
    pub fn calls_to(&self, symbol_id: i64) -> Result<Vec<CallRow>> {
        let sql = format!(
            "SELECT {} FROM calls WHERE callee_id = ?1 ORDER BY id",
            CALL_COLUMNS
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([symbol_id], row_to_call)?;
        let mut calls = Vec::new();
        for row in rows {
            calls.push(row?);
        }
        Ok(calls)
    }

    /// All call edges, ordered by id.
    pub fn all_calls(&self) -> Result<Vec<CallRow>> {
        let sql = format!("SELECT {} FROM calls ORDER BY id", CALL_COLUMNS);
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_call)?;
        let mut calls = Vec::new();
        for row in rows {
            calls.push(row?);
        }
        Ok(calls)
    }

    /// References targeting a symbol, paired with their source file path.
    pub fn references_to(&self, symbol_id: i64) -> Result<Vec<(ReferenceRow, String)>> {
        let sql = format!(
            r#"SELECT {}, f.path FROM "references" r
               JOIN files f ON f.id = r.source_file_id
               WHERE r.symbol_id = ?1 ORDER BY r.id"#,
            REFERENCE_COLUMNS
                .split(", ")
                .map(|c| format!("r.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([symbol_id], |row| {
            let reference = row_to_reference(row)?;
            let path: String = row.get(8)?;
            Ok((reference, path))
        })?;
        let mut references = Vec::new();
        for row in rows {
            references.push(row?);
        }
        Ok(references)
    }

    /// All references, ordered by id.
    pub fn all_references(&self) -> Result<Vec<ReferenceRow>> {
        let sql = format!(r#"SELECT {} FROM "references" ORDER BY id"#, REFERENCE_COLUMNS);
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_reference)?;
        let mut references = Vec::new();
        for row in rows {
            references.push(row?);
        }
        Ok(references)
    }
}
