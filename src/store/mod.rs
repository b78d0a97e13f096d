//! Persistent fact store backed by SQLite.
//!
//! Provides deterministic, idempotent operations for persisting code facts:
//! files, symbols, call edges, references, and embeddings. The schema is
//! fixed; the only online migration adds the four summary columns to an
//! older symbols table at open time.
//!
//! Exactly one writer is assumed. The database runs in WAL mode with
//! synchronous=NORMAL, so concurrent readers are tolerated during a write.

mod edges;
mod embeddings;
mod files;
mod rows;
mod symbols;

pub use rows::{
    pack_vector, CallRow, EmbeddingRow, FileMeta, FileRow, ReferenceRow, SymbolLocation, SymbolRow,
};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::extract::Extraction;

/// Counts written by one per-file transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexedCounts {
    pub symbols: usize,
    pub calls: usize,
    pub references: usize,
}

/// SQLite-backed fact store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a store at the given path.
    ///
    /// # Behavior
    /// 1. Apply connection pragmas (WAL journal, NORMAL sync, foreign keys)
    /// 2. Create the schema if absent
    /// 3. Add the summary columns to an older symbols table if missing
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).with_context(|| {
            format!("failed to open database at {}", db_path.as_ref().display())
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to configure SQLite pragmas")?;
        let mut store = Self { conn };
        store.init_schema()?;
        store.migrate_summary_columns()?;
        Ok(store)
    }

    fn init_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                language TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                mtime INTEGER NOT NULL,
                size INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS symbols (
                id INTEGER PRIMARY KEY,
                file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                language TEXT NOT NULL,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                qualified_name TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                start_col INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_col INTEGER NOT NULL,
                signature TEXT,
                exported INTEGER NOT NULL DEFAULT 0,
                chunk_hash TEXT,
                chunk_summary TEXT,
                summary_tokens INTEGER,
                summarized_at INTEGER
            );
            CREATE TABLE IF NOT EXISTS calls (
                id INTEGER PRIMARY KEY,
                caller_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
                callee_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
                file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                start_line INTEGER NOT NULL,
                start_col INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_col INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS "references" (
                id INTEGER PRIMARY KEY,
                symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
                source_file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                start_col INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_col INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS embeddings (
                id INTEGER PRIMARY KEY,
                symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
                model TEXT NOT NULL,
                dim INTEGER NOT NULL,
                vector BLOB NOT NULL,
                chunk_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(symbol_id, model)
            );
            CREATE INDEX IF NOT EXISTS idx_files_path ON files(path);
            CREATE INDEX IF NOT EXISTS idx_files_content_hash ON files(content_hash);
            CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
            CREATE INDEX IF NOT EXISTS idx_symbols_qualified_name ON symbols(qualified_name);
            CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);
            CREATE INDEX IF NOT EXISTS idx_symbols_kind ON symbols(kind);
            CREATE INDEX IF NOT EXISTS idx_calls_caller ON calls(caller_id);
            CREATE INDEX IF NOT EXISTS idx_calls_callee ON calls(callee_id);
            CREATE INDEX IF NOT EXISTS idx_references_target ON "references"(symbol_id);
            CREATE INDEX IF NOT EXISTS idx_references_source_file ON "references"(source_file_id);
            CREATE INDEX IF NOT EXISTS idx_embeddings_model ON embeddings(model);
            CREATE INDEX IF NOT EXISTS idx_embeddings_chunk_hash ON embeddings(chunk_hash);
            "#,
        )?;
        Ok(())
    }

    /// Add the four summary columns to a symbols table created before they
    /// existed. All four are added in a single transaction; no other
    /// migrations are performed.
    fn migrate_summary_columns(&mut self) -> Result<()> {
        let mut existing: Vec<String> = Vec::new();
        {
            let mut stmt = self.conn.prepare("PRAGMA table_info(symbols)")?;
            let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
            for name in names {
                existing.push(name?);
            }
        }
        let wanted = [
            ("chunk_hash", "TEXT"),
            ("chunk_summary", "TEXT"),
            ("summary_tokens", "INTEGER"),
            ("summarized_at", "INTEGER"),
        ];
        let missing: Vec<_> = wanted
            .iter()
            .filter(|(name, _)| !existing.iter().any(|c| c == name))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        for (name, ty) in missing {
            tx.execute_batch(&format!("ALTER TABLE symbols ADD COLUMN {} {}", name, ty))?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace all facts for one file in a single transaction.
    ///
    /// # Behavior
    /// 1. Delete the file's prior symbols, calls, and references
    /// 2. Upsert the file row (hash/mtime/size/indexed_at refresh)
    /// 3. Insert the new symbols
    /// 4. Resolve and insert calls and references
    ///
    /// Resolution is best-effort and name-only. The callee of a call is the
    /// first symbol anywhere in the index whose short name matches; the
    /// caller is the innermost symbol of *this* file whose span contains the
    /// call site's start line (smallest span wins). Edges that fail to
    /// resolve are dropped silently. This asymmetry between caller and
    /// callee resolution is deliberate.
    ///
    /// A failure rolls the whole transaction back, leaving prior state
    /// intact.
    pub fn apply_file_extraction(
        &mut self,
        meta: &FileMeta,
        extraction: &Extraction,
    ) -> Result<IndexedCounts> {
        let now = now_secs();
        let tx = self.conn.transaction()?;

        let existing_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM files WHERE path = ?1",
                [&meta.path],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(file_id) = existing_id {
            tx.execute("DELETE FROM calls WHERE file_id = ?1", [file_id])?;
            tx.execute(
                r#"DELETE FROM "references" WHERE source_file_id = ?1"#,
                [file_id],
            )?;
            tx.execute("DELETE FROM symbols WHERE file_id = ?1", [file_id])?;
        }

        let file_id = files::upsert_file_tx(&tx, meta, now)?;

        // Insert symbols, keeping (id, fact) pairs for caller resolution.
        let inserted = symbols::insert_symbols_tx(&tx, file_id, &meta.language, extraction)?;

        let mut counts = IndexedCounts {
            symbols: inserted.len(),
            ..Default::default()
        };

        counts.calls = edges::insert_calls_tx(&tx, file_id, extraction, &inserted)?;
        counts.references = edges::insert_references_tx(&tx, file_id, extraction)?;

        tx.commit()?;
        Ok(counts)
    }

    /// Count files in the store.
    pub fn count_files(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM files")
    }

    /// Count symbols in the store.
    pub fn count_symbols(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM symbols")
    }

    /// Count call edges in the store.
    pub fn count_calls(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM calls")
    }

    /// Count references in the store.
    pub fn count_references(&self) -> Result<usize> {
        self.count(r#"SELECT COUNT(*) FROM "references""#)
    }

    /// Count embeddings in the store.
    pub fn count_embeddings(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM embeddings")
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Delete every row from every table.
    pub fn clear_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM embeddings", [])?;
        tx.execute(r#"DELETE FROM "references""#, [])?;
        tx.execute("DELETE FROM calls", [])?;
        tx.execute("DELETE FROM symbols", [])?;
        tx.execute("DELETE FROM files", [])?;
        tx.commit()?;
        Ok(())
    }

    /// Reclaim space after bulk deletions.
    pub fn compact(&mut self) -> Result<()> {
        self.conn.execute_batch("VACUUM")?;
        Ok(())
    }

    /// Export all files, symbols, calls, and references as a JSON document.
    pub fn export_json(&self) -> Result<String> {
        let export = serde_json::json!({
            "files": self.all_files()?,
            "symbols": self.all_symbols()?,
            "calls": self.all_calls()?,
            "references": self.all_references()?,
        });
        Ok(serde_json::to_string_pretty(&export)?)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Current Unix timestamp in seconds.
pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
