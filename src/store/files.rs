//! File row operations.

use anyhow::Result;
use rusqlite::{params, OptionalExtension, Transaction};

use super::rows::{FileMeta, FileRow};
use super::Store;

/// Upsert a file row inside an open transaction, returning its id.
///
/// On path conflict the hash, mtime, size, language, and index timestamp
/// are refreshed; the row id is stable across re-indexes.
pub(super) fn upsert_file_tx(tx: &Transaction, meta: &FileMeta, now: i64) -> Result<i64> {
    tx.execute(
        "INSERT INTO files (path, language, content_hash, mtime, size, indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(path) DO UPDATE SET
             language = excluded.language,
             content_hash = excluded.content_hash,
             mtime = excluded.mtime,
             size = excluded.size,
             indexed_at = excluded.indexed_at",
        params![
            meta.path,
            meta.language,
            meta.content_hash,
            meta.mtime,
            meta.size,
            now
        ],
    )?;
    let id: i64 = tx.query_row("SELECT id FROM files WHERE path = ?1", [&meta.path], |row| {
        row.get(0)
    })?;
    Ok(id)
}

fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        path: row.get(1)?,
        language: row.get(2)?,
        content_hash: row.get(3)?,
        mtime: row.get(4)?,
        size: row.get(5)?,
        indexed_at: row.get(6)?,
    })
}

const FILE_COLUMNS: &str = "id, path, language, content_hash, mtime, size, indexed_at";

impl Store {
    /// Look up a file row by its relative path.
    pub fn file_by_path(&self, path: &str) -> Result<Option<FileRow>> {
        let sql = format!("SELECT {} FROM files WHERE path = ?1", FILE_COLUMNS);
        Ok(self
            .conn()
            .query_row(&sql, [path], row_to_file)
            .optional()?)
    }

    /// Look up a file row by id.
    pub fn file_by_id(&self, id: i64) -> Result<Option<FileRow>> {
        let sql = format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS);
        Ok(self.conn().query_row(&sql, [id], row_to_file).optional()?)
    }

    /// All file rows, ordered by path.
    pub fn all_files(&self) -> Result<Vec<FileRow>> {
        let sql = format!("SELECT {} FROM files ORDER BY path", FILE_COLUMNS);
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_file)?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    /// Delete a file and, through cascade, all symbols, calls, references,
    /// and embeddings that hang off it.
    ///
    /// # Returns
    /// true when a row was deleted.
    pub fn delete_file(&mut self, path: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM files WHERE path = ?1", [path])?;
        Ok(affected > 0)
    }

    /// Delete every stored file whose path equals `dir` or starts with
    /// `dir/`. Used when a directory subtree is removed.
    ///
    /// # Returns
    /// The deleted paths, in lexicographic order.
    pub fn delete_files_under(&mut self, dir: &str) -> Result<Vec<String>> {
        let dir = dir.trim_end_matches('/');
        let prefix = format!("{}/", dir);
        let mut paths = Vec::new();
        {
            let mut stmt = self
                .conn()
                .prepare("SELECT path FROM files WHERE path = ?1 OR path >= ?2 AND path < ?3 ORDER BY path")?;
            // Range scan on the path index: [dir/, dir0) covers all paths
            // with the dir/ prefix ('0' is '/' + 1 in ASCII).
            let upper = format!("{}0", dir);
            let rows = stmt.query_map(params![dir, prefix, upper], |row| row.get::<_, String>(0))?;
            for row in rows {
                paths.push(row?);
            }
        }
        for path in &paths {
            self.conn()
                .execute("DELETE FROM files WHERE path = ?1", [path])?;
        }
        Ok(paths)
    }
}
