//! Incremental indexer: reconciles the file system with the store.
//!
//! Files are enumerated through the glob filter, hashed, and re-parsed only
//! when the content hash differs from the stored row. Each file's facts are
//! replaced in a single store transaction, so a failure leaves the prior
//! state intact.
//!
//! Processing is single-task and sequential: one file is parsed at a time,
//! in sorted path order, and batch progress comes from loop iteration.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::config::IndexConfig;
use crate::diagnostics::{DiagnosticStage, IndexDiagnostic, SkipReason};
use crate::extract::{extract, ExtractOptions, Extraction};
use crate::filter::FileFilter;
use crate::languages::{GrammarRegistry, Language};
use crate::store::{FileMeta, IndexedCounts, Store};

/// Progress callback for index_all: receives (current, total).
pub type ScanProgress = dyn Fn(usize, usize) + Send + Sync;

/// Result of a full scan.
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Files whose facts were (re)written.
    pub indexed: usize,
    /// Files skipped as unchanged.
    pub unchanged: usize,
    /// Diagnostics for skipped files and per-file errors, sorted.
    pub diagnostics: Vec<IndexDiagnostic>,
}

/// Outcome of indexing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Facts were written.
    Indexed {
        symbols: usize,
        calls: usize,
        references: usize,
    },
    /// Content hash matched the stored row; nothing written.
    Unchanged,
    /// The file was filtered out or its language is not indexable.
    Skipped(SkipReason),
    /// The file no longer exists; its facts were deleted.
    Removed,
}

/// Drives extraction and store updates for a project root.
pub struct Indexer {
    config: IndexConfig,
    registry: GrammarRegistry,
    store: Store,
    options: ExtractOptions,
}

impl Indexer {
    /// Open the store and prepare grammars for the configured languages.
    pub fn new(config: IndexConfig) -> Result<Self> {
        let store = Store::open(&config.db_path)?;
        Self::with_store(config, store)
    }

    /// Build an indexer over an existing store handle. The watcher and
    /// query paths share the store this way.
    pub fn with_store(config: IndexConfig, store: Store) -> Result<Self> {
        let registry = GrammarRegistry::new(&config.languages);
        let options = ExtractOptions {
            max_nested_struct_depth: config.max_nested_struct_depth,
        };
        Ok(Self {
            config,
            registry,
            store,
            options,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Release the store handle.
    pub fn close(self) -> Result<()> {
        // Connection closes on drop; nothing else to flush.
        Ok(())
    }

    /// Index every file under the root matching the configured globs.
    ///
    /// # Behavior
    /// - Enumerates regular files only, in sorted order for determinism
    /// - Applies internal ignores, gitignore rules, then include/exclude
    /// - Unchanged files (same content hash) are counted but not rewritten
    /// - Per-file store errors become diagnostics; the loop continues
    pub fn index_all(&mut self, progress: Option<&ScanProgress>) -> Result<ScanSummary> {
        let filter = self.filter()?;
        let mut summary = ScanSummary::default();
        let mut candidates: Vec<PathBuf> = Vec::new();

        for entry in walkdir::WalkDir::new(&self.config.root_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            if let Some(reason) = filter.should_skip(path) {
                // Unsupported files are the common case in a mixed tree;
                // only record the interesting skips.
                if reason != SkipReason::UnsupportedLanguage {
                    summary
                        .diagnostics
                        .push(IndexDiagnostic::skipped(filter.relative(path), reason));
                }
                continue;
            }
            candidates.push(path.to_path_buf());
        }

        candidates.sort();
        let total = candidates.len();

        for (i, path) in candidates.iter().enumerate() {
            if let Some(cb) = progress {
                cb(i + 1, total);
            }
            match self.index_path(&filter, path) {
                Ok(IndexOutcome::Indexed { .. }) => summary.indexed += 1,
                Ok(IndexOutcome::Unchanged) => summary.unchanged += 1,
                Ok(IndexOutcome::Removed) => {}
                Ok(IndexOutcome::Skipped(reason)) => {
                    summary
                        .diagnostics
                        .push(IndexDiagnostic::skipped(filter.relative(path), reason));
                }
                Err(e) => {
                    summary.diagnostics.push(IndexDiagnostic::error(
                        filter.relative(path),
                        DiagnosticStage::Store,
                        e.to_string(),
                    ));
                }
            }
        }

        summary.diagnostics.sort();
        Ok(summary)
    }

    /// Index a single file. Exposed for live updates from the watcher.
    ///
    /// Accepts absolute paths or paths relative to the root. A path whose
    /// file has disappeared deletes the stored facts instead.
    pub fn index_file(&mut self, path: &Path) -> Result<IndexOutcome> {
        let filter = self.filter()?;
        let absolute = self.absolute(path);
        self.index_path(&filter, &absolute)
    }

    /// Drop everything and re-index from scratch, then compact the store.
    pub fn rebuild(&mut self, progress: Option<&ScanProgress>) -> Result<ScanSummary> {
        self.store.clear_all()?;
        let summary = self.index_all(progress)?;
        self.store.compact()?;
        Ok(summary)
    }

    /// Delete the stored facts of one file (watcher unlink).
    pub fn remove_file(&mut self, path: &Path) -> Result<bool> {
        let rel = self.relative(path);
        self.store.delete_file(&rel)
    }

    /// Delete the stored facts of every file under a directory
    /// (watcher directory unlink). Returns the removed paths.
    pub fn remove_dir(&mut self, path: &Path) -> Result<Vec<String>> {
        let rel = self.relative(path);
        self.store.delete_files_under(&rel)
    }

    pub(crate) fn filter(&self) -> Result<FileFilter> {
        FileFilter::new(
            &self.config.root_dir,
            &self.config.include,
            &self.config.exclude,
        )
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.root_dir.join(path)
        }
    }

    /// Root-relative form of a path that may no longer exist on disk.
    fn relative(&self, path: &Path) -> String {
        let absolute = self.absolute(path);
        let root = std::fs::canonicalize(&self.config.root_dir)
            .unwrap_or_else(|_| self.config.root_dir.clone());
        absolute
            .strip_prefix(&root)
            .or_else(|_| absolute.strip_prefix(&self.config.root_dir))
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| absolute.to_string_lossy().replace('\\', "/"))
    }

    /// The per-file branch shared by index_all and index_file.
    fn index_path(&mut self, filter: &FileFilter, path: &Path) -> Result<IndexOutcome> {
        if !path.exists() {
            let removed = self.remove_file(path)?;
            return Ok(if removed {
                IndexOutcome::Removed
            } else {
                IndexOutcome::Skipped(SkipReason::NotAFile)
            });
        }

        let Some(language) = Language::from_path(path) else {
            return Ok(IndexOutcome::Skipped(SkipReason::UnsupportedLanguage));
        };
        if !self.registry.is_enabled(language) {
            return Ok(IndexOutcome::Skipped(SkipReason::LanguageDisabled));
        }

        let source =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let content_hash = hash_bytes(&source);
        let rel_path = filter.relative(path);

        if let Some(existing) = self.store.file_by_path(&rel_path)? {
            if existing.content_hash == content_hash {
                return Ok(IndexOutcome::Unchanged);
            }
        }

        let metadata = std::fs::metadata(path)?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        // A parse failure contributes an empty extraction; the file is still
        // recorded with its hash so it is not re-attempted until it changes.
        let extraction = match self.registry.parse(&source, language)? {
            Some(tree) => extract(language, &tree, &source, &self.options),
            None => Extraction::default(),
        };

        let meta = FileMeta {
            path: rel_path,
            language: language.tag().to_string(),
            content_hash,
            mtime,
            size: source.len() as i64,
        };
        let IndexedCounts {
            symbols,
            calls,
            references,
        } = self.store.apply_file_extraction(&meta, &extraction)?;

        Ok(IndexOutcome::Indexed {
            symbols,
            calls,
            references,
        })
    }
}

/// Hex SHA-256 of raw bytes; the content identity used for incremental skip.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn indexer_for(root: &Path) -> Indexer {
        let db = root.join("index.db");
        let config = IndexConfig::new(root, db);
        Indexer::new(config).unwrap()
    }

    #[test]
    fn test_hash_is_stable_hex_sha256() {
        assert_eq!(
            hash_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_index_all_then_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("a.go"), "package p\nfunc A() {}\n").unwrap();
        std::fs::write(root.join("b.go"), "package p\nfunc B() {}\n").unwrap();

        let mut indexer = indexer_for(root);
        let first = indexer.index_all(None).unwrap();
        assert_eq!(first.indexed, 2);
        assert_eq!(first.unchanged, 0);

        let second = indexer.index_all(None).unwrap();
        assert_eq!(second.indexed, 0);
        assert_eq!(second.unchanged, 2);
    }

    #[test]
    fn test_index_file_detects_change() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("a.go");
        std::fs::write(&file, "package p\nfunc A() {}\n").unwrap();

        let mut indexer = indexer_for(root);
        assert!(matches!(
            indexer.index_file(&file).unwrap(),
            IndexOutcome::Indexed { symbols: 1, .. }
        ));
        assert_eq!(indexer.index_file(&file).unwrap(), IndexOutcome::Unchanged);

        std::fs::write(&file, "package p\nfunc A() {}\nfunc B() {}\n").unwrap();
        assert!(matches!(
            indexer.index_file(&file).unwrap(),
            IndexOutcome::Indexed { symbols: 2, .. }
        ));
    }

    #[test]
    fn test_missing_file_removes_facts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("a.go");
        std::fs::write(&file, "package p\nfunc A() {}\n").unwrap();

        let mut indexer = indexer_for(root);
        indexer.index_file(&file).unwrap();
        assert_eq!(indexer.store().count_files().unwrap(), 1);

        std::fs::remove_file(&file).unwrap();
        assert_eq!(indexer.index_file(&file).unwrap(), IndexOutcome::Removed);
        assert_eq!(indexer.store().count_files().unwrap(), 0);
        assert_eq!(indexer.store().count_symbols().unwrap(), 0);
    }

    #[test]
    fn test_rebuild_clears_stale_rows() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let stale = root.join("stale.go");
        std::fs::write(&stale, "package p\nfunc Old() {}\n").unwrap();

        let mut indexer = indexer_for(root);
        indexer.index_all(None).unwrap();
        std::fs::remove_file(&stale).unwrap();
        std::fs::write(root.join("fresh.go"), "package p\nfunc New() {}\n").unwrap();

        indexer.rebuild(None).unwrap();
        assert!(indexer.store().file_by_path("stale.go").unwrap().is_none());
        assert!(indexer.store().file_by_path("fresh.go").unwrap().is_some());
    }

    #[test]
    fn test_disabled_language_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("a.go"), "package p\n").unwrap();
        std::fs::write(root.join("b.py"), "x = 1\n").unwrap();

        let db = root.join("index.db");
        let mut config = IndexConfig::new(root, db);
        config.languages = vec![Language::Python];
        let mut indexer = Indexer::new(config).unwrap();

        let outcome = indexer.index_file(&root.join("a.go")).unwrap();
        assert_eq!(outcome, IndexOutcome::Skipped(SkipReason::LanguageDisabled));
        assert!(matches!(
            indexer.index_file(&root.join("b.py")).unwrap(),
            IndexOutcome::Indexed { .. }
        ));
    }

    #[test]
    fn test_unparseable_file_recorded_with_hash() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("broken.py");
        // tree-sitter still produces a tree for damaged input, so symbols
        // may be partial, but the file row must exist with its hash either
        // way and re-indexing must be a no-op.
        std::fs::write(&file, "def broken(:\n").unwrap();

        let mut indexer = indexer_for(root);
        indexer.index_file(&file).unwrap();
        let row = indexer.store().file_by_path("broken.py").unwrap().unwrap();
        assert_eq!(row.content_hash, hash_bytes(b"def broken(:\n"));
        assert_eq!(indexer.index_file(&file).unwrap(), IndexOutcome::Unchanged);
    }
}
