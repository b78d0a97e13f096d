//! Live-watch pipeline: debounced events, change-threshold filtering, and
//! deferred batch re-indexing.
//!
//! Event flow: raw notify events are coalesced per path inside the debounce
//! window (default 500 ms) and surface as sorted, de-duplicated batches.
//! Each surviving path is measured against the last observed snapshot of
//! (mtime, size, line count); a known file whose line delta stays under the
//! threshold is dropped. Everything else lands in a pending set, and a
//! single batch timer (armed by the first enqueue, deliberately not
//! restarted by later ones) defers the actual re-indexing.
//!
//! Deletions are applied immediately: a vanished file is removed from the
//! store, and a vanished directory removes every stored file under it. The
//! pending set is flushed on shutdown.

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::diagnostics::SkipReason;
use crate::filter::FileFilter;
use crate::indexer::Indexer;

/// Deterministic batch of dirty paths from the filesystem watcher.
///
/// Paths only, de-duplicated and sorted, so downstream processing produces
/// the same store state regardless of event arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherBatch {
    pub paths: Vec<PathBuf>,
}

impl WatcherBatch {
    fn from_set(paths: BTreeSet<PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Last observed shape of a file, for the change-threshold test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileSnapshot {
    mtime: i64,
    size: u64,
    lines: usize,
}

/// Filesystem watcher emitting debounced path batches from a worker thread.
pub struct FileSystemWatcher {
    _thread: thread::JoinHandle<()>,
    batch_rx: Receiver<WatcherBatch>,
}

impl FileSystemWatcher {
    /// Watch `root` recursively with the given debounce window.
    pub fn new(root: PathBuf, debounce_ms: u64, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let (batch_tx, batch_rx) = mpsc::channel();
        let thread = thread::spawn(move || {
            if let Err(e) = run_watcher_thread(root, debounce_ms, batch_tx, shutdown) {
                eprintln!("Watcher error: {:?}", e);
            }
        });
        Ok(Self {
            _thread: thread,
            batch_rx,
        })
    }

    /// Receive the next batch, waiting at most `timeout`.
    ///
    /// Ok(None) means the watcher thread has terminated.
    pub fn recv_batch_timeout(&self, timeout: Duration) -> Result<Option<WatcherBatch>, ()> {
        match self.batch_rx.recv_timeout(timeout) {
            Ok(batch) => Ok(Some(batch)),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(()),
            Err(mpsc::RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

/// Debouncer thread body: collect, de-duplicate, and forward dirty paths.
fn run_watcher_thread(
    root: PathBuf,
    debounce_ms: u64,
    tx: Sender<WatcherBatch>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let mut debouncer = new_debouncer(
        Duration::from_millis(debounce_ms),
        move |result: notify_debouncer_mini::DebounceEventResult| match result {
            Ok(events) => {
                let mut dirty = BTreeSet::new();
                for event in &events {
                    let path = &event.path;
                    // The index database lives inside the root; watching our
                    // own writes would loop forever.
                    if is_database_file(&path.to_string_lossy()) {
                        continue;
                    }
                    dirty.insert(path.clone());
                }
                if !dirty.is_empty() {
                    let _ = tx.send(WatcherBatch::from_set(dirty));
                }
            }
            Err(error) => {
                eprintln!("Watcher error: {:?}", error);
            }
        },
    )?;

    debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }
    Ok(())
}

fn is_database_file(path: &str) -> bool {
    let path = path.to_lowercase();
    path.ends_with(".db")
        || path.ends_with(".db-journal")
        || path.ends_with(".db-wal")
        || path.ends_with(".db-shm")
        || path.ends_with(".sqlite")
        || path.ends_with(".sqlite3")
}

/// State machine between watcher batches and the indexer.
///
/// Owns the shared store handle through its indexer. Deletions apply
/// immediately; modifications accumulate in the pending set until the batch
/// deadline fires or the pipeline shuts down.
pub struct WatchPipeline {
    indexer: Indexer,
    filter: FileFilter,
    snapshots: BTreeMap<PathBuf, FileSnapshot>,
    pending: BTreeSet<PathBuf>,
    batch_deadline: Option<Instant>,
    batch_window: Duration,
    min_change_lines: usize,
}

impl WatchPipeline {
    pub fn new(indexer: Indexer) -> Result<Self> {
        let filter = indexer.filter()?;
        let batch_window =
            Duration::from_secs(indexer.config().batch_interval_minutes.max(1) * 60);
        let min_change_lines = indexer.config().min_change_lines;
        Ok(Self {
            indexer,
            filter,
            snapshots: BTreeMap::new(),
            pending: BTreeSet::new(),
            batch_deadline: None,
            batch_window,
            min_change_lines,
        })
    }

    /// Number of paths waiting for the batch timer.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the armed batch deadline has passed.
    pub fn batch_due(&self, now: Instant) -> bool {
        self.batch_deadline.map(|d| d <= now).unwrap_or(false)
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    pub fn indexer_mut(&mut self) -> &mut Indexer {
        &mut self.indexer
    }

    /// Handle one debounced path event.
    ///
    /// # Behavior
    /// - Vanished path: delete the file's facts, or every file under the
    ///   path when it was a directory
    /// - Existing file failing the include/exclude globs: ignored
    /// - Known file whose line delta is below the threshold: dropped (the
    ///   snapshot is kept, so small edits accumulate toward the threshold)
    /// - Otherwise: enqueued; the batch timer is armed only if idle
    pub fn handle_path(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            self.snapshots.remove(path);
            self.pending.remove(path);
            let removed = self.indexer.remove_file(path)?;
            if !removed {
                // Possibly a removed directory subtree.
                self.indexer.remove_dir(path)?;
            }
            return Ok(());
        }

        if !path.is_file() {
            return Ok(());
        }
        match self.filter.should_skip(path) {
            None => {}
            // The glob surface decides what the watcher may index; other
            // skip reasons (gitignore, internal) also end the event here.
            Some(SkipReason::Unchanged) => {}
            Some(_) => return Ok(()),
        }

        let Some(snapshot) = observe(path) else {
            return Ok(());
        };
        let known = self
            .indexer
            .store()
            .file_by_path(&self.filter.relative(path))?
            .is_some();
        if known {
            if let Some(previous) = self.snapshots.get(path) {
                let delta = snapshot.lines.abs_diff(previous.lines);
                if delta < self.min_change_lines {
                    return Ok(());
                }
            }
        }

        self.snapshots.insert(path.to_path_buf(), snapshot);
        self.pending.insert(path.to_path_buf());
        // Set-once: a path enqueued just before the timer fires is indexed
        // promptly; paths arriving after the flush start a new batch.
        if self.batch_deadline.is_none() {
            self.batch_deadline = Some(Instant::now() + self.batch_window);
        }
        Ok(())
    }

    /// Drain the pending set through the indexer and clear the batch timer.
    ///
    /// Per-path errors are reported and skipped; the drain continues.
    pub fn flush_pending(&mut self) -> Result<usize> {
        let paths: Vec<PathBuf> = std::mem::take(&mut self.pending).into_iter().collect();
        self.batch_deadline = None;
        let mut indexed = 0;
        for path in paths {
            match self.indexer.index_file(&path) {
                Ok(_) => indexed += 1,
                Err(e) => {
                    eprintln!("Watcher: failed to index {}: {}", path.display(), e);
                }
            }
        }
        Ok(indexed)
    }

    /// Run the pipeline until `shutdown` is set, then flush what is left.
    pub fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<()> {
        let root = self.indexer.config().root_dir.clone();
        let debounce_ms = self.indexer.config().debounce_ms;
        let watcher = FileSystemWatcher::new(root, debounce_ms, Arc::clone(&shutdown))?;

        while !shutdown.load(Ordering::SeqCst) {
            match watcher.recv_batch_timeout(Duration::from_millis(200)) {
                Ok(Some(batch)) => {
                    for path in &batch.paths {
                        if let Err(e) = self.handle_path(path) {
                            eprintln!(
                                "Watcher: error handling {}: {}",
                                path.display(),
                                e
                            );
                        }
                    }
                }
                Ok(None) => break,
                Err(()) => {}
            }
            if self.batch_due(Instant::now()) {
                self.flush_pending()?;
            }
        }

        // Drain whatever the batch timer still owed.
        self.flush_pending()?;
        Ok(())
    }
}

/// Snapshot of a file's (mtime, size, line count), or None when unreadable.
fn observe(path: &Path) -> Option<FileSnapshot> {
    let metadata = std::fs::metadata(path).ok()?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let contents = std::fs::read(path).ok()?;
    Some(FileSnapshot {
        mtime,
        size: metadata.len(),
        lines: count_lines(&contents),
    })
}

fn count_lines(bytes: &[u8]) -> usize {
    if bytes.is_empty() {
        return 0;
    }
    let newlines = bytes.iter().filter(|&&b| b == b'\n').count();
    if bytes.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use tempfile::TempDir;

    fn pipeline_for(root: &Path, min_change_lines: usize) -> WatchPipeline {
        let db = root.join("index.db");
        let mut config = IndexConfig::new(root, db);
        config.min_change_lines = min_change_lines;
        let indexer = Indexer::new(config).unwrap();
        WatchPipeline::new(indexer).unwrap()
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(b""), 0);
        assert_eq!(count_lines(b"one"), 1);
        assert_eq!(count_lines(b"one\n"), 1);
        assert_eq!(count_lines(b"one\ntwo\n"), 2);
        assert_eq!(count_lines(b"one\ntwo"), 2);
    }

    #[test]
    fn test_database_file_detection() {
        assert!(is_database_file("index.db"));
        assert!(is_database_file("index.DB"));
        assert!(is_database_file("index.db-wal"));
        assert!(is_database_file("data.sqlite3"));
        assert!(!is_database_file("database.rs"));
    }

    #[test]
    fn test_new_file_is_enqueued_and_timer_armed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("a.go");
        std::fs::write(&file, "package p\nfunc A() {}\n").unwrap();

        let mut pipeline = pipeline_for(root, 5);
        pipeline.handle_path(&file).unwrap();
        assert_eq!(pipeline.pending_len(), 1);
        assert!(pipeline.batch_deadline.is_some());

        assert_eq!(pipeline.flush_pending().unwrap(), 1);
        assert_eq!(pipeline.pending_len(), 0);
        assert!(pipeline.batch_deadline.is_none());
        assert_eq!(pipeline.indexer().store().count_files().unwrap(), 1);
    }

    #[test]
    fn test_small_change_below_threshold_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("a.go");
        std::fs::write(&file, "package p\nfunc A() {}\n").unwrap();

        let mut pipeline = pipeline_for(root, 5);
        pipeline.handle_path(&file).unwrap();
        pipeline.flush_pending().unwrap();

        // One added line: under the threshold for a known file.
        std::fs::write(&file, "package p\nfunc A() {}\nfunc B() {}\n").unwrap();
        pipeline.handle_path(&file).unwrap();
        assert_eq!(pipeline.pending_len(), 0);

        // Growing past the threshold fires (snapshot was kept, so the
        // delta accumulates against the last enqueued shape).
        let mut big = String::from("package p\nfunc A() {}\n");
        for i in 0..6 {
            big.push_str(&format!("func F{}() {{}}\n", i));
        }
        std::fs::write(&file, big).unwrap();
        pipeline.handle_path(&file).unwrap();
        assert_eq!(pipeline.pending_len(), 1);
    }

    #[test]
    fn test_unknown_file_bypasses_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("a.go");
        std::fs::write(&file, "package p\n").unwrap();

        let mut pipeline = pipeline_for(root, 100);
        // Not in the store yet: enqueued despite the huge threshold.
        pipeline.handle_path(&file).unwrap();
        assert_eq!(pipeline.pending_len(), 1);
    }

    #[test]
    fn test_unlink_deletes_file_facts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("a.go");
        std::fs::write(&file, "package p\nfunc A() {}\n").unwrap();

        let mut pipeline = pipeline_for(root, 5);
        pipeline.handle_path(&file).unwrap();
        pipeline.flush_pending().unwrap();
        assert_eq!(pipeline.indexer().store().count_files().unwrap(), 1);

        std::fs::remove_file(&file).unwrap();
        pipeline.handle_path(&file).unwrap();
        assert_eq!(pipeline.indexer().store().count_files().unwrap(), 0);
        assert_eq!(pipeline.indexer().store().count_symbols().unwrap(), 0);
    }

    #[test]
    fn test_directory_unlink_deletes_subtree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("pkg")).unwrap();
        std::fs::write(root.join("pkg/a.go"), "package p\nfunc A() {}\n").unwrap();
        std::fs::write(root.join("pkg/b.go"), "package p\nfunc B() {}\n").unwrap();
        std::fs::write(root.join("keep.go"), "package p\nfunc K() {}\n").unwrap();

        let mut pipeline = pipeline_for(root, 5);
        for file in ["pkg/a.go", "pkg/b.go", "keep.go"] {
            pipeline.handle_path(&root.join(file)).unwrap();
        }
        pipeline.flush_pending().unwrap();
        assert_eq!(pipeline.indexer().store().count_files().unwrap(), 3);

        std::fs::remove_dir_all(root.join("pkg")).unwrap();
        pipeline.handle_path(&root.join("pkg")).unwrap();
        assert_eq!(pipeline.indexer().store().count_files().unwrap(), 1);
        assert!(pipeline
            .indexer()
            .store()
            .file_by_path("keep.go")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_batch_timer_is_set_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("a.go"), "package p\n").unwrap();
        std::fs::write(root.join("b.go"), "package p\n").unwrap();

        let mut pipeline = pipeline_for(root, 5);
        pipeline.handle_path(&root.join("a.go")).unwrap();
        let armed = pipeline.batch_deadline.unwrap();
        std::thread::sleep(Duration::from_millis(10));
        pipeline.handle_path(&root.join("b.go")).unwrap();
        // The second enqueue must not push the deadline out.
        assert_eq!(pipeline.batch_deadline.unwrap(), armed);
    }
}
