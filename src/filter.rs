//! File filtering: internal ignores, gitignore rules, include/exclude globs.
//!
//! Precedence:
//! 1. Hard internal ignores (db files, .git/, target/, node_modules/, ...)
//! 2. Gitignore-style rules (.gitignore, .ignore)
//! 3. Include glob patterns (empty = include all)
//! 4. Exclude glob patterns (applied after include)
//!
//! Filtering is a pure function of the path and the rules loaded at
//! construction time: same inputs always produce the same decision.

use anyhow::Result;
use ignore::gitignore::Gitignore;
use std::path::{Path, PathBuf};

use crate::diagnostics::SkipReason;
use crate::languages::Language;

/// Directory names that are always ignored.
const INTERNAL_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "target",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
];

/// File suffixes that are always ignored (the index database and its
/// sidecar files, to avoid watching our own writes).
const INTERNAL_IGNORE_SUFFIXES: &[&str] = &[
    ".db",
    ".db-journal",
    ".db-wal",
    ".db-shm",
    ".sqlite",
    ".sqlite3",
];

/// Compiled filter for scanning and watching.
pub struct FileFilter {
    /// Canonicalized root, used for gitignore matching.
    root: PathBuf,
    /// Root as configured; scan paths are usually built from this form.
    raw_root: PathBuf,
    gitignore: Option<Gitignore>,
    include: Vec<globset::GlobMatcher>,
    exclude: Vec<globset::GlobMatcher>,
}

impl FileFilter {
    /// Build a filter rooted at `root` with the given glob patterns.
    ///
    /// Patterns use `**`/`*`/`?` semantics and match paths relative to the
    /// root with forward slashes. Invalid patterns fail construction.
    pub fn new(root: &Path, include: &[String], exclude: &[String]) -> Result<Self> {
        let raw_root = root.to_path_buf();
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| raw_root.clone());
        let gitignore = Self::load_gitignore(&root)?;
        Ok(Self {
            root,
            raw_root,
            gitignore,
            include: Self::compile_globs(include)?,
            exclude: Self::compile_globs(exclude)?,
        })
    }

    fn load_gitignore(root: &Path) -> Result<Option<Gitignore>> {
        let mut builder = ignore::gitignore::GitignoreBuilder::new(root);
        for name in [".gitignore", ".ignore"] {
            let path = root.join(name);
            if path.exists() {
                if let Some(err) = builder.add(&path) {
                    // Malformed ignore files must not stop indexing.
                    eprintln!("Warning: failed to load {}: {}", name, err);
                }
            }
        }
        Ok(Some(builder.build()?))
    }

    fn compile_globs(patterns: &[String]) -> Result<Vec<globset::GlobMatcher>> {
        let mut matchers = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let glob = globset::Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid glob pattern '{}': {}", pattern, e))?;
            matchers.push(glob.compile_matcher());
        }
        Ok(matchers)
    }

    /// Decide whether to skip a path, returning the first applicable reason.
    pub fn should_skip(&self, path: &Path) -> Option<SkipReason> {
        if !path.is_file() {
            return Some(SkipReason::NotAFile);
        }
        if self.is_internal_ignore(path) {
            return Some(SkipReason::IgnoredInternal);
        }
        if let Some(ref gitignore) = self.gitignore {
            let check = path
                .strip_prefix(&self.root)
                .or_else(|_| path.strip_prefix(&self.raw_root))
                .unwrap_or(path);
            if gitignore.matched(check, false).is_ignore() {
                return Some(SkipReason::IgnoredByGitignore);
            }
            // Directory patterns like `build/` only match the directory
            // itself; check ancestors so files under it are caught too.
            let mut current = check.parent();
            while let Some(ancestor) = current {
                if ancestor.as_os_str().is_empty() {
                    break;
                }
                if gitignore.matched(ancestor, true).is_ignore() {
                    return Some(SkipReason::IgnoredByGitignore);
                }
                current = ancestor.parent();
            }
        }
        if Language::from_path(path).is_none() {
            return Some(SkipReason::UnsupportedLanguage);
        }
        self.glob_skip(path)
    }

    /// Include/exclude decision alone, for paths already known to exist or
    /// to have existed (watcher deletions cannot stat the file).
    pub fn glob_skip(&self, path: &Path) -> Option<SkipReason> {
        let rel = self.relative(path);
        if !self.include.is_empty() && !self.include.iter().any(|m| m.is_match(&rel)) {
            return Some(SkipReason::ExcludedByGlob);
        }
        if self.exclude.iter().any(|m| m.is_match(&rel)) {
            return Some(SkipReason::ExcludedByGlob);
        }
        None
    }

    fn is_internal_ignore(&self, path: &Path) -> bool {
        if let Some(file_name) = path.file_name() {
            let name = file_name.to_string_lossy();
            if INTERNAL_IGNORE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
                return true;
            }
        }
        if let Ok(rel) = path
            .strip_prefix(&self.root)
            .or_else(|_| path.strip_prefix(&self.raw_root))
        {
            for component in rel.components() {
                if let std::path::Component::Normal(dir) = component {
                    let dir = dir.to_string_lossy();
                    if INTERNAL_IGNORE_DIRS.contains(&dir.as_ref()) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Path relative to root with forward slashes. Both the configured and
    /// the canonicalized root forms are accepted as prefixes.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .or_else(|_| path.strip_prefix(&self.raw_root))
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| path.to_string_lossy().replace('\\', "/"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
