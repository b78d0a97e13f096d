//! Structured diagnostics for index and watch operations.
//!
//! Scans and the watch pipeline collect these instead of logging: callers
//! get a deterministic, sortable record of every skipped file and every
//! per-file error, and decide what to surface.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Reason why a file was skipped during indexing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Not a regular file (directory, special file)
    NotAFile,
    /// Extension maps to no supported language
    UnsupportedLanguage,
    /// Language is supported but not in the configured set
    LanguageDisabled,
    /// Internal hard-coded ignore rules (db files, .git/, target/, etc.)
    IgnoredInternal,
    /// Matched by gitignore-style rules
    IgnoredByGitignore,
    /// Filtered by the include/exclude glob patterns
    ExcludedByGlob,
    /// Content hash matches the stored row; nothing to do
    Unchanged,
}

impl SkipReason {
    /// Stable sort key for deterministic ordering.
    pub fn sort_key(&self) -> u8 {
        match self {
            SkipReason::IgnoredInternal => 0,
            SkipReason::IgnoredByGitignore => 1,
            SkipReason::ExcludedByGlob => 2,
            SkipReason::UnsupportedLanguage => 3,
            SkipReason::LanguageDisabled => 4,
            SkipReason::Unchanged => 5,
            SkipReason::NotAFile => 6,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SkipReason::NotAFile => "not a regular file",
            SkipReason::UnsupportedLanguage => "language not supported",
            SkipReason::LanguageDisabled => "language not enabled",
            SkipReason::IgnoredInternal => "internal ignore rule",
            SkipReason::IgnoredByGitignore => "matched by gitignore",
            SkipReason::ExcludedByGlob => "excluded by pattern",
            SkipReason::Unchanged => "content unchanged",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl PartialOrd for SkipReason {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SkipReason {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Pipeline stage where a per-file error occurred.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DiagnosticStage {
    /// Reading the file from disk
    Read,
    /// Parsing the source
    Parse,
    /// Writing the file's facts to the store
    Store,
    /// Watch pipeline event handling
    Watch,
}

impl DiagnosticStage {
    pub fn sort_key(&self) -> u8 {
        match self {
            DiagnosticStage::Read => 0,
            DiagnosticStage::Parse => 1,
            DiagnosticStage::Store => 2,
            DiagnosticStage::Watch => 3,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DiagnosticStage::Read => "reading file",
            DiagnosticStage::Parse => "parsing source",
            DiagnosticStage::Store => "writing store",
            DiagnosticStage::Watch => "watching",
        }
    }
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl PartialOrd for DiagnosticStage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DiagnosticStage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// A diagnostic event: a skipped file or a per-file error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndexDiagnostic {
    Skipped {
        /// Path relative to root
        path: String,
        reason: SkipReason,
    },
    Error {
        /// Path relative to root
        path: String,
        stage: DiagnosticStage,
        message: String,
    },
}

impl IndexDiagnostic {
    pub fn skipped(path: impl Into<String>, reason: SkipReason) -> Self {
        IndexDiagnostic::Skipped {
            path: path.into(),
            reason,
        }
    }

    pub fn error(path: impl Into<String>, stage: DiagnosticStage, message: String) -> Self {
        IndexDiagnostic::Error {
            path: path.into(),
            stage,
            message,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            IndexDiagnostic::Skipped { path, .. } => path,
            IndexDiagnostic::Error { path, .. } => path,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, IndexDiagnostic::Error { .. })
    }

    /// Stable sort key: path, then errors before skips, then detail key.
    fn sort_key(&self) -> (&str, u8, u8) {
        match self {
            IndexDiagnostic::Error { path, stage, .. } => (path, 0, stage.sort_key()),
            IndexDiagnostic::Skipped { path, reason } => (path, 1, reason.sort_key()),
        }
    }
}

impl fmt::Display for IndexDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexDiagnostic::Skipped { path, reason } => {
                write!(f, "skip {} ({})", path, reason)
            }
            IndexDiagnostic::Error {
                path,
                stage,
                message,
            } => write!(f, "error {} while {}: {}", path, stage, message),
        }
    }
}

impl PartialOrd for IndexDiagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexDiagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
