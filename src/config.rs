//! Index configuration.
//!
//! The recognized options of the indexing core. A configuration file loader
//! is out of scope; the CLI (or an embedding application) fills this struct
//! and hands it to [`crate::indexer::Indexer`].

use serde::Deserialize;
use std::path::PathBuf;

use crate::languages::Language;

fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_max_nested_struct_depth() -> usize {
    3
}

fn default_batch_interval_minutes() -> u64 {
    10
}

fn default_min_change_lines() -> usize {
    5
}

fn default_debounce_ms() -> u64 {
    500
}

/// Configuration for the indexer, query engine, and watcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    /// Project root; stored paths are relative to this directory.
    pub root_dir: PathBuf,
    /// Path of the SQLite store.
    pub db_path: PathBuf,
    /// Languages to index. Empty means all supported languages.
    #[serde(default)]
    pub languages: Vec<Language>,
    /// Include globs, applied before excludes.
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    /// Exclude globs, applied after includes.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Maximum anonymous-struct nesting depth for Go field extraction.
    #[serde(default = "default_max_nested_struct_depth")]
    pub max_nested_struct_depth: usize,
    /// Watcher batch window in minutes.
    #[serde(default = "default_batch_interval_minutes")]
    pub batch_interval_minutes: u64,
    /// Minimum changed-line count for a watcher event to trigger re-indexing.
    #[serde(default = "default_min_change_lines")]
    pub min_change_lines: usize,
    /// Watcher debounce window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl IndexConfig {
    /// Minimal configuration with all options at their defaults.
    pub fn new(root_dir: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            db_path: db_path.into(),
            languages: Vec::new(),
            include: default_include(),
            exclude: Vec::new(),
            max_nested_struct_depth: default_max_nested_struct_depth(),
            batch_interval_minutes: default_batch_interval_minutes(),
            min_change_lines: default_min_change_lines(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::new("/proj", "/proj/.index.db");
        assert_eq!(config.include, vec!["**/*".to_string()]);
        assert!(config.exclude.is_empty());
        assert!(config.languages.is_empty());
        assert_eq!(config.max_nested_struct_depth, 3);
        assert_eq!(config.batch_interval_minutes, 10);
        assert_eq!(config.min_change_lines, 5);
        assert_eq!(config.debounce_ms, 500);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let config: IndexConfig = serde_json::from_str(
            r#"{
                "rootDir": "/proj",
                "dbPath": "/proj/.index.db",
                "languages": ["go", "rust"],
                "exclude": ["**/vendor/**"],
                "maxNestedStructDepth": 2,
                "minChangeLines": 10
            }"#,
        )
        .unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/proj"));
        assert_eq!(config.languages, vec![Language::Go, Language::Rust]);
        assert_eq!(config.exclude, vec!["**/vendor/**".to_string()]);
        assert_eq!(config.max_nested_struct_depth, 2);
        assert_eq!(config.min_change_lines, 10);
        // Unspecified options keep their defaults.
        assert_eq!(config.batch_interval_minutes, 10);
        assert_eq!(config.debounce_ms, 500);
    }
}
