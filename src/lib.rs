//! Lodestone: a queryable index of a multi-language source tree.
//!
//! For every supported language the extractors turn tree-sitter parse trees
//! into a uniform set of program facts — symbols, call sites, references —
//! persisted in a local SQLite store. On top of that store the query engine
//! answers name lookup, member enumeration, forward/backward call-chain
//! traversal, and (when embeddings are present) cosine-similarity semantic
//! search over symbol summaries.
//!
//! # Position Conventions
//!
//! Tree-sitter position conventions apply to all symbol and reference data:
//! - **Line positions**: 1-indexed (line 1 is the first line)
//! - **Column positions**: 0-indexed (column 0 is the first character)
//!
//! # Layout
//!
//! - [`languages`]: extension → language mapping and grammar loading
//! - [`extract`]: the language-neutral walk and the per-language visitors
//! - [`store`]: the SQLite schema and its narrow operation surface
//! - [`indexer`]: hash-based incremental scanning
//! - [`query`]: lookups, call chains, members, semantic search
//! - [`watcher`]: debounced live re-indexing
//! - [`annotate`]: summarizer / embedding-generator HTTP clients

pub mod annotate;
pub mod config;
pub mod diagnostics;
pub mod extract;
pub mod filter;
pub mod indexer;
pub mod languages;
pub mod query;
pub mod store;
pub mod watcher;

pub use annotate::{AnnotateReport, EmbeddingGenerator, RemoteOptions, Summarizer};
pub use config::IndexConfig;
pub use diagnostics::{DiagnosticStage, IndexDiagnostic, SkipReason};
pub use extract::{
    extract, CallFact, ExtractOptions, Extraction, RefKind, ReferenceFact, Span, SymbolFact,
    SymbolKind,
};
pub use filter::FileFilter;
pub use indexer::{hash_bytes, IndexOutcome, Indexer, ScanProgress, ScanSummary};
pub use languages::{GrammarRegistry, Language, ALL_LANGUAGES};
pub use query::{
    CallChainNode, ChainDirection, QueryEngine, ReferenceHit, SearchHit, SymbolFilter,
    DEFAULT_CHAIN_DEPTH,
};
pub use store::{
    pack_vector, CallRow, EmbeddingRow, FileMeta, FileRow, IndexedCounts, ReferenceRow, Store,
    SymbolLocation, SymbolRow,
};
pub use watcher::{FileSystemWatcher, WatchPipeline, WatcherBatch};
