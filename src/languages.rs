//! Language detection and tree-sitter grammar loading.
//!
//! Maps file extensions to language tags and hands out configured parsers.
//! Grammars are loaded once per language and reused for every parse.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Languages supported by the index.
///
/// Each variant corresponds to one tree-sitter grammar. TypeScript and TSX
/// are distinct grammars (TSX changes how generics/JSX parse), as are
/// JavaScript and JSX (same grammar, kept as separate tags for filtering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ts,
    Tsx,
    Js,
    Jsx,
    Go,
    Python,
    Rust,
    Java,
    Html,
}

/// All supported languages, in the order used for "index everything".
pub const ALL_LANGUAGES: [Language; 9] = [
    Language::Ts,
    Language::Tsx,
    Language::Js,
    Language::Jsx,
    Language::Go,
    Language::Python,
    Language::Rust,
    Language::Java,
    Language::Html,
];

impl Language {
    /// Detect language from a file extension string (without the dot).
    ///
    /// The mapping is fixed:
    /// `js/mjs/cjs` → js, `jsx` → jsx, `ts/mts/cts` → ts, `tsx` → tsx,
    /// `go` → go, `py/pyw` → python, `rs` → rust, `java` → java,
    /// `html/htm` → html. Anything else returns None.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "js" | "mjs" | "cjs" => Some(Language::Js),
            "jsx" => Some(Language::Jsx),
            "ts" | "mts" | "cts" => Some(Language::Ts),
            "tsx" => Some(Language::Tsx),
            "go" => Some(Language::Go),
            "py" | "pyw" => Some(Language::Python),
            "rs" => Some(Language::Rust),
            "java" => Some(Language::Java),
            "html" | "htm" => Some(Language::Html),
            _ => None,
        }
    }

    /// Detect language from a file path's extension.
    ///
    /// Returns None for unsupported extensions; the indexer skips those files.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Language tag as stored in the database and used in query filters.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Ts => "ts",
            Language::Tsx => "tsx",
            Language::Js => "js",
            Language::Jsx => "jsx",
            Language::Go => "go",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Html => "html",
        }
    }

    /// Parse a language tag back into a Language.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ts" => Some(Language::Ts),
            "tsx" => Some(Language::Tsx),
            "js" => Some(Language::Js),
            "jsx" => Some(Language::Jsx),
            "go" => Some(Language::Go),
            "python" => Some(Language::Python),
            "rust" => Some(Language::Rust),
            "java" => Some(Language::Java),
            "html" => Some(Language::Html),
            _ => None,
        }
    }

    /// The tree-sitter grammar for this language.
    fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::Ts => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::Js | Language::Jsx => tree_sitter_javascript::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
            Language::Html => tree_sitter_html::LANGUAGE.into(),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Registry of configured parsers, one per enabled language.
///
/// Read-only after initialization apart from the interior parser state
/// tree-sitter requires (`parse` takes `&mut`). A parser is built the first
/// time its language is requested and reused afterwards.
pub struct GrammarRegistry {
    enabled: Vec<Language>,
    parsers: HashMap<Language, tree_sitter::Parser>,
}

impl GrammarRegistry {
    /// Create a registry restricted to the given set of languages.
    ///
    /// An empty slice enables all supported languages.
    pub fn new(languages: &[Language]) -> Self {
        let enabled = if languages.is_empty() {
            ALL_LANGUAGES.to_vec()
        } else {
            languages.to_vec()
        };
        Self {
            enabled,
            parsers: HashMap::new(),
        }
    }

    /// Whether a language is in the enabled set.
    pub fn is_enabled(&self, language: Language) -> bool {
        self.enabled.contains(&language)
    }

    /// The enabled set, in registration order.
    pub fn enabled(&self) -> &[Language] {
        &self.enabled
    }

    /// Parse source bytes with the grammar for `language`.
    ///
    /// # Errors
    /// Fails with "language unsupported" when `language` is not in the
    /// enabled set, or when the grammar rejects the parser version.
    ///
    /// # Returns
    /// `Ok(None)` when tree-sitter could not produce a tree at all (treated
    /// as a non-fatal parse failure by the indexer).
    pub fn parse(
        &mut self,
        source: &[u8],
        language: Language,
    ) -> Result<Option<tree_sitter::Tree>> {
        if !self.enabled.contains(&language) {
            anyhow::bail!("language unsupported: {}", language.tag());
        }
        let parser = match self.parsers.entry(language) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let mut parser = tree_sitter::Parser::new();
                parser.set_language(&language.grammar())?;
                e.insert(parser)
            }
        };
        Ok(parser.parse(source, None))
    }
}
