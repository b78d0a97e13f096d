//! Language-neutral extraction framework.
//!
//! Converts a parsed tree-sitter syntax tree into flat sequences of symbol,
//! call-site, and reference facts obeying a uniform data contract. The walk
//! itself is generic: named children are visited depth-first, and at each
//! node the language visitor decides whether to emit facts, descend with a
//! modified lexical scope, or skip the subtree entirely.
//!
//! # Position Conventions
//!
//! - **Line positions**: 1-indexed (line 1 is the first line)
//! - **Column positions**: 0-indexed (column 0 is the first character)
//!
//! Extraction never aborts indexing: a malformed subtree simply produces no
//! facts and the walk continues with its siblings.

mod ecma;
mod go;
mod html;
mod java;
mod python;
mod rust_lang;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::languages::Language;

/// Maximum signature length in bytes after trimming.
const SIGNATURE_MAX_BYTES: usize = 200;

/// Maximum number of lines taken for a signature snippet.
const SIGNATURE_MAX_LINES: usize = 3;

/// Kind of symbol extracted from source code.
///
/// Language-agnostic symbol kinds that map across all supported grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Struct,
    Variable,
    Constant,
    Property,
    Field,
    Module,
    Namespace,
    Type,
}

impl SymbolKind {
    /// The normalized string key for this kind (used for storage and CLI).
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Struct => "struct",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Property => "property",
            SymbolKind::Field => "field",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Type => "type",
        }
    }

    /// Parse a stored kind string back into a SymbolKind (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "function" | "fn" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            "class" => Some(SymbolKind::Class),
            "interface" | "trait" => Some(SymbolKind::Interface),
            "struct" => Some(SymbolKind::Struct),
            "variable" | "var" => Some(SymbolKind::Variable),
            "constant" | "const" => Some(SymbolKind::Constant),
            "property" => Some(SymbolKind::Property),
            "field" => Some(SymbolKind::Field),
            "module" | "mod" => Some(SymbolKind::Module),
            "namespace" | "ns" => Some(SymbolKind::Namespace),
            "type" | "typealias" => Some(SymbolKind::Type),
            _ => None,
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of reference: a non-definition use of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Call,
    Read,
    Write,
    Import,
    Export,
    Extend,
    Implement,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Call => "call",
            RefKind::Read => "read",
            RefKind::Write => "write",
            RefKind::Import => "import",
            RefKind::Export => "export",
            RefKind::Extend => "extend",
            RefKind::Implement => "implement",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "call" => Some(RefKind::Call),
            "read" => Some(RefKind::Read),
            "write" => Some(RefKind::Write),
            "import" => Some(RefKind::Import),
            "export" => Some(RefKind::Export),
            "extend" => Some(RefKind::Extend),
            "implement" => Some(RefKind::Implement),
            _ => None,
        }
    }
}

/// Source span: 1-indexed lines, 0-indexed columns, end inclusive of the
/// declaration form as parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    /// Span of a tree-sitter node in index conventions.
    pub fn of(node: Node) -> Self {
        Self {
            start_line: node.start_position().row + 1,
            start_col: node.start_position().column,
            end_line: node.end_position().row + 1,
            end_col: node.end_position().column,
        }
    }

    /// Whether a 1-indexed line falls within this span.
    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// Span height in lines, used to pick the innermost enclosing symbol.
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// A fact about a symbol extracted from source code.
///
/// Pure data. The owning file is attached later by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFact {
    pub kind: SymbolKind,
    /// Short name (rightmost path component).
    pub name: String,
    /// Scope-aware dotted/colon-separated name, unique per occurrence.
    pub qualified_name: String,
    pub span: Span,
    /// First lines of the declaration, trimmed to a bounded snippet.
    pub signature: Option<String>,
    /// Language-specific visibility rule result.
    pub exported: bool,
}

/// A call site: an invocation expression and the short name it targets.
///
/// The caller is not recorded here; the indexer derives it from the
/// innermost symbol span enclosing the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFact {
    /// Rightmost identifier of the callee subtree.
    pub callee: String,
    /// Span of the whole call expression.
    pub span: Span,
}

/// A non-definition use of a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFact {
    pub name: String,
    pub kind: RefKind,
    pub span: Span,
}

/// Everything extracted from one file: symbols, call sites, references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub symbols: Vec<SymbolFact>,
    pub calls: Vec<CallFact>,
    pub references: Vec<ReferenceFact>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.calls.is_empty() && self.references.is_empty()
    }
}

/// Options threaded through extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Maximum anonymous-struct nesting depth descended for Go struct fields.
    pub max_nested_struct_depth: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_nested_struct_depth: 3,
        }
    }
}

/// Separator character for qualified-name construction per language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSeparator {
    /// Rust uses :: between scopes.
    DoubleColon,
    /// Everything else uses a dot.
    Dot,
}

impl ScopeSeparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeSeparator::DoubleColon => "::",
            ScopeSeparator::Dot => ".",
        }
    }
}

/// Stack of lexical scope names maintained during the walk.
///
/// Scopes (packages, modules, classes, impl targets) are pushed on descent
/// and popped on the way back out; `qualify` joins them with the language's
/// separator to build a qualified name for a symbol.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    scopes: Vec<String>,
    separator: ScopeSeparator,
}

impl ScopeStack {
    pub fn new(separator: ScopeSeparator) -> Self {
        Self {
            scopes: Vec::new(),
            separator,
        }
    }

    pub fn push(&mut self, scope: impl Into<String>) {
        self.scopes.push(scope.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.scopes.pop()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Current scope path, empty string at top level.
    pub fn current(&self) -> String {
        self.scopes.join(self.separator.as_str())
    }

    /// Qualified name for a symbol declared in the current scope.
    pub fn qualify(&self, name: &str) -> String {
        if self.scopes.is_empty() {
            name.to_string()
        } else if name.is_empty() {
            self.current()
        } else {
            format!("{}{}{}", self.current(), self.separator.as_str(), name)
        }
    }
}

/// What the walk driver does after a visitor inspected a node.
pub(crate) enum Visit {
    /// Descend into named children with the scope unchanged.
    Children,
    /// Push a scope, descend into named children, pop on the way out.
    ScopedChildren(String),
    /// Do not descend.
    Skip,
}

/// Per-language node dispatch.
///
/// Implementations emit facts into the sink and steer the walk. All the
/// language-specific policy lives here: which node types yield which symbol
/// kind, how qualified names compose, and which identifier positions are
/// declarations rather than references.
pub(crate) trait NodeVisitor {
    fn visit(
        &mut self,
        node: Node,
        source: &[u8],
        scope: &mut ScopeStack,
        out: &mut Extraction,
    ) -> Visit;
}

/// Generic depth-first walk over named children.
pub(crate) fn walk<V: NodeVisitor>(
    visitor: &mut V,
    node: Node,
    source: &[u8],
    scope: &mut ScopeStack,
    out: &mut Extraction,
) {
    match visitor.visit(node, source, scope, out) {
        Visit::Skip => {}
        Visit::Children => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk(visitor, child, source, scope, out);
            }
        }
        Visit::ScopedChildren(name) => {
            scope.push(name);
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk(visitor, child, source, scope, out);
            }
            scope.pop();
        }
    }
}

/// Extract symbol, call, and reference facts from a parsed tree.
///
/// # Guarantees
/// - Pure function: same tree and source always produce the same facts,
///   in the same order.
/// - A subtree the extractor cannot interpret yields no facts; siblings
///   are still processed.
pub fn extract(
    language: Language,
    tree: &tree_sitter::Tree,
    source: &[u8],
    options: &ExtractOptions,
) -> Extraction {
    let mut out = Extraction::default();
    let root = tree.root_node();
    match language {
        Language::Ts | Language::Tsx | Language::Js | Language::Jsx => {
            let mut visitor = ecma::EcmaVisitor::new(language);
            let mut scope = ScopeStack::new(ScopeSeparator::Dot);
            walk(&mut visitor, root, source, &mut scope, &mut out);
        }
        Language::Go => {
            let mut visitor = go::GoVisitor::new(options.max_nested_struct_depth);
            let mut scope = ScopeStack::new(ScopeSeparator::Dot);
            walk(&mut visitor, root, source, &mut scope, &mut out);
        }
        Language::Python => {
            let mut visitor = python::PythonVisitor::new();
            let mut scope = ScopeStack::new(ScopeSeparator::Dot);
            walk(&mut visitor, root, source, &mut scope, &mut out);
        }
        Language::Rust => {
            let mut visitor = rust_lang::RustVisitor::new();
            let mut scope = ScopeStack::new(ScopeSeparator::DoubleColon);
            walk(&mut visitor, root, source, &mut scope, &mut out);
        }
        Language::Java => {
            let mut visitor = java::JavaVisitor::new();
            let mut scope = ScopeStack::new(ScopeSeparator::Dot);
            walk(&mut visitor, root, source, &mut scope, &mut out);
        }
        Language::Html => {
            let mut visitor = html::HtmlVisitor::new();
            let mut scope = ScopeStack::new(ScopeSeparator::Dot);
            walk(&mut visitor, root, source, &mut scope, &mut out);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Shared helpers used by the language visitors
// ---------------------------------------------------------------------------

/// Bounds-checked slice into source bytes.
pub(crate) fn safe_slice(source: &[u8], start: usize, end: usize) -> Option<&[u8]> {
    if start <= end && end <= source.len() {
        Some(&source[start..end])
    } else {
        None
    }
}

/// UTF-8 text of a node, or None when the span is out of bounds or invalid.
pub(crate) fn node_text<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    let bytes = safe_slice(source, node.start_byte(), node.end_byte())?;
    std::str::from_utf8(bytes).ok()
}

/// Signature snippet: the first up-to-three lines of the node text, trimmed,
/// truncated to 200 bytes on a character boundary.
pub(crate) fn signature_snippet(node: Node, source: &[u8]) -> Option<String> {
    let text = node_text(node, source)?;
    let mut snippet: String = text
        .lines()
        .take(SIGNATURE_MAX_LINES)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    if snippet.len() > SIGNATURE_MAX_BYTES {
        let mut cut = SIGNATURE_MAX_BYTES;
        while cut > 0 && !snippet.is_char_boundary(cut) {
            cut -= 1;
        }
        snippet.truncate(cut);
    }
    if snippet.is_empty() {
        None
    } else {
        Some(snippet)
    }
}

/// Whether `node` is one of the values of `parent`'s `name` field.
///
/// Used to suppress references for declared names: an identifier that is the
/// name of a declaring form must not also be emitted as a reference.
pub(crate) fn is_name_field_of(parent: Node, node: Node) -> bool {
    let mut cursor = parent.walk();
    let found = parent
        .children_by_field_name("name", &mut cursor)
        .any(|n| n.id() == node.id());
    found
}

/// Whether the first character of a name is uppercase (Go export rule).
pub(crate) fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}
