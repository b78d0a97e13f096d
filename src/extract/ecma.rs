//! Symbol extraction for TypeScript, TSX, JavaScript, and JSX.
//!
//! The four tags share one visitor: the TypeScript grammars are supersets of
//! the JavaScript one, so the TS-only node kinds (interfaces, type aliases,
//! enums, namespaces) simply never appear for js/jsx input.
//!
//! Scope composition is `parent.child` with a dot. A declaration is exported
//! when its declaring form is wrapped by an `export_*` statement; members of
//! an exported class are not themselves exported.

use tree_sitter::Node;

use super::{
    is_name_field_of, node_text, signature_snippet, CallFact, Extraction, NodeVisitor, RefKind,
    ReferenceFact, ScopeStack, Span, SymbolFact, SymbolKind, Visit,
};
use crate::languages::Language;

/// Declaring forms whose `name` field must not be emitted as a reference.
const DECLARATION_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "class_declaration",
    "method_definition",
    "field_definition",
    "public_field_definition",
    "variable_declarator",
    "interface_declaration",
    "type_alias_declaration",
    "enum_declaration",
    "internal_module",
];

pub(crate) struct EcmaVisitor {
    #[allow(dead_code)]
    language: Language,
}

impl EcmaVisitor {
    pub(crate) fn new(language: Language) -> Self {
        Self { language }
    }

    /// Whether the declaring form at `node` is wrapped by an export statement.
    ///
    /// Climbs through declaration-list wrappers only, so a method inside an
    /// exported class does not inherit the class's export flag.
    fn is_exported(node: Node) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            let kind = parent.kind();
            if kind.starts_with("export_") {
                return true;
            }
            match kind {
                "lexical_declaration" | "variable_declaration" => current = parent.parent(),
                _ => return false,
            }
        }
        false
    }

    fn push_symbol(
        &self,
        node: Node,
        source: &[u8],
        scope: &ScopeStack,
        out: &mut Extraction,
        kind: SymbolKind,
        name: &str,
    ) {
        out.symbols.push(SymbolFact {
            kind,
            name: name.to_string(),
            qualified_name: scope.qualify(name),
            span: Span::of(node),
            signature: signature_snippet(node, source),
            exported: Self::is_exported(node),
        });
    }

    /// Name of the declared entity, from the node's `name` field.
    fn declared_name<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
        node.child_by_field_name("name")
            .and_then(|n| node_text(n, source))
    }

    /// Rightmost identifier of a callee subtree: the member property for
    /// `a.b()`, the bare identifier for `b()`.
    fn callee_name<'a>(function: Node, source: &'a [u8]) -> Option<&'a str> {
        match function.kind() {
            "identifier" => node_text(function, source),
            "member_expression" => function
                .child_by_field_name("property")
                .and_then(|n| node_text(n, source)),
            // `foo!()` and `(foo)()` style wrappers
            "non_null_expression" | "parenthesized_expression" => function
                .named_child(0)
                .and_then(|inner| Self::callee_name(inner, source)),
            _ => None,
        }
    }

    /// Read, or write when the identifier is the assignment target.
    fn read_or_write(node: Node) -> RefKind {
        if let Some(parent) = node.parent() {
            let is_assignment = |n: Node| {
                matches!(
                    n.kind(),
                    "assignment_expression" | "augmented_assignment_expression"
                )
            };
            let is_left_of = |outer: Node, inner: Node| {
                outer
                    .child_by_field_name("left")
                    .map(|l| l.id() == inner.id())
                    .unwrap_or(false)
            };
            if is_assignment(parent) && is_left_of(parent, node) {
                return RefKind::Write;
            }
            // Property write: `a.b = 1` promotes `b`.
            if parent.kind() == "member_expression" {
                if let Some(grand) = parent.parent() {
                    let is_property = parent
                        .child_by_field_name("property")
                        .map(|p| p.id() == node.id())
                        .unwrap_or(false);
                    if is_property && is_assignment(grand) && is_left_of(grand, parent) {
                        return RefKind::Write;
                    }
                }
            }
        }
        RefKind::Read
    }

    /// Emit import references for every imported name under an import statement.
    fn collect_import_refs(node: Node, source: &[u8], out: &mut Extraction) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match current.kind() {
                "import_specifier" => {
                    if let Some(name) = Self::declared_name(current, source) {
                        out.references.push(ReferenceFact {
                            name: name.to_string(),
                            kind: RefKind::Import,
                            span: Span::of(current),
                        });
                    }
                }
                "namespace_import" => {
                    if let Some(name) = current.named_child(0).and_then(|n| node_text(n, source)) {
                        out.references.push(ReferenceFact {
                            name: name.to_string(),
                            kind: RefKind::Import,
                            span: Span::of(current),
                        });
                    }
                }
                "import_clause" => {
                    // Default import: bare identifier directly under the clause.
                    let mut cursor = current.walk();
                    for child in current.named_children(&mut cursor) {
                        if child.kind() == "identifier" {
                            if let Some(name) = node_text(child, source) {
                                out.references.push(ReferenceFact {
                                    name: name.to_string(),
                                    kind: RefKind::Import,
                                    span: Span::of(child),
                                });
                            }
                        } else {
                            stack.push(child);
                        }
                    }
                    continue;
                }
                _ => {}
            }
            let mut cursor = current.walk();
            for child in current.named_children(&mut cursor) {
                stack.push(child);
            }
        }
    }

    /// Emit export references for `export { a, b }` style clauses.
    fn collect_export_refs(node: Node, source: &[u8], out: &mut Extraction) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind() == "export_specifier" {
                if let Some(name) = Self::declared_name(current, source) {
                    out.references.push(ReferenceFact {
                        name: name.to_string(),
                        kind: RefKind::Export,
                        span: Span::of(current),
                    });
                }
                continue;
            }
            let mut cursor = current.walk();
            for child in current.named_children(&mut cursor) {
                stack.push(child);
            }
        }
    }

    /// Heritage references: extends → extend, implements → implement.
    fn collect_heritage_refs(node: Node, source: &[u8], out: &mut Extraction) {
        let mut stack = vec![(node, None::<RefKind>)];
        while let Some((current, kind)) = stack.pop() {
            let next_kind = match current.kind() {
                "extends_clause" => Some(RefKind::Extend),
                "implements_clause" => Some(RefKind::Implement),
                // JS grammar: `class A extends B` puts the expression
                // directly under class_heritage.
                "class_heritage" => Some(RefKind::Extend),
                _ => kind,
            };
            if matches!(current.kind(), "identifier" | "type_identifier") {
                if let (Some(kind), Some(name)) = (next_kind, node_text(current, source)) {
                    out.references.push(ReferenceFact {
                        name: name.to_string(),
                        kind,
                        span: Span::of(current),
                    });
                }
                continue;
            }
            let mut cursor = current.walk();
            for child in current.named_children(&mut cursor) {
                stack.push((child, next_kind));
            }
        }
    }

    /// Whether a variable declarator's value makes it a function symbol.
    fn declarator_is_function(node: Node) -> bool {
        node.child_by_field_name("value")
            .map(|v| {
                matches!(
                    v.kind(),
                    "arrow_function" | "function_expression" | "function" | "generator_function"
                )
            })
            .unwrap_or(false)
    }
}

impl NodeVisitor for EcmaVisitor {
    fn visit(
        &mut self,
        node: Node,
        source: &[u8],
        scope: &mut ScopeStack,
        out: &mut Extraction,
    ) -> Visit {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = Self::declared_name(node, source) {
                    self.push_symbol(node, source, scope, out, SymbolKind::Function, name);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "class_declaration" => {
                if let Some(name) = Self::declared_name(node, source) {
                    self.push_symbol(node, source, scope, out, SymbolKind::Class, name);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "interface_declaration" => {
                if let Some(name) = Self::declared_name(node, source) {
                    self.push_symbol(node, source, scope, out, SymbolKind::Interface, name);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "type_alias_declaration" => {
                if let Some(name) = Self::declared_name(node, source) {
                    self.push_symbol(node, source, scope, out, SymbolKind::Type, name);
                }
                Visit::Skip
            }
            "enum_declaration" => {
                if let Some(name) = Self::declared_name(node, source) {
                    self.push_symbol(node, source, scope, out, SymbolKind::Type, name);
                }
                Visit::Skip
            }
            "internal_module" => {
                if let Some(name) = Self::declared_name(node, source) {
                    self.push_symbol(node, source, scope, out, SymbolKind::Namespace, name);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "method_definition" => {
                if let Some(name) = Self::declared_name(node, source) {
                    self.push_symbol(node, source, scope, out, SymbolKind::Method, name);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "field_definition" | "public_field_definition" => {
                if let Some(name) = Self::declared_name(node, source) {
                    self.push_symbol(node, source, scope, out, SymbolKind::Property, name);
                }
                Visit::Children
            }
            "variable_declarator" => {
                if Self::declarator_is_function(node) {
                    if let Some(name) = Self::declared_name(node, source) {
                        self.push_symbol(node, source, scope, out, SymbolKind::Function, name);
                        return Visit::ScopedChildren(name.to_string());
                    }
                }
                Visit::Children
            }
            "call_expression" => {
                if let Some(function) = node.child_by_field_name("function") {
                    if let Some(callee) = Self::callee_name(function, source) {
                        let span = Span::of(node);
                        out.calls.push(CallFact {
                            callee: callee.to_string(),
                            span,
                        });
                        out.references.push(ReferenceFact {
                            name: callee.to_string(),
                            kind: RefKind::Call,
                            span,
                        });
                    }
                }
                Visit::Children
            }
            "import_statement" => {
                Self::collect_import_refs(node, source, out);
                Visit::Skip
            }
            "export_statement" => {
                // `export class C {}` wraps a declaration: descend so the
                // declaration is extracted (the export flag is derived from
                // this ancestor). Bare `export { a }` clauses only produce
                // export references.
                if node.child_by_field_name("declaration").is_some() {
                    Visit::Children
                } else {
                    Self::collect_export_refs(node, source, out);
                    Visit::Skip
                }
            }
            "class_heritage" | "extends_clause" | "implements_clause" => {
                Self::collect_heritage_refs(node, source, out);
                Visit::Skip
            }
            "identifier" => {
                if let Some(parent) = node.parent() {
                    if DECLARATION_KINDS.contains(&parent.kind())
                        && is_name_field_of(parent, node)
                    {
                        return Visit::Skip;
                    }
                }
                if let Some(name) = node_text(node, source) {
                    out.references.push(ReferenceFact {
                        name: name.to_string(),
                        kind: Self::read_or_write(node),
                        span: Span::of(node),
                    });
                }
                Visit::Skip
            }
            _ => Visit::Children,
        }
    }
}
