//! Symbol extraction for Java.
//!
//! The package declaration forms the outermost scope. Constructors keep the
//! class's short name; interface fields become constants and interface
//! members are always exported, otherwise visibility requires an explicit
//! `public` modifier.

use tree_sitter::Node;

use super::{
    is_name_field_of, node_text, signature_snippet, CallFact, Extraction, NodeVisitor, RefKind,
    ReferenceFact, ScopeStack, Span, SymbolFact, SymbolKind, Visit,
};

/// Declaring forms whose `name` field must not be emitted as a reference.
const DECLARATION_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "method_declaration",
    "constructor_declaration",
    "variable_declarator",
];

pub(crate) struct JavaVisitor;

impl JavaVisitor {
    pub(crate) fn new() -> Self {
        Self
    }

    /// Whether a declaration's modifier list contains `public`.
    fn has_public_modifier(node: Node, source: &[u8]) -> bool {
        let mut cursor = node.walk();
        let found = node.named_children(&mut cursor).any(|child| {
            child.kind() == "modifiers"
                && node_text(child, source)
                    .map(|t| t.split_whitespace().any(|m| m == "public"))
                    .unwrap_or(false)
        });
        found
    }

    /// Whether the member sits directly inside an interface body.
    fn in_interface(node: Node) -> bool {
        node.parent()
            .map(|p| p.kind() == "interface_body")
            .unwrap_or(false)
    }

    fn is_exported(node: Node, source: &[u8]) -> bool {
        // Interface members are implicitly public.
        Self::in_interface(node) || Self::has_public_modifier(node, source)
    }

    fn push_symbol(
        &self,
        node: Node,
        span_node: Node,
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
            span: Span::of(span_node),
            signature: signature_snippet(span_node, source),
            exported: Self::is_exported(node, source),
        });
    }

    /// Last identifier of a scoped name like `java.util.List`.
    fn scoped_tail<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
        match node.kind() {
            "identifier" => node_text(node, source),
            "scoped_identifier" => node
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source)),
            _ => None,
        }
    }

    fn read_or_write(node: Node) -> RefKind {
        let mut current = node;
        while let Some(parent) = current.parent() {
            match parent.kind() {
                "field_access" | "array_access" => current = parent,
                "assignment_expression" => {
                    let is_left = parent
                        .child_by_field_name("left")
                        .map(|l| l.id() == current.id())
                        .unwrap_or(false);
                    return if is_left { RefKind::Write } else { RefKind::Read };
                }
                _ => return RefKind::Read,
            }
        }
        RefKind::Read
    }

    /// References for `extends`/`implements` clauses.
    fn collect_type_refs(node: Node, source: &[u8], kind: RefKind, out: &mut Extraction) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind() == "type_identifier" {
                if let Some(name) = node_text(current, source) {
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
                stack.push(child);
            }
        }
    }
}

impl NodeVisitor for JavaVisitor {
    fn visit(
        &mut self,
        node: Node,
        source: &[u8],
        scope: &mut ScopeStack,
        out: &mut Extraction,
    ) -> Visit {
        match node.kind() {
            "program" => {
                // The package declaration scopes the whole compilation unit.
                let mut cursor = node.walk();
                let package = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "package_declaration")
                    .and_then(|decl| {
                        let mut inner = decl.walk();
                        let found = decl
                            .named_children(&mut inner)
                            .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
                            .and_then(|n| node_text(n, source));
                        found
                    });
                match package {
                    Some(name) => Visit::ScopedChildren(name.to_string()),
                    None => Visit::Children,
                }
            }
            "class_declaration" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    self.push_symbol(node, node, source, scope, out, SymbolKind::Class, name);
                    if let Some(superclass) = node.child_by_field_name("superclass") {
                        Self::collect_type_refs(superclass, source, RefKind::Extend, out);
                    }
                    if let Some(interfaces) = node.child_by_field_name("interfaces") {
                        Self::collect_type_refs(interfaces, source, RefKind::Implement, out);
                    }
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "interface_declaration" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    self.push_symbol(node, node, source, scope, out, SymbolKind::Interface, name);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "enum_declaration" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    self.push_symbol(node, node, source, scope, out, SymbolKind::Type, name);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "method_declaration" | "constructor_declaration" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    self.push_symbol(node, node, source, scope, out, SymbolKind::Method, name);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "field_declaration" => {
                let kind = if Self::in_interface(node) {
                    SymbolKind::Constant
                } else {
                    SymbolKind::Field
                };
                let mut cursor = node.walk();
                for declarator in node.named_children(&mut cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    if let Some(name) = declarator
                        .child_by_field_name("name")
                        .and_then(|n| node_text(n, source))
                    {
                        self.push_symbol(node, node, source, scope, out, kind, name);
                    }
                }
                Visit::Children
            }
            "method_invocation" => {
                if let Some(callee) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
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
                Visit::Children
            }
            "import_declaration" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if let Some(name) = Self::scoped_tail(child, source) {
                        out.references.push(ReferenceFact {
                            name: name.to_string(),
                            kind: RefKind::Import,
                            span: Span::of(node),
                        });
                    }
                }
                Visit::Skip
            }
            "identifier" => {
                if let Some(parent) = node.parent() {
                    if DECLARATION_KINDS.contains(&parent.kind())
                        && is_name_field_of(parent, node)
                    {
                        return Visit::Skip;
                    }
                    // The invocation name was already recorded as a call.
                    if parent.kind() == "method_invocation"
                        && parent
                            .child_by_field_name("name")
                            .map(|n| n.id() == node.id())
                            .unwrap_or(false)
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
