//! Symbol extraction for Rust.
//!
//! Scopes join with `::` (modules, impl targets, traits); struct fields hang
//! off their struct with a dot (`Config.path`). Impl blocks contribute scope
//! but no symbol of their own; their functions become methods qualified
//! under the impl type.
//!
//! Export rule: the declaration carries a `pub` visibility modifier.

use tree_sitter::Node;

use super::{
    is_name_field_of, node_text, signature_snippet, CallFact, Extraction, NodeVisitor, RefKind,
    ReferenceFact, ScopeStack, Span, SymbolFact, SymbolKind, Visit,
};

/// Declaring forms whose `name` field must not be emitted as a reference.
const DECLARATION_KINDS: &[&str] = &[
    "function_item",
    "function_signature_item",
    "struct_item",
    "enum_item",
    "trait_item",
    "const_item",
    "static_item",
    "mod_item",
    "type_item",
];

pub(crate) struct RustVisitor;

impl RustVisitor {
    pub(crate) fn new() -> Self {
        Self
    }

    /// Whether the declaration carries a `pub` visibility modifier.
    fn is_exported(node: Node, source: &[u8]) -> bool {
        let mut cursor = node.walk();
        let found = node.named_children(&mut cursor).any(|child| {
            child.kind() == "visibility_modifier"
                && node_text(child, source)
                    .map(|t| t.starts_with("pub"))
                    .unwrap_or(false)
        });
        found
    }

    /// Whether the item sits directly inside an impl or trait body.
    fn in_impl_or_trait(node: Node) -> bool {
        node.parent()
            .filter(|p| p.kind() == "declaration_list")
            .and_then(|p| p.parent())
            .map(|g| matches!(g.kind(), "impl_item" | "trait_item"))
            .unwrap_or(false)
    }

    fn push_symbol(
        &self,
        node: Node,
        source: &[u8],
        out: &mut Extraction,
        kind: SymbolKind,
        name: &str,
        qualified_name: String,
    ) {
        out.symbols.push(SymbolFact {
            kind,
            name: name.to_string(),
            qualified_name,
            span: Span::of(node),
            signature: signature_snippet(node, source),
            exported: Self::is_exported(node, source),
        });
    }

    /// The type a block implements: `impl Foo` and `impl Trait for Foo`
    /// both resolve through the `type` field, with generics unwrapped.
    fn impl_target<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
        let mut ty = node.child_by_field_name("type")?;
        if ty.kind() == "generic_type" {
            ty = ty.child_by_field_name("type")?;
        }
        node_text(ty, source)
    }

    /// Struct fields: `Foo.x` under the current scope.
    fn collect_struct_fields(
        &self,
        struct_item: Node,
        source: &[u8],
        owner: &str,
        out: &mut Extraction,
    ) {
        let Some(body) = struct_item.child_by_field_name("body") else {
            return;
        };
        if body.kind() != "field_declaration_list" {
            return;
        }
        let mut cursor = body.walk();
        for field in body.named_children(&mut cursor) {
            if field.kind() != "field_declaration" {
                continue;
            }
            if let Some(name) = field
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source))
            {
                let qualified = format!("{}.{}", owner, name);
                self.push_symbol(field, source, out, SymbolKind::Field, name, qualified);
            }
        }
    }

    /// Rightmost identifier of a callee subtree: the field for `x.get()`,
    /// the scoped tail for `Vec::new()`, the bare identifier for `run()`.
    fn callee_name<'a>(function: Node, source: &'a [u8]) -> Option<&'a str> {
        match function.kind() {
            "identifier" => node_text(function, source),
            "field_expression" => function
                .child_by_field_name("field")
                .and_then(|n| node_text(n, source)),
            "scoped_identifier" => function
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source)),
            "generic_function" => function
                .child_by_field_name("function")
                .and_then(|inner| Self::callee_name(inner, source)),
            "parenthesized_expression" => function
                .named_child(0)
                .and_then(|inner| Self::callee_name(inner, source)),
            _ => None,
        }
    }

    fn read_or_write(node: Node) -> RefKind {
        let mut current = node;
        while let Some(parent) = current.parent() {
            match parent.kind() {
                "field_expression" | "index_expression" => current = parent,
                "assignment_expression" | "compound_assignment_expr" => {
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

    /// Import references: the tail identifier of each imported path.
    fn collect_use_refs(node: Node, source: &[u8], out: &mut Extraction) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match current.kind() {
                "scoped_identifier" => {
                    if let Some(name) = current
                        .child_by_field_name("name")
                        .and_then(|n| node_text(n, source))
                    {
                        out.references.push(ReferenceFact {
                            name: name.to_string(),
                            kind: RefKind::Import,
                            span: Span::of(current),
                        });
                    }
                    continue;
                }
                "identifier" => {
                    // `use foo;` or a leaf inside a use list.
                    if let Some(name) = node_text(current, source) {
                        out.references.push(ReferenceFact {
                            name: name.to_string(),
                            kind: RefKind::Import,
                            span: Span::of(current),
                        });
                    }
                    continue;
                }
                "use_wildcard" => continue,
                "use_as_clause" => {
                    if let Some(path) = current.child_by_field_name("path") {
                        stack.push(path);
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
}

impl NodeVisitor for RustVisitor {
    fn visit(
        &mut self,
        node: Node,
        source: &[u8],
        scope: &mut ScopeStack,
        out: &mut Extraction,
    ) -> Visit {
        match node.kind() {
            "mod_item" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    let qualified = scope.qualify(name);
                    self.push_symbol(node, source, out, SymbolKind::Module, name, qualified);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "function_item" | "function_signature_item" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    let kind = if Self::in_impl_or_trait(node) {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    };
                    let qualified = scope.qualify(name);
                    self.push_symbol(node, source, out, kind, name, qualified);
                }
                Visit::Children
            }
            "struct_item" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    let qualified = scope.qualify(name);
                    self.push_symbol(node, source, out, SymbolKind::Struct, name, qualified.clone());
                    self.collect_struct_fields(node, source, &qualified, out);
                }
                Visit::Skip
            }
            "enum_item" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    let qualified = scope.qualify(name);
                    self.push_symbol(node, source, out, SymbolKind::Type, name, qualified);
                }
                Visit::Skip
            }
            "type_item" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    let qualified = scope.qualify(name);
                    self.push_symbol(node, source, out, SymbolKind::Type, name, qualified);
                }
                Visit::Skip
            }
            "trait_item" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    let qualified = scope.qualify(name);
                    self.push_symbol(node, source, out, SymbolKind::Interface, name, qualified);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "const_item" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    let qualified = scope.qualify(name);
                    self.push_symbol(node, source, out, SymbolKind::Constant, name, qualified);
                }
                Visit::Children
            }
            "static_item" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    let qualified = scope.qualify(name);
                    self.push_symbol(node, source, out, SymbolKind::Variable, name, qualified);
                }
                Visit::Children
            }
            "impl_item" => {
                // The impl block itself is not a symbol; its target scopes
                // the methods inside. A trait impl also records an
                // implement reference to the trait.
                if let Some(trait_node) = node.child_by_field_name("trait") {
                    let tail = match trait_node.kind() {
                        "scoped_type_identifier" => trait_node.child_by_field_name("name"),
                        _ => Some(trait_node),
                    };
                    if let Some(name) = tail.and_then(|n| node_text(n, source)) {
                        out.references.push(ReferenceFact {
                            name: name.to_string(),
                            kind: RefKind::Implement,
                            span: Span::of(trait_node),
                        });
                    }
                }
                match Self::impl_target(node, source) {
                    Some(target) => Visit::ScopedChildren(target.to_string()),
                    None => Visit::Children,
                }
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
            "use_declaration" => {
                if let Some(argument) = node.child_by_field_name("argument") {
                    Self::collect_use_refs(argument, source, out);
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
