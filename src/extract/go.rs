//! Symbol extraction for Go.
//!
//! The package name forms the outermost scope of every qualified name. For
//! method declarations the receiver's inner type (stripped of pointer
//! wrapping) is injected between package and method, so `func (f *Foo) Bar()`
//! in package `p` yields `p.Foo.Bar`.
//!
//! Anonymous struct types nested inside struct fields are descended up to a
//! configurable depth; fields beyond the limit are not emitted. Embedded
//! (unnamed) fields are emitted using the embedded type's text as the name.

use tree_sitter::Node;

use super::{
    is_name_field_of, node_text, signature_snippet, starts_uppercase, CallFact, Extraction,
    NodeVisitor, RefKind, ReferenceFact, ScopeStack, Span, SymbolFact, SymbolKind, Visit,
};

/// Declaring forms whose `name` field must not be emitted as a reference.
const DECLARATION_KINDS: &[&str] = &[
    "function_declaration",
    "method_declaration",
    "type_spec",
    "var_spec",
    "const_spec",
    "field_declaration",
    "method_elem",
    "method_spec",
];

pub(crate) struct GoVisitor {
    max_nested_struct_depth: usize,
}

impl GoVisitor {
    pub(crate) fn new(max_nested_struct_depth: usize) -> Self {
        Self {
            max_nested_struct_depth,
        }
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
            exported: starts_uppercase(name),
        });
    }

    /// Receiver type name with pointer wrapping stripped.
    ///
    /// `(f *Foo)` and `(f Foo)` both yield `Foo`; generic receivers like
    /// `(f *Foo[T])` yield the base type name.
    fn receiver_type<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
        let receiver = node.child_by_field_name("receiver")?;
        let mut cursor = receiver.walk();
        let param = receiver
            .named_children(&mut cursor)
            .find(|c| c.kind() == "parameter_declaration")?;
        let mut ty = param.child_by_field_name("type")?;
        loop {
            match ty.kind() {
                "pointer_type" => ty = ty.named_child(0)?,
                "generic_type" => ty = ty.child_by_field_name("type")?,
                _ => break,
            }
        }
        node_text(ty, source)
    }

    /// Walk a struct's field declarations, emitting field symbols.
    ///
    /// `depth` counts anonymous-struct nesting: direct fields of a named
    /// struct are depth 0 and always emitted; an anonymous struct type is
    /// only descended while `depth < max_nested_struct_depth`.
    fn collect_struct_fields(
        &self,
        struct_type: Node,
        source: &[u8],
        owner: &str,
        depth: usize,
        out: &mut Extraction,
    ) {
        let Some(field_list) = struct_type
            .named_children(&mut struct_type.walk())
            .find(|c| c.kind() == "field_declaration_list")
        else {
            return;
        };
        let mut cursor = field_list.walk();
        for field in field_list.named_children(&mut cursor) {
            if field.kind() != "field_declaration" {
                continue;
            }
            let names: Vec<String> = {
                let mut name_cursor = field.walk();
                field
                    .children_by_field_name("name", &mut name_cursor)
                    .filter_map(|n| node_text(n, source).map(str::to_string))
                    .collect()
            };
            let field_type = field.child_by_field_name("type");
            if names.is_empty() {
                // Embedded field: the type text is the name.
                if let Some(name) = field_type.and_then(|t| node_text(t, source)) {
                    let qualified = format!("{}.{}", owner, name);
                    self.push_symbol(field, source, out, SymbolKind::Field, name, qualified);
                }
                continue;
            }
            for name in &names {
                let qualified = format!("{}.{}", owner, name);
                self.push_symbol(field, source, out, SymbolKind::Field, name, qualified);
            }
            // Anonymous nested struct: descend while within the depth limit.
            if let Some(ty) = field_type {
                if ty.kind() == "struct_type" && depth < self.max_nested_struct_depth {
                    for name in &names {
                        let nested_owner = format!("{}.{}", owner, name);
                        self.collect_struct_fields(ty, source, &nested_owner, depth + 1, out);
                    }
                }
            }
        }
    }

    /// Interface method elements: `Validate() error` inside an interface body.
    fn collect_interface_methods(
        &self,
        interface_type: Node,
        source: &[u8],
        owner: &str,
        out: &mut Extraction,
    ) {
        let mut cursor = interface_type.walk();
        for member in interface_type.named_children(&mut cursor) {
            if !matches!(member.kind(), "method_elem" | "method_spec") {
                continue;
            }
            let name = member
                .child_by_field_name("name")
                .or_else(|| {
                    let mut inner = member.walk();
                    let found = member
                        .named_children(&mut inner)
                        .find(|c| c.kind() == "field_identifier");
                    found
                })
                .and_then(|n| node_text(n, source));
            if let Some(name) = name {
                let qualified = format!("{}.{}", owner, name);
                self.push_symbol(member, source, out, SymbolKind::Method, name, qualified);
            }
        }
    }

    /// Rightmost identifier of a callee: the selector field for `s.Add()`,
    /// the bare identifier for `Baz()`.
    fn callee_name<'a>(function: Node, source: &'a [u8]) -> Option<&'a str> {
        match function.kind() {
            "identifier" => node_text(function, source),
            "selector_expression" => function
                .child_by_field_name("field")
                .and_then(|n| node_text(n, source)),
            "parenthesized_expression" => function
                .named_child(0)
                .and_then(|inner| Self::callee_name(inner, source)),
            _ => None,
        }
    }

    /// Read, or write when the identifier sits in the left expression list
    /// of an assignment statement.
    fn read_or_write(node: Node) -> RefKind {
        let mut current = node;
        while let Some(parent) = current.parent() {
            match parent.kind() {
                "expression_list" | "selector_expression" | "index_expression" => {
                    current = parent;
                }
                "assignment_statement" => {
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
}

impl NodeVisitor for GoVisitor {
    fn visit(
        &mut self,
        node: Node,
        source: &[u8],
        scope: &mut ScopeStack,
        out: &mut Extraction,
    ) -> Visit {
        match node.kind() {
            "source_file" => {
                // The package clause scopes the whole file.
                let mut cursor = node.walk();
                let package = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "package_clause")
                    .and_then(|c| c.named_child(0))
                    .and_then(|n| node_text(n, source));
                match package {
                    Some(name) => Visit::ScopedChildren(name.to_string()),
                    None => Visit::Children,
                }
            }
            "function_declaration" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    let qualified = scope.qualify(name);
                    self.push_symbol(node, source, out, SymbolKind::Function, name, qualified);
                }
                Visit::Children
            }
            "method_declaration" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    // Inject the receiver type between package and method.
                    let qualified = match Self::receiver_type(node, source) {
                        Some(receiver) => scope.qualify(&format!("{}.{}", receiver, name)),
                        None => scope.qualify(name),
                    };
                    self.push_symbol(node, source, out, SymbolKind::Method, name, qualified);
                }
                Visit::Children
            }
            "type_spec" => {
                let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                else {
                    return Visit::Skip;
                };
                let qualified = scope.qualify(name);
                match node.child_by_field_name("type").map(|t| t.kind()) {
                    Some("struct_type") => {
                        self.push_symbol(node, source, out, SymbolKind::Struct, name, qualified);
                        let ty = node.child_by_field_name("type").unwrap();
                        let owner = scope.qualify(name);
                        self.collect_struct_fields(ty, source, &owner, 0, out);
                    }
                    Some("interface_type") => {
                        self.push_symbol(node, source, out, SymbolKind::Interface, name, qualified);
                        let ty = node.child_by_field_name("type").unwrap();
                        let owner = scope.qualify(name);
                        self.collect_interface_methods(ty, source, &owner, out);
                    }
                    _ => {
                        self.push_symbol(node, source, out, SymbolKind::Type, name, qualified);
                    }
                }
                Visit::Skip
            }
            "var_spec" => {
                let mut cursor = node.walk();
                for name_node in node.children_by_field_name("name", &mut cursor) {
                    if let Some(name) = node_text(name_node, source) {
                        let qualified = scope.qualify(name);
                        self.push_symbol(node, source, out, SymbolKind::Variable, name, qualified);
                    }
                }
                Visit::Children
            }
            "const_spec" => {
                let mut cursor = node.walk();
                for name_node in node.children_by_field_name("name", &mut cursor) {
                    if let Some(name) = node_text(name_node, source) {
                        let qualified = scope.qualify(name);
                        self.push_symbol(node, source, out, SymbolKind::Constant, name, qualified);
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
            "import_spec" => {
                if let Some(path) = node
                    .child_by_field_name("path")
                    .and_then(|n| node_text(n, source))
                {
                    let trimmed = path.trim_matches('"');
                    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
                    if !name.is_empty() {
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
