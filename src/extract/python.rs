//! Symbol extraction for Python.
//!
//! Functions and classes come from their definition nodes; methods and
//! class-level assignments are classified by their enclosing class body,
//! module-level assignments become variables (constants when the name is
//! all-uppercase-with-underscores), and `@property`-decorated functions
//! become properties.
//!
//! Export rule: a short name is exported unless it starts with `_`, with
//! dunder names (`__init__`) kept exported.

use tree_sitter::Node;

use super::{
    is_name_field_of, node_text, signature_snippet, CallFact, Extraction, NodeVisitor, RefKind,
    ReferenceFact, ScopeStack, Span, SymbolFact, SymbolKind, Visit,
};

/// Declaring forms whose `name` field must not be emitted as a reference.
const DECLARATION_KINDS: &[&str] = &["function_definition", "class_definition"];

/// Lexical context of a node, derived from its ancestry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Module,
    ClassBody,
    FunctionBody,
}

pub(crate) struct PythonVisitor;

impl PythonVisitor {
    pub(crate) fn new() -> Self {
        Self
    }

    /// Python visibility: leading underscore hides, dunders stay visible.
    fn is_exported(name: &str) -> bool {
        if name.starts_with("__") && name.ends_with("__") && name.len() > 4 {
            return true;
        }
        !name.starts_with('_')
    }

    /// Constant naming convention: all-uppercase with underscores.
    fn is_constant_name(name: &str) -> bool {
        name.chars().any(|c| c.is_ascii_uppercase())
            && name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    }

    /// Nearest enclosing definition kind, ignoring wrapper nodes.
    fn context_of(node: Node) -> Context {
        let mut current = node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "class_definition" => return Context::ClassBody,
                "function_definition" | "lambda" => return Context::FunctionBody,
                "module" => return Context::Module,
                _ => current = parent.parent(),
            }
        }
        Context::Module
    }

    /// Whether a definition is wrapped in a `@property` decorator.
    fn has_property_decorator(node: Node, source: &[u8]) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };
        if parent.kind() != "decorated_definition" {
            return false;
        }
        let mut cursor = parent.walk();
        let found = parent.named_children(&mut cursor).any(|child| {
            child.kind() == "decorator"
                && child
                    .named_child(0)
                    .and_then(|n| node_text(n, source))
                    .map(|t| t == "property")
                    .unwrap_or(false)
        });
        found
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
            exported: Self::is_exported(name),
        });
    }

    /// Assignment targets that produce symbols: plain identifiers on the
    /// left of a module-level or class-level assignment.
    fn assignment_targets<'a>(node: Node<'a>, source: &'a [u8]) -> Vec<(Node<'a>, &'a str)> {
        let Some(left) = node.child_by_field_name("left") else {
            return Vec::new();
        };
        match left.kind() {
            "identifier" => node_text(left, source).map(|t| vec![(left, t)]).unwrap_or_default(),
            "pattern_list" | "tuple_pattern" => {
                let mut cursor = left.walk();
                left.named_children(&mut cursor)
                    .filter(|c| c.kind() == "identifier")
                    .filter_map(|c| node_text(c, source).map(|t| (c, t)))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Rightmost name of a callee: the attribute for `obj.method()`, the
    /// bare identifier for `foo()`.
    fn callee_name<'a>(function: Node, source: &'a [u8]) -> Option<&'a str> {
        match function.kind() {
            "identifier" => node_text(function, source),
            "attribute" => function
                .child_by_field_name("attribute")
                .and_then(|n| node_text(n, source)),
            "parenthesized_expression" => function
                .named_child(0)
                .and_then(|inner| Self::callee_name(inner, source)),
            _ => None,
        }
    }

    /// Whether this identifier is an assignment target (the left field, or a
    /// component of a pattern on the left).
    fn is_assignment_target(node: Node) -> Option<Node> {
        let parent = node.parent()?;
        let assignment = match parent.kind() {
            "assignment" | "augmented_assignment" => parent,
            "pattern_list" | "tuple_pattern" => {
                let grand = parent.parent()?;
                if matches!(grand.kind(), "assignment" | "augmented_assignment") {
                    grand
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        let left = assignment.child_by_field_name("left")?;
        let target = if left.id() == node.id() {
            true
        } else {
            left.id() == node.parent()?.id()
        };
        if target {
            Some(assignment)
        } else {
            None
        }
    }

    fn collect_import_refs(node: Node, source: &[u8], out: &mut Extraction) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match current.kind() {
                "dotted_name" => {
                    // The last component is the imported name.
                    let mut cursor = current.walk();
                    if let Some(last) = current
                        .named_children(&mut cursor)
                        .filter(|c| c.kind() == "identifier")
                        .last()
                    {
                        if let Some(name) = node_text(last, source) {
                            out.references.push(ReferenceFact {
                                name: name.to_string(),
                                kind: RefKind::Import,
                                span: Span::of(current),
                            });
                        }
                    }
                    continue;
                }
                "aliased_import" => {
                    if let Some(name) = current
                        .child_by_field_name("name")
                        .and_then(|n| {
                            let mut cursor = n.walk();
                            n.named_children(&mut cursor)
                                .filter(|c| c.kind() == "identifier")
                                .last()
                                .or(Some(n))
                        })
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
                "wildcard_import" => continue,
                _ => {}
            }
            let mut cursor = current.walk();
            for child in current.named_children(&mut cursor) {
                stack.push(child);
            }
        }
    }
}

impl NodeVisitor for PythonVisitor {
    fn visit(
        &mut self,
        node: Node,
        source: &[u8],
        scope: &mut ScopeStack,
        out: &mut Extraction,
    ) -> Visit {
        match node.kind() {
            "class_definition" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    self.push_symbol(node, source, scope, out, SymbolKind::Class, name);
                    // Base classes are extend references.
                    if let Some(bases) = node.child_by_field_name("superclasses") {
                        let mut cursor = bases.walk();
                        for base in bases.named_children(&mut cursor) {
                            if base.kind() == "identifier" {
                                if let Some(base_name) = node_text(base, source) {
                                    out.references.push(ReferenceFact {
                                        name: base_name.to_string(),
                                        kind: RefKind::Extend,
                                        span: Span::of(base),
                                    });
                                }
                            }
                        }
                    }
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "function_definition" => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    let kind = if Self::has_property_decorator(node, source) {
                        SymbolKind::Property
                    } else if Self::context_of(node) == Context::ClassBody {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    };
                    self.push_symbol(node, source, scope, out, kind, name);
                    return Visit::ScopedChildren(name.to_string());
                }
                Visit::Children
            }
            "assignment" => {
                match Self::context_of(node) {
                    Context::Module => {
                        for (target, name) in Self::assignment_targets(node, source) {
                            let kind = if Self::is_constant_name(name) {
                                SymbolKind::Constant
                            } else {
                                SymbolKind::Variable
                            };
                            self.push_symbol(target, source, scope, out, kind, name);
                        }
                    }
                    Context::ClassBody => {
                        for (target, name) in Self::assignment_targets(node, source) {
                            self.push_symbol(target, source, scope, out, SymbolKind::Property, name);
                        }
                    }
                    Context::FunctionBody => {}
                }
                Visit::Children
            }
            "call" => {
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
            "import_statement" | "import_from_statement" => {
                Self::collect_import_refs(node, source, out);
                Visit::Skip
            }
            "identifier" => {
                if let Some(parent) = node.parent() {
                    if DECLARATION_KINDS.contains(&parent.kind())
                        && is_name_field_of(parent, node)
                    {
                        return Visit::Skip;
                    }
                    // Base-class identifiers were already emitted as extend
                    // references at the class node.
                    if parent.kind() == "argument_list"
                        && parent
                            .parent()
                            .map(|g| g.kind() == "class_definition")
                            .unwrap_or(false)
                    {
                        return Visit::Skip;
                    }
                }
                if let Some(assignment) = Self::is_assignment_target(node) {
                    // Targets that define symbols are suppressed; local
                    // targets are writes.
                    let defines = assignment.kind() == "assignment"
                        && Self::context_of(assignment) != Context::FunctionBody;
                    if !defines {
                        if let Some(name) = node_text(node, source) {
                            out.references.push(ReferenceFact {
                                name: name.to_string(),
                                kind: RefKind::Write,
                                span: Span::of(node),
                            });
                        }
                    }
                    return Visit::Skip;
                }
                if let Some(name) = node_text(node, source) {
                    out.references.push(ReferenceFact {
                        name: name.to_string(),
                        kind: RefKind::Read,
                        span: Span::of(node),
                    });
                }
                Visit::Skip
            }
            _ => Visit::Children,
        }
    }
}
