//! Symbol extraction for HTML.
//!
//! HTML has no calls or references; the interesting entities are anchors a
//! front-end references from other languages: `id` attributes (`#id`),
//! class tokens (`.class`), custom elements (tags outside the HTML5
//! whitelist), and embedded script/style blocks. Everything extracted is
//! exported.

use std::collections::HashSet;

use tree_sitter::Node;

use super::{
    node_text, signature_snippet, Extraction, NodeVisitor, ScopeStack, Span, SymbolFact,
    SymbolKind, Visit,
};

/// Standard HTML5 element names. Anything else is treated as a custom
/// element and extracted as a class symbol.
const HTML5_TAGS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo",
    "blockquote", "body", "br", "button", "canvas", "caption", "cite", "code", "col", "colgroup",
    "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt", "em", "embed",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "head", "header", "hgroup", "hr", "html", "i", "iframe", "img", "input", "ins", "kbd",
    "label", "legend", "li", "link", "main", "map", "mark", "menu", "meta", "meter", "nav",
    "noscript", "object", "ol", "optgroup", "option", "output", "p", "picture", "pre", "progress",
    "q", "rp", "rt", "ruby", "s", "samp", "script", "section", "select", "slot", "small",
    "source", "span", "strong", "style", "sub", "summary", "sup", "table", "tbody", "td",
    "template", "textarea", "tfoot", "th", "thead", "time", "title", "tr", "track", "u", "ul",
    "var", "video", "wbr",
];

pub(crate) struct HtmlVisitor {
    /// Qualified names already emitted for this file; repeated class tokens
    /// and tags collapse to their first occurrence.
    seen: HashSet<String>,
}

impl HtmlVisitor {
    pub(crate) fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    fn push_symbol(
        &mut self,
        node: Node,
        source: &[u8],
        out: &mut Extraction,
        kind: SymbolKind,
        name: &str,
        qualified_name: String,
    ) {
        if !self.seen.insert(qualified_name.clone()) {
            return;
        }
        out.symbols.push(SymbolFact {
            kind,
            name: name.to_string(),
            qualified_name,
            span: Span::of(node),
            signature: signature_snippet(node, source),
            exported: true,
        });
    }

    /// Value text of an attribute, unquoted.
    fn attribute_value<'a>(attribute: Node, source: &'a [u8]) -> Option<&'a str> {
        let mut cursor = attribute.walk();
        for child in attribute.named_children(&mut cursor) {
            match child.kind() {
                "attribute_value" => return node_text(child, source),
                "quoted_attribute_value" => {
                    let mut inner = child.walk();
                    if let Some(value) = child
                        .named_children(&mut inner)
                        .find(|c| c.kind() == "attribute_value")
                    {
                        return node_text(value, source);
                    }
                    return None;
                }
                _ => {}
            }
        }
        None
    }

    /// Extract symbols from an element's start tag.
    fn handle_element(&mut self, element: Node, source: &[u8], out: &mut Extraction) {
        let mut cursor = element.walk();
        let Some(tag) = element
            .named_children(&mut cursor)
            .find(|c| matches!(c.kind(), "start_tag" | "self_closing_tag"))
        else {
            return;
        };

        let tag_name = {
            let mut inner = tag.walk();
            let found = tag
                .named_children(&mut inner)
                .find(|c| c.kind() == "tag_name")
                .and_then(|n| node_text(n, source))
                .map(str::to_string);
            found
        };

        if let Some(ref name) = tag_name {
            if !HTML5_TAGS.contains(&name.as_str()) {
                self.push_symbol(element, source, out, SymbolKind::Class, name, name.clone());
            }
        }

        let mut inner = tag.walk();
        for attribute in tag.named_children(&mut inner) {
            if attribute.kind() != "attribute" {
                continue;
            }
            let attr_name = {
                let mut attr_cursor = attribute.walk();
                let found = attribute
                    .named_children(&mut attr_cursor)
                    .find(|c| c.kind() == "attribute_name")
                    .and_then(|n| node_text(n, source));
                found
            };
            match attr_name {
                Some("id") => {
                    if let Some(value) = Self::attribute_value(attribute, source) {
                        if !value.is_empty() {
                            let qualified = format!("#{}", value);
                            self.push_symbol(
                                element,
                                source,
                                out,
                                SymbolKind::Variable,
                                value,
                                qualified,
                            );
                        }
                    }
                }
                Some("class") => {
                    if let Some(value) = Self::attribute_value(attribute, source) {
                        for token in value.split_whitespace() {
                            let qualified = format!(".{}", token);
                            self.push_symbol(
                                element,
                                source,
                                out,
                                SymbolKind::Variable,
                                token,
                                qualified,
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl NodeVisitor for HtmlVisitor {
    fn visit(
        &mut self,
        node: Node,
        source: &[u8],
        _scope: &mut ScopeStack,
        out: &mut Extraction,
    ) -> Visit {
        match node.kind() {
            "element" => {
                self.handle_element(node, source, out);
                Visit::Children
            }
            "script_element" => {
                self.push_symbol(
                    node,
                    source,
                    out,
                    SymbolKind::Module,
                    "script",
                    "script".to_string(),
                );
                Visit::Skip
            }
            "style_element" => {
                self.push_symbol(
                    node,
                    source,
                    out,
                    SymbolKind::Module,
                    "style",
                    "style".to_string(),
                );
                Visit::Skip
            }
            _ => Visit::Children,
        }
    }
}
