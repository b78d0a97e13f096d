//! Query engine: name resolution, member enumeration, call-chain walking,
//! and semantic search over stored embeddings.
//!
//! All operations are read-only against the store; nothing here suspends
//! once the rows are in memory.

mod call_chain;
mod semantic;

pub use call_chain::{CallChainNode, ChainDirection, DEFAULT_CHAIN_DEPTH};
pub use semantic::SearchHit;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::extract::SymbolKind;
use crate::store::{Store, SymbolLocation, SymbolRow};

/// Optional filters for symbol lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolFilter<'a> {
    /// Restrict to one language tag.
    pub language: Option<&'a str>,
    /// Substring match against the owning file's path.
    pub in_file: Option<&'a str>,
    /// Restrict to one symbol kind.
    pub kind: Option<&'a str>,
}

/// A reference hit with its source location resolved to a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceHit {
    pub symbol_id: i64,
    pub kind: String,
    pub path: String,
    pub span: crate::extract::Span,
}

/// Read-only query surface over a store.
pub struct QueryEngine<'a> {
    store: &'a Store,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// All symbols matching a short name and the given filters.
    ///
    /// Results are ordered lexicographically by qualified name (then id);
    /// there is no relevance scoring.
    pub fn find_symbols(&self, name: &str, filter: SymbolFilter) -> Result<Vec<SymbolRow>> {
        let mut rows = self.store.symbols_by_name(name, filter.language)?;
        if let Some(fragment) = filter.in_file {
            let paths = self.paths_for(&rows)?;
            rows.retain(|row| {
                paths
                    .get(&row.file_id)
                    .map(|p| p.contains(fragment))
                    .unwrap_or(false)
            });
        }
        if let Some(kind) = filter.kind {
            rows.retain(|row| row.kind == kind);
        }
        rows.sort_by(|a, b| {
            a.qualified_name
                .cmp(&b.qualified_name)
                .then(a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    /// Single-match convenience lookup.
    ///
    /// When several rows match, the in-file substring filter is applied
    /// first, then the kind filter, and the first remaining row (in store
    /// order) wins. None when nothing remains.
    pub fn find_symbol(&self, name: &str, filter: SymbolFilter) -> Result<Option<SymbolRow>> {
        let mut rows = self.store.symbols_by_name(name, filter.language)?;
        if rows.len() > 1 {
            if let Some(fragment) = filter.in_file {
                let paths = self.paths_for(&rows)?;
                let narrowed: Vec<SymbolRow> = rows
                    .iter()
                    .filter(|row| {
                        paths
                            .get(&row.file_id)
                            .map(|p| p.contains(fragment))
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect();
                if !narrowed.is_empty() {
                    rows = narrowed;
                }
            }
            if let Some(kind) = filter.kind {
                let narrowed: Vec<SymbolRow> =
                    rows.iter().filter(|row| row.kind == kind).cloned().collect();
                if !narrowed.is_empty() {
                    rows = narrowed;
                }
            }
        } else if let Some(kind) = filter.kind {
            rows.retain(|row| row.kind == kind);
        }
        Ok(rows.into_iter().next())
    }

    /// File and span of a symbol's definition.
    pub fn get_definition(&self, symbol_id: i64) -> Result<Option<SymbolLocation>> {
        self.store.symbol_location(symbol_id)
    }

    /// All references targeting a symbol, with source paths resolved.
    pub fn get_references(&self, symbol_id: i64) -> Result<Vec<ReferenceHit>> {
        let rows = self.store.references_to(symbol_id)?;
        Ok(rows
            .into_iter()
            .map(|(reference, path)| ReferenceHit {
                symbol_id: reference.symbol_id,
                kind: reference.kind,
                path,
                span: reference.span,
            })
            .collect())
    }

    /// Members of a class/interface/struct resolved by short name.
    ///
    /// The owner is resolved first (optionally filtered by language); its
    /// members are all symbols whose qualified name extends the owner's by
    /// one separator and whose kind is method, property, or field.
    ///
    /// For Go an additional pattern pass associates methods with their
    /// receiver struct even when declared in other files: qualified names
    /// containing `Recv.`, `(*Recv).`, or `.Recv.`. The pattern match is a
    /// heuristic and can false-positive on names containing the struct
    /// name; results are deduplicated by symbol id.
    pub fn get_object_properties(
        &self,
        name: &str,
        language: Option<&str>,
    ) -> Result<Vec<SymbolRow>> {
        let owners = self.store.symbols_by_name(name, language)?;
        let Some(owner) = owners.into_iter().find(|row| {
            matches!(
                SymbolKind::parse(&row.kind),
                Some(SymbolKind::Class | SymbolKind::Interface | SymbolKind::Struct)
            )
        }) else {
            return Ok(Vec::new());
        };

        let member_kind = |row: &SymbolRow| {
            matches!(
                SymbolKind::parse(&row.kind),
                Some(SymbolKind::Method | SymbolKind::Property | SymbolKind::Field)
            )
        };

        let mut members: Vec<SymbolRow> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        let mut prefixes = vec![format!("{}.", owner.qualified_name)];
        if owner.language == "rust" {
            // Rust methods join with :: while fields keep the dot.
            prefixes.push(format!("{}::", owner.qualified_name));
        }
        for prefix in prefixes {
            for row in self.store.symbols_with_qualified_prefix(&prefix)? {
                if member_kind(&row) && seen.insert(row.id) {
                    members.push(row);
                }
            }
        }

        if owner.language == "go" {
            let patterns = [
                format!("{}.", owner.name),
                format!("(*{}).", owner.name),
                format!(".{}.", owner.name),
            ];
            for row in self.store.symbols_by_kind("method", Some("go"))? {
                if patterns.iter().any(|p| row.qualified_name.contains(p))
                    && seen.insert(row.id)
                {
                    members.push(row);
                }
            }
        }

        Ok(members)
    }

    /// Walk the call graph from a symbol with cycle protection.
    pub fn build_call_chain(
        &self,
        from: i64,
        direction: ChainDirection,
        max_depth: usize,
    ) -> Result<Option<CallChainNode>> {
        call_chain::build(self.store, from, direction, max_depth)
    }

    /// Rank stored embeddings against a unit-length query vector.
    pub fn semantic_search(
        &self,
        query: &[f32],
        model: &str,
        top_k: usize,
        language: Option<&str>,
        kind: Option<&str>,
        min_similarity: f32,
    ) -> Result<Vec<SearchHit>> {
        semantic::search(self.store, query, model, top_k, language, kind, min_similarity)
    }

    fn paths_for(&self, rows: &[SymbolRow]) -> Result<HashMap<i64, String>> {
        let mut paths = HashMap::new();
        for row in rows {
            if let std::collections::hash_map::Entry::Vacant(entry) = paths.entry(row.file_id) {
                if let Some(file) = self.store.file_by_id(row.file_id)? {
                    entry.insert(file.path);
                }
            }
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extraction, Span, SymbolFact, SymbolKind};
    use crate::store::FileMeta;

    fn span(start: usize, end: usize) -> Span {
        Span {
            start_line: start,
            start_col: 0,
            end_line: end,
            end_col: 0,
        }
    }

    fn fact(kind: SymbolKind, name: &str, qualified: &str) -> SymbolFact {
        SymbolFact {
            kind,
            name: name.to_string(),
            qualified_name: qualified.to_string(),
            span: span(1, 2),
            signature: None,
            exported: true,
        }
    }

    fn meta(path: &str, language: &str) -> FileMeta {
        FileMeta {
            path: path.to_string(),
            language: language.to_string(),
            content_hash: path.to_string(),
            mtime: 0,
            size: 0,
        }
    }

    #[test]
    fn test_find_symbol_filter_priority() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .apply_file_extraction(
                &meta("a.py", "python"),
                &Extraction {
                    symbols: vec![fact(SymbolKind::Function, "run", "run")],
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .apply_file_extraction(
                &meta("b.py", "python"),
                &Extraction {
                    symbols: vec![fact(SymbolKind::Method, "run", "Task.run")],
                    ..Default::default()
                },
            )
            .unwrap();

        let engine = QueryEngine::new(&store);
        // No filters: first row in store order.
        let hit = engine.find_symbol("run", SymbolFilter::default()).unwrap().unwrap();
        assert_eq!(hit.qualified_name, "run");

        // in_file narrows before kind.
        let hit = engine
            .find_symbol(
                "run",
                SymbolFilter {
                    in_file: Some("b.py"),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(hit.qualified_name, "Task.run");

        let hit = engine
            .find_symbol(
                "run",
                SymbolFilter {
                    kind: Some("method"),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(hit.qualified_name, "Task.run");

        assert!(engine
            .find_symbol("missing", SymbolFilter::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_find_symbols_lexicographic_order() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .apply_file_extraction(
                &meta("a.py", "python"),
                &Extraction {
                    symbols: vec![
                        fact(SymbolKind::Method, "run", "Zeta.run"),
                        fact(SymbolKind::Method, "run", "Alpha.run"),
                    ],
                    ..Default::default()
                },
            )
            .unwrap();
        let engine = QueryEngine::new(&store);
        let rows = engine.find_symbols("run", SymbolFilter::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].qualified_name, "Alpha.run");
        assert_eq!(rows[1].qualified_name, "Zeta.run");
    }

    #[test]
    fn test_get_references_resolves_paths() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .apply_file_extraction(
                &meta("lib.py", "python"),
                &Extraction {
                    symbols: vec![fact(SymbolKind::Function, "helper", "helper")],
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .apply_file_extraction(
                &meta("use.py", "python"),
                &Extraction {
                    references: vec![crate::extract::ReferenceFact {
                        name: "helper".to_string(),
                        kind: crate::extract::RefKind::Read,
                        span: span(3, 3),
                    }],
                    ..Default::default()
                },
            )
            .unwrap();

        let engine = QueryEngine::new(&store);
        let target = engine.find_symbol("helper", SymbolFilter::default()).unwrap().unwrap();
        let references = engine.get_references(target.id).unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].path, "use.py");
        assert_eq!(references[0].kind, "read");
        assert_eq!(references[0].span.start_line, 3);
    }

    #[test]
    fn test_object_properties_prefix_and_kinds() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .apply_file_extraction(
                &meta("app.ts", "ts"),
                &Extraction {
                    symbols: vec![
                        fact(SymbolKind::Class, "Calculator", "Calculator"),
                        fact(SymbolKind::Method, "add", "Calculator.add"),
                        fact(SymbolKind::Property, "x", "Calculator.x"),
                        // Nested helper class member is still a member row
                        // by prefix, but a function kind is not.
                        fact(SymbolKind::Function, "helper", "Calculator.helper"),
                        fact(SymbolKind::Class, "CalculatorView", "CalculatorView"),
                    ],
                    ..Default::default()
                },
            )
            .unwrap();
        let engine = QueryEngine::new(&store);
        let members = engine.get_object_properties("Calculator", Some("ts")).unwrap();
        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["add", "x"]);
        assert!(engine.get_object_properties("Missing", None).unwrap().is_empty());
    }

    #[test]
    fn test_object_properties_go_receiver_pass() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .apply_file_extraction(
                &meta("a.go", "go"),
                &Extraction {
                    symbols: vec![fact(SymbolKind::Struct, "Foo", "p.Foo")],
                    ..Default::default()
                },
            )
            .unwrap();
        // Method declared in another file, associated through the
        // receiver-pattern pass.
        store
            .apply_file_extraction(
                &meta("b.go", "go"),
                &Extraction {
                    symbols: vec![fact(SymbolKind::Method, "Bar", "p.(*Foo).Bar")],
                    ..Default::default()
                },
            )
            .unwrap();
        let engine = QueryEngine::new(&store);
        let members = engine.get_object_properties("Foo", Some("go")).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "Bar");
    }
}
