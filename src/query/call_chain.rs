//! Call-chain traversal with cycle protection.
//!
//! The call graph is an edge table keyed by symbol ids; traversal builds a
//! tree with a visited set shared across all branches, so a symbol appears
//! at most once in the whole tree and cyclic graphs always terminate.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::store::{Store, SymbolLocation};

/// Default maximum traversal depth.
pub const DEFAULT_CHAIN_DEPTH: usize = 5;

/// Direction of the walk over call edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainDirection {
    /// Follow caller → callee edges.
    Forward,
    /// Follow callee → caller edges.
    Backward,
}

/// One node of the call-chain tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallChainNode {
    pub symbol_id: i64,
    pub name: String,
    pub qualified_name: String,
    pub location: Option<SymbolLocation>,
    /// Depth of this node in the tree; the root is 0.
    pub depth: usize,
    pub children: Vec<CallChainNode>,
}

impl CallChainNode {
    /// Height of the tree rooted here, in edges.
    pub fn height(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.height() + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Build the call chain rooted at `from`.
///
/// Returns None when the root symbol does not exist. Children follow the
/// store's native edge order; a symbol already visited on any branch is not
/// expanded (or re-emitted) again.
pub(super) fn build(
    store: &Store,
    from: i64,
    direction: ChainDirection,
    max_depth: usize,
) -> Result<Option<CallChainNode>> {
    if store.symbol_by_id(from)?.is_none() {
        return Ok(None);
    }
    let mut visited = HashSet::new();
    visited.insert(from);
    let root = expand(store, from, direction, 0, max_depth, &mut visited)?;
    Ok(Some(root))
}

fn expand(
    store: &Store,
    symbol_id: i64,
    direction: ChainDirection,
    depth: usize,
    max_depth: usize,
    visited: &mut HashSet<i64>,
) -> Result<CallChainNode> {
    let symbol = store
        .symbol_by_id(symbol_id)?
        .ok_or_else(|| anyhow::anyhow!("dangling call edge to symbol {}", symbol_id))?;
    let mut node = CallChainNode {
        symbol_id,
        name: symbol.name,
        qualified_name: symbol.qualified_name,
        location: store.symbol_location(symbol_id)?,
        depth,
        children: Vec::new(),
    };

    if depth >= max_depth {
        return Ok(node);
    }

    let edges = match direction {
        ChainDirection::Forward => store.calls_from(symbol_id)?,
        ChainDirection::Backward => store.calls_to(symbol_id)?,
    };
    for edge in edges {
        let next = match direction {
            ChainDirection::Forward => edge.callee_id,
            ChainDirection::Backward => edge.caller_id,
        };
        if !visited.insert(next) {
            continue;
        }
        node.children.push(expand(
            store,
            next,
            direction,
            depth + 1,
            max_depth,
            visited,
        )?);
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{CallFact, Extraction, Span, SymbolFact, SymbolKind};
    use crate::store::FileMeta;

    fn span(start: usize, end: usize) -> Span {
        Span {
            start_line: start,
            start_col: 0,
            end_line: end,
            end_col: 1,
        }
    }

    fn function(name: &str, start: usize, end: usize) -> SymbolFact {
        SymbolFact {
            kind: SymbolKind::Function,
            name: name.to_string(),
            qualified_name: name.to_string(),
            span: span(start, end),
            signature: None,
            exported: true,
        }
    }

    /// a calls b inside a's span; b calls a inside b's span.
    fn cyclic_store() -> Store {
        let mut store = Store::open_in_memory().unwrap();
        let extraction = Extraction {
            symbols: vec![function("a", 1, 5), function("b", 10, 15)],
            calls: vec![
                CallFact {
                    callee: "b".to_string(),
                    span: span(2, 2),
                },
                CallFact {
                    callee: "a".to_string(),
                    span: span(11, 11),
                },
            ],
            references: vec![],
        };
        store
            .apply_file_extraction(
                &FileMeta {
                    path: "cycle.py".to_string(),
                    language: "python".to_string(),
                    content_hash: "h".to_string(),
                    mtime: 0,
                    size: 0,
                },
                &extraction,
            )
            .unwrap();
        store
    }

    #[test]
    fn test_cycle_is_suppressed_by_visited_set() {
        let store = cyclic_store();
        let a = store.symbols_by_name("a", None).unwrap()[0].id;
        let tree = build(&store, a, ChainDirection::Forward, 5).unwrap().unwrap();
        assert_eq!(tree.name, "a");
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "b");
        // b's edge back to a is not re-emitted.
        assert!(tree.children[0].children.is_empty());
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn test_backward_direction() {
        let store = cyclic_store();
        let b = store.symbols_by_name("b", None).unwrap()[0].id;
        let tree = build(&store, b, ChainDirection::Backward, 5).unwrap().unwrap();
        assert_eq!(tree.name, "b");
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "a");
    }

    #[test]
    fn test_depth_limit_bounds_tree() {
        let store = cyclic_store();
        let a = store.symbols_by_name("a", None).unwrap()[0].id;
        let tree = build(&store, a, ChainDirection::Forward, 0).unwrap().unwrap();
        assert!(tree.children.is_empty());
        assert_eq!(tree.depth, 0);
    }

    #[test]
    fn test_missing_root_returns_none() {
        let store = cyclic_store();
        assert!(build(&store, 9999, ChainDirection::Forward, 5)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_node_carries_location() {
        let store = cyclic_store();
        let a = store.symbols_by_name("a", None).unwrap()[0].id;
        let tree = build(&store, a, ChainDirection::Forward, 5).unwrap().unwrap();
        let location = tree.location.unwrap();
        assert_eq!(location.path, "cycle.py");
        assert_eq!(location.span.start_line, 1);
    }
}
