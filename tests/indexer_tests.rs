//! End-to-end indexing: incremental skip, cascading deletes, and
//! cross-file name resolution.

use std::path::Path;

use lodestone::query::{QueryEngine, SymbolFilter};
use lodestone::{IndexConfig, Indexer};
use tempfile::TempDir;

fn indexer_for(root: &Path) -> Indexer {
    let db = root.join("index.db");
    let config = IndexConfig::new(root, db);
    Indexer::new(config).unwrap()
}

#[test]
fn test_go_package_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::write(
        root.join("p.go"),
        "package p\ntype Foo struct{ N int }\nfunc (f *Foo) Bar() { Baz() }\nfunc Baz() {}\n",
    )
    .unwrap();

    let mut indexer = indexer_for(root);
    let summary = indexer.index_all(None).unwrap();
    assert_eq!(summary.indexed, 1);

    let store = indexer.store();
    let engine = QueryEngine::new(store);
    for (name, kind) in [
        ("Foo", "struct"),
        ("N", "field"),
        ("Bar", "method"),
        ("Baz", "function"),
    ] {
        let symbol = engine
            .find_symbol(name, SymbolFilter::default())
            .unwrap()
            .unwrap_or_else(|| panic!("missing {}", name));
        assert_eq!(symbol.kind, kind);
        assert!(symbol.exported);
    }

    // The call inside Bar resolved: caller p.Foo.Bar, callee p.Baz.
    let bar = engine.find_symbol("Bar", SymbolFilter::default()).unwrap().unwrap();
    let baz = engine.find_symbol("Baz", SymbolFilter::default()).unwrap().unwrap();
    let outgoing = store.calls_from(bar.id).unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].callee_id, baz.id);
    assert_eq!(bar.qualified_name, "p.Foo.Bar");
    assert_eq!(baz.qualified_name, "p.Baz");
}

#[test]
fn test_incremental_noop_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::write(root.join("a.py"), "def a():\n    b()\n\ndef b():\n    pass\n").unwrap();
    std::fs::write(root.join("b.ts"), "export class C { run() {} }\n").unwrap();

    let mut indexer = indexer_for(root);
    indexer.index_all(None).unwrap();

    let files_before = indexer.store().all_files().unwrap();
    let symbols_before = indexer.store().all_symbols().unwrap();
    let calls_before = indexer.store().all_calls().unwrap();
    let references_before = indexer.store().all_references().unwrap();

    // Nothing on disk changed: the second pass must not touch any row.
    let summary = indexer.index_all(None).unwrap();
    assert_eq!(summary.indexed, 0);
    assert_eq!(summary.unchanged, 2);

    assert_eq!(indexer.store().all_files().unwrap(), files_before);
    assert_eq!(indexer.store().all_symbols().unwrap(), symbols_before);
    assert_eq!(indexer.store().all_calls().unwrap(), calls_before);
    assert_eq!(indexer.store().all_references().unwrap(), references_before);
}

#[test]
fn test_cascade_on_file_deletion() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::write(root.join("lib.py"), "def target():\n    pass\n").unwrap();
    std::fs::write(
        root.join("use.py"),
        "def caller():\n    target()\n",
    )
    .unwrap();

    let mut indexer = indexer_for(root);
    indexer.index_all(None).unwrap();

    let store = indexer.store();
    let engine = QueryEngine::new(store);
    let target = engine
        .find_symbol("target", SymbolFilter::default())
        .unwrap()
        .unwrap();
    assert!(!store.calls_to(target.id).unwrap().is_empty());
    assert!(!engine.get_references(target.id).unwrap().is_empty());

    // Deleting the defining file cascades to its symbols and to every edge
    // touching them, including the edge anchored in use.py.
    std::fs::remove_file(root.join("lib.py")).unwrap();
    indexer.index_file(&root.join("lib.py")).unwrap();

    let store = indexer.store();
    let engine = QueryEngine::new(store);
    assert!(engine
        .find_symbol("target", SymbolFilter::default())
        .unwrap()
        .is_none());
    assert_eq!(store.count_calls().unwrap(), 0);
    assert!(store.symbol_by_id(target.id).unwrap().is_none());
}

#[test]
fn test_cross_file_callee_resolution() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    // Sorted scan order: lib.py is indexed before use.py, so the callee
    // exists when use.py's edges resolve.
    std::fs::write(root.join("lib.py"), "def helper():\n    pass\n").unwrap();
    std::fs::write(root.join("use.py"), "def main():\n    helper()\n").unwrap();

    let mut indexer = indexer_for(root);
    indexer.index_all(None).unwrap();

    let engine = QueryEngine::new(indexer.store());
    let main = engine.find_symbol("main", SymbolFilter::default()).unwrap().unwrap();
    let helper = engine
        .find_symbol("helper", SymbolFilter::default())
        .unwrap()
        .unwrap();
    let outgoing = indexer.store().calls_from(main.id).unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].callee_id, helper.id);
}

#[test]
fn test_first_match_callee_ambiguity() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    // Two files define `helper`; resolution takes the first match by id.
    std::fs::write(root.join("a.py"), "def helper():\n    pass\n").unwrap();
    std::fs::write(root.join("b.py"), "def helper():\n    pass\n").unwrap();
    std::fs::write(root.join("c.py"), "def main():\n    helper()\n").unwrap();

    let mut indexer = indexer_for(root);
    indexer.index_all(None).unwrap();

    let store = indexer.store();
    let engine = QueryEngine::new(store);
    let main = engine.find_symbol("main", SymbolFilter::default()).unwrap().unwrap();
    let helpers = store.symbols_by_name("helper", None).unwrap();
    assert_eq!(helpers.len(), 2);
    let first_id = helpers.iter().map(|s| s.id).min().unwrap();

    let outgoing = store.calls_from(main.id).unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].callee_id, first_id);
}

#[test]
fn test_exclude_glob_is_applied_after_include() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::create_dir_all(root.join("vendor")).unwrap();
    std::fs::write(root.join("src/a.py"), "def a(): pass\n").unwrap();
    std::fs::write(root.join("src/a_test.py"), "def t(): pass\n").unwrap();
    std::fs::write(root.join("vendor/b.py"), "def b(): pass\n").unwrap();

    let db = root.join("index.db");
    let mut config = IndexConfig::new(root, db);
    config.include = vec!["src/**".to_string()];
    config.exclude = vec!["**/*_test.py".to_string()];
    let mut indexer = Indexer::new(config).unwrap();
    indexer.index_all(None).unwrap();

    assert!(indexer.store().file_by_path("src/a.py").unwrap().is_some());
    assert!(indexer.store().file_by_path("src/a_test.py").unwrap().is_none());
    assert!(indexer.store().file_by_path("vendor/b.py").unwrap().is_none());
}

#[test]
fn test_stored_paths_are_root_relative() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("pkg/sub")).unwrap();
    std::fs::write(root.join("pkg/sub/m.py"), "def m(): pass\n").unwrap();

    let mut indexer = indexer_for(root);
    indexer.index_all(None).unwrap();

    let files = indexer.store().all_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "pkg/sub/m.py");
    assert_eq!(files[0].language, "python");
    assert!(files[0].size > 0);
}

#[test]
fn test_progress_callback_reports_totals() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    for name in ["a.py", "b.py", "c.py"] {
        std::fs::write(root.join(name), "x = 1\n").unwrap();
    }

    let mut indexer = indexer_for(root);
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    indexer
        .index_all(Some(&move |current, total| {
            seen_clone.lock().unwrap().push((current, total));
        }))
        .unwrap();
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
}
