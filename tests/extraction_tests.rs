//! Extraction behavior across languages: symbol kinds, qualified names,
//! exported flags, and the definition-vs-reference split.

use lodestone::{extract, ExtractOptions, Extraction, GrammarRegistry, Language, SymbolKind};

fn extract_source(language: Language, source: &str) -> Extraction {
    let mut registry = GrammarRegistry::new(&[]);
    let tree = registry
        .parse(source.as_bytes(), language)
        .unwrap()
        .expect("parser produced no tree");
    extract(language, &tree, source.as_bytes(), &ExtractOptions::default())
}

fn find<'a>(
    extraction: &'a Extraction,
    qualified_name: &str,
) -> &'a lodestone::SymbolFact {
    extraction
        .symbols
        .iter()
        .find(|s| s.qualified_name == qualified_name)
        .unwrap_or_else(|| {
            panic!(
                "no symbol {:?} in {:?}",
                qualified_name,
                extraction
                    .symbols
                    .iter()
                    .map(|s| &s.qualified_name)
                    .collect::<Vec<_>>()
            )
        })
}

#[test]
fn test_ts_class_members() {
    let extraction = extract_source(
        Language::Ts,
        "export class Calculator { add(v: number) { return v; } private x = 0; }",
    );

    let class = find(&extraction, "Calculator");
    assert_eq!(class.kind, SymbolKind::Class);
    assert!(class.exported);
    assert_eq!(class.span.start_line, 1);
    assert_eq!(class.span.end_line, 1);

    let method = find(&extraction, "Calculator.add");
    assert_eq!(method.kind, SymbolKind::Method);
    assert!(!method.exported);
    assert_eq!(method.name, "add");

    let property = find(&extraction, "Calculator.x");
    assert_eq!(property.kind, SymbolKind::Property);
    assert!(!property.exported);
}

#[test]
fn test_ts_interface_and_type_alias() {
    let extraction = extract_source(
        Language::Ts,
        "export interface Shape { area(): number; }\ntype Alias = string;\n",
    );
    let interface = find(&extraction, "Shape");
    assert_eq!(interface.kind, SymbolKind::Interface);
    assert!(interface.exported);

    let alias = find(&extraction, "Alias");
    assert_eq!(alias.kind, SymbolKind::Type);
    assert!(!alias.exported);
}

#[test]
fn test_js_export_flag_requires_export_statement() {
    let extraction = extract_source(
        Language::Js,
        "export function visible() {}\nfunction hidden() {}\nexport const f = () => {};\n",
    );
    assert!(find(&extraction, "visible").exported);
    assert!(!find(&extraction, "hidden").exported);

    let arrow = find(&extraction, "f");
    assert_eq!(arrow.kind, SymbolKind::Function);
    assert!(arrow.exported);
}

#[test]
fn test_js_call_and_reference_extraction() {
    let extraction = extract_source(
        Language::Js,
        "function greet() {}\nfunction main() { greet(); console.log(1); }\n",
    );
    let callees: Vec<&str> = extraction.calls.iter().map(|c| c.callee.as_str()).collect();
    assert!(callees.contains(&"greet"));
    // Member call resolves to the rightmost identifier.
    assert!(callees.contains(&"log"));

    // Every call also produced a call-kind reference.
    assert!(extraction
        .references
        .iter()
        .any(|r| r.name == "greet" && r.kind == lodestone::RefKind::Call));
}

#[test]
fn test_python_dunder_visibility() {
    let extraction = extract_source(
        Language::Python,
        "class A:\n  def __init__(self): pass\n  def _priv(self): pass\n",
    );

    let class = find(&extraction, "A");
    assert_eq!(class.kind, SymbolKind::Class);
    assert!(class.exported);

    let init = find(&extraction, "A.__init__");
    assert_eq!(init.kind, SymbolKind::Method);
    assert!(init.exported, "dunder names stay exported");

    let private = find(&extraction, "A._priv");
    assert_eq!(private.kind, SymbolKind::Method);
    assert!(!private.exported);
}

#[test]
fn test_python_module_level_assignments() {
    let extraction = extract_source(
        Language::Python,
        "MAX_SIZE = 10\ncurrent = None\n\ndef f():\n    local = 1\n",
    );
    assert_eq!(find(&extraction, "MAX_SIZE").kind, SymbolKind::Constant);
    assert_eq!(find(&extraction, "current").kind, SymbolKind::Variable);
    // Locals inside functions are not symbols.
    assert!(!extraction.symbols.iter().any(|s| s.name == "local"));
}

#[test]
fn test_python_property_decorator_and_class_attribute() {
    let extraction = extract_source(
        Language::Python,
        "class Config:\n  retries = 3\n  @property\n  def timeout(self):\n    return 30\n",
    );
    assert_eq!(find(&extraction, "Config.retries").kind, SymbolKind::Property);
    assert_eq!(find(&extraction, "Config.timeout").kind, SymbolKind::Property);
}

#[test]
fn test_rust_visibility_and_impl_methods() {
    let extraction = extract_source(
        Language::Rust,
        "pub fn visible() {}\nfn hidden() {}\npub struct Config { pub path: String, timeout: u32 }\nimpl Config {\n    pub fn load() -> u32 { 0 }\n}\n",
    );

    assert!(find(&extraction, "visible").exported);
    assert!(!find(&extraction, "hidden").exported);

    let config = find(&extraction, "Config");
    assert_eq!(config.kind, SymbolKind::Struct);
    assert!(config.exported);

    // Struct fields join with a dot and keep their own visibility.
    let path = find(&extraction, "Config.path");
    assert_eq!(path.kind, SymbolKind::Field);
    assert!(path.exported);
    assert!(!find(&extraction, "Config.timeout").exported);

    // Impl methods are qualified under the impl type with ::.
    let load = find(&extraction, "Config::load");
    assert_eq!(load.kind, SymbolKind::Method);
    assert!(load.exported);
}

#[test]
fn test_rust_modules_and_items() {
    let extraction = extract_source(
        Language::Rust,
        "mod outer {\n    pub const LIMIT: u32 = 5;\n    pub static STATE: u32 = 0;\n    pub enum Kind { A }\n    pub trait Runner {\n        fn run(&self);\n    }\n}\n",
    );
    assert_eq!(find(&extraction, "outer").kind, SymbolKind::Module);
    assert_eq!(find(&extraction, "outer::LIMIT").kind, SymbolKind::Constant);
    assert_eq!(find(&extraction, "outer::STATE").kind, SymbolKind::Variable);
    assert_eq!(find(&extraction, "outer::Kind").kind, SymbolKind::Type);
    assert_eq!(find(&extraction, "outer::Runner").kind, SymbolKind::Interface);
    assert_eq!(
        find(&extraction, "outer::Runner::run").kind,
        SymbolKind::Method
    );
}

#[test]
fn test_java_package_scope_and_visibility() {
    let extraction = extract_source(
        Language::Java,
        "package com.x;\npublic class Service {\n  private int count;\n  public Service() {}\n  public void start() {}\n  void stop() {}\n}\n",
    );

    let class = find(&extraction, "com.x.Service");
    assert_eq!(class.kind, SymbolKind::Class);
    assert!(class.exported);

    // The constructor keeps the class's short name.
    let constructor = find(&extraction, "com.x.Service.Service");
    assert_eq!(constructor.kind, SymbolKind::Method);
    assert!(constructor.exported);

    assert!(find(&extraction, "com.x.Service.start").exported);
    assert!(!find(&extraction, "com.x.Service.stop").exported);

    let count = find(&extraction, "com.x.Service.count");
    assert_eq!(count.kind, SymbolKind::Field);
    assert!(!count.exported);
}

#[test]
fn test_java_interface_members_always_exported() {
    let extraction = extract_source(
        Language::Java,
        "package com.x;\npublic interface Api {\n  int LIMIT = 10;\n  void call();\n}\n",
    );
    let interface = find(&extraction, "com.x.Api");
    assert_eq!(interface.kind, SymbolKind::Interface);

    // Interface fields become constants; members are implicitly public.
    let limit = find(&extraction, "com.x.Api.LIMIT");
    assert_eq!(limit.kind, SymbolKind::Constant);
    assert!(limit.exported);

    let call = find(&extraction, "com.x.Api.call");
    assert_eq!(call.kind, SymbolKind::Method);
    assert!(call.exported);
}

#[test]
fn test_html_entities() {
    let extraction = extract_source(
        Language::Html,
        "<div id=\"app\" class=\"layout dark\"></div>\n<my-widget></my-widget>\n<script>var x = 1;</script>\n",
    );

    let app = find(&extraction, "#app");
    assert_eq!(app.kind, SymbolKind::Variable);
    assert_eq!(app.name, "app");

    assert_eq!(find(&extraction, ".layout").kind, SymbolKind::Variable);
    assert_eq!(find(&extraction, ".dark").kind, SymbolKind::Variable);
    assert_eq!(find(&extraction, "my-widget").kind, SymbolKind::Class);
    assert_eq!(find(&extraction, "script").kind, SymbolKind::Module);

    // Everything extracted from HTML is exported.
    assert!(extraction.symbols.iter().all(|s| s.exported));
    // HTML produces no calls.
    assert!(extraction.calls.is_empty());
}

#[test]
fn test_deterministic_extraction() {
    let source = "class A:\n  def run(self):\n    helper()\n\ndef helper():\n  pass\n";
    let first = extract_source(Language::Python, source);
    let second = extract_source(Language::Python, source);
    assert_eq!(first, second);
}

#[test]
fn test_span_containment() {
    let source = "def a():\n    pass\n\nclass B:\n    def c(self):\n        pass\n";
    let extraction = extract_source(Language::Python, source);
    let line_count = source.lines().count();
    assert!(!extraction.symbols.is_empty());
    for symbol in &extraction.symbols {
        assert!(symbol.span.start_line >= 1);
        assert!(symbol.span.start_line <= symbol.span.end_line);
        assert!(symbol.span.end_line <= line_count, "{:?}", symbol);
    }
}

#[test]
fn test_definition_name_is_not_a_reference() {
    let extraction = extract_source(Language::Python, "def foo():\n    foo()\n");
    let symbol = find(&extraction, "foo");

    // The declared name position produces no reference; the call site does.
    assert!(!extraction
        .references
        .iter()
        .any(|r| r.name == "foo" && r.span.start_line == symbol.span.start_line
            && r.kind != lodestone::RefKind::Call));
    assert!(extraction
        .references
        .iter()
        .any(|r| r.name == "foo" && r.span.start_line == 2));
}

#[test]
fn test_qualified_names_distinct_for_same_short_name() {
    let extraction = extract_source(
        Language::Python,
        "class A:\n  def run(self): pass\n\nclass B:\n  def run(self): pass\n",
    );
    let runs: Vec<&String> = extraction
        .symbols
        .iter()
        .filter(|s| s.name == "run")
        .map(|s| &s.qualified_name)
        .collect();
    assert_eq!(runs.len(), 2);
    assert_ne!(runs[0], runs[1]);
}

#[test]
fn test_write_reference_promotion() {
    let extraction = extract_source(
        Language::Python,
        "counter = 0\n\ndef bump():\n    counter = 1\n    print(counter)\n",
    );
    // Local rebind inside the function is a write, the print argument a read.
    assert!(extraction
        .references
        .iter()
        .any(|r| r.name == "counter" && r.kind == lodestone::RefKind::Write));
    assert!(extraction
        .references
        .iter()
        .any(|r| r.name == "counter" && r.kind == lodestone::RefKind::Read));
}

#[test]
fn test_signature_is_bounded() {
    let long_line = format!("def f():\n    return {}\n", "x".repeat(400));
    let extraction = extract_source(Language::Python, &long_line);
    let symbol = find(&extraction, "f");
    let signature = symbol.signature.as_ref().unwrap();
    assert!(signature.len() <= 200);
    assert!(signature.starts_with("def f()"));
}

#[test]
fn test_ts_import_export_references() {
    let extraction = extract_source(
        Language::Ts,
        "import { helper } from './lib';\nexport { helper };\n",
    );
    assert!(extraction
        .references
        .iter()
        .any(|r| r.name == "helper" && r.kind == lodestone::RefKind::Import));
    assert!(extraction
        .references
        .iter()
        .any(|r| r.name == "helper" && r.kind == lodestone::RefKind::Export));
}

#[test]
fn test_ts_heritage_references() {
    let extraction = extract_source(
        Language::Ts,
        "interface Base {}\nclass Impl extends Object implements Base {}\n",
    );
    assert!(extraction
        .references
        .iter()
        .any(|r| r.name == "Object" && r.kind == lodestone::RefKind::Extend));
    assert!(extraction
        .references
        .iter()
        .any(|r| r.name == "Base" && r.kind == lodestone::RefKind::Implement));
}

#[test]
fn test_empty_source_yields_empty_extraction() {
    for language in lodestone::ALL_LANGUAGES {
        let extraction = extract_source(language, "");
        assert!(extraction.is_empty(), "{:?} not empty", language);
    }
}
