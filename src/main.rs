//! Lodestone CLI - queryable multi-language code index.
//!
//! Usage: lodestone <command> [arguments]

mod cli;

use anyhow::Result;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use cli::Command;
use lodestone::query::{QueryEngine, SymbolFilter};
use lodestone::{IndexConfig, Indexer, Store, WatchPipeline};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "--help" || args[0] == "help" {
        cli::print_usage();
        return ExitCode::from(2);
    }

    let command = match cli::parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            cli::print_usage();
            return ExitCode::from(2);
        }
    };

    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Index {
            root,
            db,
            include,
            exclude,
            languages,
            rebuild,
        } => {
            let mut config = IndexConfig::new(root, db);
            if !include.is_empty() {
                config.include = include;
            }
            config.exclude = exclude;
            config.languages = languages;
            let mut indexer = Indexer::new(config)?;
            let summary = if rebuild {
                indexer.rebuild(None)?
            } else {
                indexer.index_all(None)?
            };
            for diagnostic in &summary.diagnostics {
                if diagnostic.is_error() {
                    eprintln!("{}", diagnostic);
                }
            }
            println!(
                "{}",
                serde_json::json!({
                    "indexed": summary.indexed,
                    "unchanged": summary.unchanged,
                    "errors": summary.diagnostics.iter().filter(|d| d.is_error()).count(),
                })
            );
            indexer.close()?;
            Ok(())
        }
        Command::Watch {
            root,
            db,
            debounce_ms,
            batch_minutes,
            min_change_lines,
            scan_initial,
        } => {
            let mut config = IndexConfig::new(root, db);
            if let Some(ms) = debounce_ms {
                config.debounce_ms = ms;
            }
            if let Some(minutes) = batch_minutes {
                config.batch_interval_minutes = minutes;
            }
            if let Some(lines) = min_change_lines {
                config.min_change_lines = lines;
            }
            let mut indexer = Indexer::new(config)?;
            if scan_initial {
                let summary = indexer.index_all(None)?;
                eprintln!(
                    "Initial scan: {} indexed, {} unchanged",
                    summary.indexed, summary.unchanged
                );
            }
            let mut pipeline = WatchPipeline::new(indexer)?;
            eprintln!("Watching for changes (Ctrl-C to stop)...");
            // Runs until the process is killed; pending paths are flushed
            // when the shutdown flag is set by an embedding application.
            let shutdown = Arc::new(AtomicBool::new(false));
            pipeline.run(shutdown)
        }
        Command::Find {
            db,
            name,
            language,
            in_file,
            kind,
            first,
        } => {
            let store = Store::open(db)?;
            let engine = QueryEngine::new(&store);
            let filter = SymbolFilter {
                language: language.as_deref(),
                in_file: in_file.as_deref(),
                kind: kind.as_deref(),
            };
            if first {
                let hit = engine.find_symbol(&name, filter)?;
                println!("{}", serde_json::to_string_pretty(&hit)?);
            } else {
                let hits = engine.find_symbols(&name, filter)?;
                println!("{}", serde_json::to_string_pretty(&hits)?);
            }
            Ok(())
        }
        Command::Members { db, name, language } => {
            let store = Store::open(db)?;
            let engine = QueryEngine::new(&store);
            let members = engine.get_object_properties(&name, language.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&members)?);
            Ok(())
        }
        Command::Chain {
            db,
            symbol_id,
            direction,
            depth,
        } => {
            let store = Store::open(db)?;
            let engine = QueryEngine::new(&store);
            let tree = engine.build_call_chain(symbol_id, direction, depth)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
            Ok(())
        }
        Command::Refs { db, symbol_id } => {
            let store = Store::open(db)?;
            let engine = QueryEngine::new(&store);
            let references = engine.get_references(symbol_id)?;
            println!("{}", serde_json::to_string_pretty(&references)?);
            Ok(())
        }
        Command::Status { db } => {
            let store = Store::open(db)?;
            println!(
                "{}",
                serde_json::json!({
                    "files": store.count_files()?,
                    "symbols": store.count_symbols()?,
                    "calls": store.count_calls()?,
                    "references": store.count_references()?,
                    "embeddings": store.count_embeddings()?,
                })
            );
            Ok(())
        }
        Command::Export { db } => {
            let store = Store::open(db)?;
            println!("{}", store.export_json()?);
            Ok(())
        }
        Command::Version => {
            println!("lodestone {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
