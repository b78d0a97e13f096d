//! CLI argument parsing for Lodestone.
//!
//! Hand-rolled flag parsing; the CLI is a thin shell over the library and
//! carries no indexing logic of its own.

use anyhow::Result;
use std::path::PathBuf;

use lodestone::query::ChainDirection;
use lodestone::Language;

pub fn print_usage() {
    eprintln!("Lodestone - queryable multi-language code index");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  lodestone index --root <DIR> --db <FILE> [--include <GLOB>]... [--exclude <GLOB>]... [--lang <TAG>]...");
    eprintln!("  lodestone rebuild --root <DIR> --db <FILE> [--include <GLOB>]... [--exclude <GLOB>]... [--lang <TAG>]...");
    eprintln!("  lodestone watch --root <DIR> --db <FILE> [--debounce-ms <N>] [--batch-minutes <N>] [--min-change-lines <N>] [--scan-initial]");
    eprintln!("  lodestone find --db <FILE> --name <NAME> [--lang <TAG>] [--file <SUBSTR>] [--kind <KIND>] [--first]");
    eprintln!("  lodestone members --db <FILE> --name <NAME> [--lang <TAG>]");
    eprintln!("  lodestone chain --db <FILE> --symbol-id <ID> [--direction <forward|backward>] [--depth <N>]");
    eprintln!("  lodestone refs --db <FILE> --symbol-id <ID>");
    eprintln!("  lodestone status --db <FILE>");
    eprintln!("  lodestone export --db <FILE>");
    eprintln!("  lodestone version");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  index    Scan the root and index changed files");
    eprintln!("  rebuild  Clear the store, re-index everything, compact");
    eprintln!("  watch    Index live as files change");
    eprintln!("  find     Find symbols by short name");
    eprintln!("  members  List methods/properties/fields of a type");
    eprintln!("  chain    Walk the call graph from a symbol");
    eprintln!("  refs     List references to a symbol");
    eprintln!("  status   Show store counts");
    eprintln!("  export   Dump the store as JSON");
}

/// Parsed CLI command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Index {
        root: PathBuf,
        db: PathBuf,
        include: Vec<String>,
        exclude: Vec<String>,
        languages: Vec<Language>,
        rebuild: bool,
    },
    Watch {
        root: PathBuf,
        db: PathBuf,
        debounce_ms: Option<u64>,
        batch_minutes: Option<u64>,
        min_change_lines: Option<usize>,
        scan_initial: bool,
    },
    Find {
        db: PathBuf,
        name: String,
        language: Option<String>,
        in_file: Option<String>,
        kind: Option<String>,
        first: bool,
    },
    Members {
        db: PathBuf,
        name: String,
        language: Option<String>,
    },
    Chain {
        db: PathBuf,
        symbol_id: i64,
        direction: ChainDirection,
        depth: usize,
    },
    Refs {
        db: PathBuf,
        symbol_id: i64,
    },
    Status {
        db: PathBuf,
    },
    Export {
        db: PathBuf,
    },
    Version,
}

/// Parse process arguments (without the program name).
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(command) = args.first() else {
        anyhow::bail!("missing command");
    };
    let rest = &args[1..];
    match command.as_str() {
        "index" | "rebuild" => {
            let mut root = None;
            let mut db = None;
            let mut include = Vec::new();
            let mut exclude = Vec::new();
            let mut languages = Vec::new();
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--root" => root = Some(PathBuf::from(take_value(rest, &mut i)?)),
                    "--db" => db = Some(PathBuf::from(take_value(rest, &mut i)?)),
                    "--include" => include.push(take_value(rest, &mut i)?),
                    "--exclude" => exclude.push(take_value(rest, &mut i)?),
                    "--lang" => {
                        let tag = take_value(rest, &mut i)?;
                        let language = Language::from_tag(&tag)
                            .ok_or_else(|| anyhow::anyhow!("language unsupported: {}", tag))?;
                        languages.push(language);
                    }
                    other => anyhow::bail!("unknown flag: {}", other),
                }
                i += 1;
            }
            Ok(Command::Index {
                root: root.ok_or_else(|| anyhow::anyhow!("--root is required"))?,
                db: db.ok_or_else(|| anyhow::anyhow!("--db is required"))?,
                include,
                exclude,
                languages,
                rebuild: command == "rebuild",
            })
        }
        "watch" => {
            let mut root = None;
            let mut db = None;
            let mut debounce_ms = None;
            let mut batch_minutes = None;
            let mut min_change_lines = None;
            let mut scan_initial = false;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--root" => root = Some(PathBuf::from(take_value(rest, &mut i)?)),
                    "--db" => db = Some(PathBuf::from(take_value(rest, &mut i)?)),
                    "--debounce-ms" => debounce_ms = Some(take_value(rest, &mut i)?.parse()?),
                    "--batch-minutes" => batch_minutes = Some(take_value(rest, &mut i)?.parse()?),
                    "--min-change-lines" => {
                        min_change_lines = Some(take_value(rest, &mut i)?.parse()?)
                    }
                    "--scan-initial" => scan_initial = true,
                    other => anyhow::bail!("unknown flag: {}", other),
                }
                i += 1;
            }
            Ok(Command::Watch {
                root: root.ok_or_else(|| anyhow::anyhow!("--root is required"))?,
                db: db.ok_or_else(|| anyhow::anyhow!("--db is required"))?,
                debounce_ms,
                batch_minutes,
                min_change_lines,
                scan_initial,
            })
        }
        "find" => {
            let mut db = None;
            let mut name = None;
            let mut language = None;
            let mut in_file = None;
            let mut kind = None;
            let mut first = false;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--db" => db = Some(PathBuf::from(take_value(rest, &mut i)?)),
                    "--name" => name = Some(take_value(rest, &mut i)?),
                    "--lang" => language = Some(take_value(rest, &mut i)?),
                    "--file" => in_file = Some(take_value(rest, &mut i)?),
                    "--kind" => kind = Some(take_value(rest, &mut i)?),
                    "--first" => first = true,
                    other => anyhow::bail!("unknown flag: {}", other),
                }
                i += 1;
            }
            Ok(Command::Find {
                db: db.ok_or_else(|| anyhow::anyhow!("--db is required"))?,
                name: name.ok_or_else(|| anyhow::anyhow!("--name is required"))?,
                language,
                in_file,
                kind,
                first,
            })
        }
        "members" => {
            let mut db = None;
            let mut name = None;
            let mut language = None;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--db" => db = Some(PathBuf::from(take_value(rest, &mut i)?)),
                    "--name" => name = Some(take_value(rest, &mut i)?),
                    "--lang" => language = Some(take_value(rest, &mut i)?),
                    other => anyhow::bail!("unknown flag: {}", other),
                }
                i += 1;
            }
            Ok(Command::Members {
                db: db.ok_or_else(|| anyhow::anyhow!("--db is required"))?,
                name: name.ok_or_else(|| anyhow::anyhow!("--name is required"))?,
                language,
            })
        }
        "chain" => {
            let mut db = None;
            let mut symbol_id = None;
            let mut direction = ChainDirection::Forward;
            let mut depth = lodestone::DEFAULT_CHAIN_DEPTH;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--db" => db = Some(PathBuf::from(take_value(rest, &mut i)?)),
                    "--symbol-id" => symbol_id = Some(take_value(rest, &mut i)?.parse()?),
                    "--direction" => {
                        direction = match take_value(rest, &mut i)?.as_str() {
                            "forward" => ChainDirection::Forward,
                            "backward" => ChainDirection::Backward,
                            other => anyhow::bail!("invalid direction: {}", other),
                        }
                    }
                    "--depth" => depth = take_value(rest, &mut i)?.parse()?,
                    other => anyhow::bail!("unknown flag: {}", other),
                }
                i += 1;
            }
            Ok(Command::Chain {
                db: db.ok_or_else(|| anyhow::anyhow!("--db is required"))?,
                symbol_id: symbol_id.ok_or_else(|| anyhow::anyhow!("--symbol-id is required"))?,
                direction,
                depth,
            })
        }
        "refs" => {
            let mut db = None;
            let mut symbol_id = None;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--db" => db = Some(PathBuf::from(take_value(rest, &mut i)?)),
                    "--symbol-id" => symbol_id = Some(take_value(rest, &mut i)?.parse()?),
                    other => anyhow::bail!("unknown flag: {}", other),
                }
                i += 1;
            }
            Ok(Command::Refs {
                db: db.ok_or_else(|| anyhow::anyhow!("--db is required"))?,
                symbol_id: symbol_id.ok_or_else(|| anyhow::anyhow!("--symbol-id is required"))?,
            })
        }
        "status" | "export" => {
            let mut db = None;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--db" => db = Some(PathBuf::from(take_value(rest, &mut i)?)),
                    other => anyhow::bail!("unknown flag: {}", other),
                }
                i += 1;
            }
            let db = db.ok_or_else(|| anyhow::anyhow!("--db is required"))?;
            Ok(if command == "status" {
                Command::Status { db }
            } else {
                Command::Export { db }
            })
        }
        "version" | "--version" => Ok(Command::Version),
        other => anyhow::bail!("unknown command: {}", other),
    }
}

fn take_value(args: &[String], i: &mut usize) -> Result<String> {
    let flag = args[*i].clone();
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("{} requires a value", flag))
}
