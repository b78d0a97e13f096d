//! Summarizer client: fills the summary columns on symbol records.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use super::{
    http_client, post_with_retry, read_symbol_slice, run_batched, AnnotateFailure,
    AnnotateReport, RemoteOptions,
};
use crate::store::{Store, SymbolRow};

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    code: &'a str,
    language: &'a str,
    symbol: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    summary: String,
    #[serde(default)]
    tokens: i64,
}

/// Client for the external summary service.
pub struct Summarizer {
    options: RemoteOptions,
    root_dir: PathBuf,
}

impl Summarizer {
    pub fn new(root_dir: impl Into<PathBuf>, options: RemoteOptions) -> Self {
        Self {
            options,
            root_dir: root_dir.into(),
        }
    }

    /// Summarize every symbol that lacks a summary.
    ///
    /// For each pending symbol the code slice under its span is read and
    /// hashed; the service response is written to the summary columns
    /// together with that chunk hash. Symbols whose requests exhaust their
    /// retries are reported as failures; the batch keeps going.
    pub fn run(&self, store: &mut Store) -> Result<AnnotateReport> {
        let pending = store.symbols_missing_summary()?;
        self.annotate(store, pending)
    }

    fn annotate(&self, store: &mut Store, symbols: Vec<SymbolRow>) -> Result<AnnotateReport> {
        let client = http_client(&self.options)?;
        let url = format!("{}/summarize", self.options.endpoint.trim_end_matches('/'));

        // Attach each symbol's file path up front; the fan-out threads only
        // do I/O and HTTP, all store writes happen afterwards on this task.
        let mut work: Vec<(SymbolRow, String)> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let Some(location) = store.symbol_location(symbol.id)? else {
                continue;
            };
            work.push((symbol, location.path));
        }

        let ids: Vec<i64> = work.iter().map(|(symbol, _)| symbol.id).collect();
        let results = run_batched(work, self.options.concurrency, |(symbol, path)| {
            let code = read_symbol_slice(&self.root_dir, path, symbol.span)?;
            let chunk_hash = hex::encode(Sha256::digest(code.as_bytes()));
            let response: SummarizeResponse = post_with_retry(
                &client,
                &url,
                &SummarizeRequest {
                    code: &code,
                    language: &symbol.language,
                    symbol: &symbol.qualified_name,
                    model: &self.options.model,
                },
                self.options.max_retries,
            )?;
            Ok((symbol.id, chunk_hash, response))
        });

        let mut report = AnnotateReport::default();
        for (symbol_id, result) in ids.into_iter().zip(results) {
            match result {
                Ok((id, chunk_hash, response)) => {
                    store.update_summary(id, &chunk_hash, &response.summary, response.tokens)?;
                    report.succeeded += 1;
                }
                Err(e) => report.failures.push(AnnotateFailure {
                    symbol_id,
                    error: e.to_string(),
                }),
            }
        }
        Ok(report)
    }
}
