//! Embedding generator client: fills the embeddings table.
//!
//! Embeds symbol summaries, keyed by (symbol, model). A symbol becomes a
//! candidate once it carries a chunk hash with no matching embedding row
//! for the model; after a successful write the stored row's chunk hash
//! matches again and the symbol drops out of the pending set.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{
    http_client, post_with_retry, run_batched, AnnotateFailure, AnnotateReport, RemoteOptions,
};
use crate::store::{pack_vector, Store, SymbolRow};

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Client for the external embedding service.
pub struct EmbeddingGenerator {
    options: RemoteOptions,
}

impl EmbeddingGenerator {
    pub fn new(options: RemoteOptions) -> Self {
        Self { options }
    }

    /// Embed every symbol whose current chunk hash has no embedding for the
    /// configured model.
    ///
    /// Symbols without a summary are skipped (there is nothing to embed
    /// yet). Vectors are normalized to unit length before storage so the
    /// query engine's dot product is a cosine.
    pub fn run(&self, store: &mut Store) -> Result<AnnotateReport> {
        let pending = store.symbols_missing_embedding(&self.options.model)?;
        self.annotate(store, pending)
    }

    fn annotate(&self, store: &mut Store, symbols: Vec<SymbolRow>) -> Result<AnnotateReport> {
        let client = http_client(&self.options)?;
        let url = format!("{}/embed", self.options.endpoint.trim_end_matches('/'));

        let work: Vec<SymbolRow> = symbols
            .into_iter()
            .filter(|s| s.chunk_summary.is_some() && s.chunk_hash.is_some())
            .collect();
        let ids: Vec<i64> = work.iter().map(|symbol| symbol.id).collect();

        let results = run_batched(work, self.options.concurrency, |symbol| {
            let text = symbol.chunk_summary.as_deref().unwrap_or_default();
            let response: EmbedResponse = post_with_retry(
                &client,
                &url,
                &EmbedRequest {
                    text,
                    model: &self.options.model,
                },
                self.options.max_retries,
            )?;
            if response.embedding.is_empty() {
                anyhow::bail!("service returned an empty embedding");
            }
            let vector = normalize(response.embedding);
            let chunk_hash = symbol.chunk_hash.clone().unwrap_or_default();
            Ok((symbol.id, chunk_hash, vector))
        });

        let mut report = AnnotateReport::default();
        for (symbol_id, result) in ids.into_iter().zip(results) {
            match result {
                Ok((id, chunk_hash, vector)) => {
                    store.upsert_embedding(
                        id,
                        &self.options.model,
                        &pack_vector(&vector),
                        &chunk_hash,
                    )?;
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

/// Scale a vector to unit length. Zero vectors pass through unchanged.
fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_produces_unit_length() {
        let vector = normalize(vec![3.0, 4.0]);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        assert_eq!(normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}
