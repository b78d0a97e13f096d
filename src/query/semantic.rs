//! Semantic search: cosine ranking of stored embeddings.
//!
//! Stored vectors and the query are unit-length, so the dot product is the
//! cosine similarity; it is mapped from [-1, 1] to [0, 1] before the
//! minimum-similarity cut.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::store::{Store, SymbolLocation, SymbolRow};

/// One semantic-search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub symbol: SymbolRow,
    pub location: Option<SymbolLocation>,
    /// Similarity in [0, 1].
    pub similarity: f32,
}

/// Rank all embeddings of `model` against the query vector.
///
/// Candidates whose dimension differs from the query are ignored. Survivors
/// of the `min_similarity` cut are sorted by descending similarity and the
/// first `top_k` returned with symbol and location attached.
pub(super) fn search(
    store: &Store,
    query: &[f32],
    model: &str,
    top_k: usize,
    language: Option<&str>,
    kind: Option<&str>,
    min_similarity: f32,
) -> Result<Vec<SearchHit>> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let candidates = store.embeddings_for_model(model, language, kind)?;
    let mut hits: Vec<SearchHit> = Vec::new();
    for (embedding, symbol) in candidates {
        if embedding.dim as usize != query.len() {
            continue;
        }
        let stored = embedding.decode();
        let dot: f32 = stored.iter().zip(query.iter()).map(|(a, b)| a * b).sum();
        let similarity = (dot + 1.0) / 2.0;
        if similarity < min_similarity {
            continue;
        }
        let location = store.symbol_location(symbol.id)?;
        hits.push(SearchHit {
            symbol,
            location,
            similarity,
        });
    }
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extraction, Span, SymbolFact, SymbolKind};
    use crate::store::{pack_vector, FileMeta};

    fn store_with_embeddings() -> Store {
        let mut store = Store::open_in_memory().unwrap();
        let symbols = ["east", "north", "diagonal"]
            .iter()
            .map(|name| SymbolFact {
                kind: SymbolKind::Function,
                name: name.to_string(),
                qualified_name: name.to_string(),
                span: Span {
                    start_line: 1,
                    start_col: 0,
                    end_line: 1,
                    end_col: 10,
                },
                signature: None,
                exported: true,
            })
            .collect();
        store
            .apply_file_extraction(
                &FileMeta {
                    path: "vec.py".to_string(),
                    language: "python".to_string(),
                    content_hash: "h".to_string(),
                    mtime: 0,
                    size: 0,
                },
                &Extraction {
                    symbols,
                    ..Default::default()
                },
            )
            .unwrap();

        let vectors = [
            ("east", vec![1.0f32, 0.0]),
            ("north", vec![0.0f32, 1.0]),
            ("diagonal", vec![0.707f32, 0.707]),
        ];
        for (name, vector) in vectors {
            let id = store.symbols_by_name(name, None).unwrap()[0].id;
            store
                .upsert_embedding(id, "m", &pack_vector(&vector), "c")
                .unwrap();
        }
        store
    }

    #[test]
    fn test_ordering_and_mapping() {
        let store = store_with_embeddings();
        let hits = search(&store, &[1.0, 0.0], "m", 3, None, None, 0.0).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].symbol.name, "east");
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].symbol.name, "diagonal");
        // cos 0.707 maps to (0.707 + 1) / 2.
        assert!((hits[1].similarity - 0.8535).abs() < 1e-3);
        assert_eq!(hits[2].symbol.name, "north");
        assert!((hits[2].similarity - 0.5).abs() < 1e-6);
        // Non-increasing similarity, all within [0, 1].
        for window in hits.windows(2) {
            assert!(window[0].similarity >= window[1].similarity);
        }
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.similarity));
        }
    }

    #[test]
    fn test_min_similarity_cut() {
        let store = store_with_embeddings();
        let hits = search(&store, &[1.0, 0.0], "m", 3, None, None, 0.8).unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.symbol.name.as_str()).collect();
        assert_eq!(names, vec!["east", "diagonal"]);
    }

    #[test]
    fn test_top_k_truncation() {
        let store = store_with_embeddings();
        let hits = search(&store, &[1.0, 0.0], "m", 1, None, None, 0.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol.name, "east");
    }

    #[test]
    fn test_dimension_mismatch_ignored() {
        let store = store_with_embeddings();
        let hits = search(&store, &[1.0, 0.0, 0.0], "m", 3, None, None, 0.0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_unknown_model_is_empty() {
        let store = store_with_embeddings();
        let hits = search(&store, &[1.0, 0.0], "other", 3, None, None, 0.0).unwrap();
        assert!(hits.is_empty());
    }
}
