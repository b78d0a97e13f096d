//! External collaborators: the summarizer and embedding generator.
//!
//! Both talk to an HTTP service and write annotation data back onto symbol
//! records — the summary columns and the embeddings table. The query engine
//! only ever reads those columns; everything here is a producer.
//!
//! Requests carry a per-request timeout and retry with linear-growth
//! backoff (attempt i waits i seconds). Batches fan out up to `concurrency`
//! requests at a time and wait for the whole group before starting the
//! next; a symbol that exhausts its retries is reported in the batch result
//! without aborting the rest.

mod embedder;
mod summarizer;

pub use embedder::EmbeddingGenerator;
pub use summarizer::Summarizer;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::extract::Span;

/// Connection options shared by both collaborators.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// Base URL of the service, e.g. `http://localhost:8700`.
    pub endpoint: String,
    /// Model identifier sent with each request (and keying embeddings).
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Requests in flight per batch group.
    pub concurrency: usize,
}

impl RemoteOptions {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            timeout_secs: 30,
            max_retries: 3,
            concurrency: 5,
        }
    }
}

/// Per-symbol failure from a batch run.
#[derive(Debug, Clone)]
pub struct AnnotateFailure {
    pub symbol_id: i64,
    pub error: String,
}

/// Outcome of one batch run over pending symbols.
#[derive(Debug, Clone, Default)]
pub struct AnnotateReport {
    pub succeeded: usize,
    pub failures: Vec<AnnotateFailure>,
}

/// Build the blocking HTTP client with the configured timeout.
pub(crate) fn http_client(options: &RemoteOptions) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(options.timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

/// POST a JSON body and parse a JSON response, retrying on failure.
///
/// Attempt i (1-based) sleeps i seconds before retrying. Non-2xx statuses,
/// transport errors, and malformed responses all count as failures.
pub(crate) fn post_with_retry<B: Serialize, T: DeserializeOwned>(
    client: &reqwest::blocking::Client,
    url: &str,
    body: &B,
    max_retries: u32,
) -> Result<T> {
    let mut attempt = 0u32;
    loop {
        match post_once(client, url, body) {
            Ok(response) => return Ok(response),
            Err(e) => {
                if attempt >= max_retries {
                    return Err(e.context(format!(
                        "request to {} failed after {} retries",
                        url, max_retries
                    )));
                }
                attempt += 1;
                std::thread::sleep(Duration::from_secs(attempt as u64));
            }
        }
    }
}

fn post_once<B: Serialize, T: DeserializeOwned>(
    client: &reqwest::blocking::Client,
    url: &str,
    body: &B,
) -> Result<T> {
    let response = client.post(url).json(body).send()?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().unwrap_or_default();
        anyhow::bail!("{} returned {}: {}", url, status, text);
    }
    Ok(response.json::<T>()?)
}

/// Read the source slice a symbol's span covers, by whole lines.
///
/// This is the text that gets hashed (the chunk hash) and summarized.
pub(crate) fn read_symbol_slice(root: &Path, rel_path: &str, span: Span) -> Result<String> {
    let path = root.join(rel_path);
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let lines: Vec<&str> = contents.lines().collect();
    if span.start_line == 0 || span.start_line > lines.len() {
        anyhow::bail!(
            "span {}..{} out of range for {} ({} lines)",
            span.start_line,
            span.end_line,
            rel_path,
            lines.len()
        );
    }
    let end = span.end_line.min(lines.len());
    Ok(lines[span.start_line - 1..end].join("\n"))
}

/// Run a fallible job over items, `concurrency` at a time.
///
/// Each group is spawned as scoped threads and joined as a whole before the
/// next group starts. Results come back in input order.
pub(crate) fn run_batched<I, T, F>(items: Vec<I>, concurrency: usize, job: F) -> Vec<Result<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> Result<T> + Sync,
{
    let concurrency = concurrency.max(1);
    let mut results: Vec<Result<T>> = Vec::with_capacity(items.len());
    for group in items.chunks(concurrency) {
        let mut group_results: Vec<Option<Result<T>>> = Vec::new();
        group_results.resize_with(group.len(), || None);
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(group.len());
            for item in group {
                handles.push(scope.spawn(|| job(item)));
            }
            for (slot, handle) in group_results.iter_mut().zip(handles) {
                *slot = Some(
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("worker panicked"))),
                );
            }
        });
        results.extend(group_results.into_iter().flatten());
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_run_batched_preserves_order() {
        let items: Vec<usize> = (0..13).collect();
        let results = run_batched(items, 5, |i| Ok::<usize, anyhow::Error>(i * 2));
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..13).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_batched_limits_group_size() {
        let peak = AtomicUsize::new(0);
        let active = AtomicUsize::new(0);
        let items: Vec<usize> = (0..20).collect();
        run_batched(items, 4, |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok::<(), anyhow::Error>(())
        });
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[test]
    fn test_run_batched_keeps_errors_in_place() {
        let items = vec![1, 2, 3];
        let results = run_batched(items, 2, |i| {
            if *i == 2 {
                anyhow::bail!("boom")
            } else {
                Ok(*i)
            }
        });
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_read_symbol_slice() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("a.py"),
            "line1\nline2\nline3\nline4\n",
        )
        .unwrap();
        let span = Span {
            start_line: 2,
            start_col: 0,
            end_line: 3,
            end_col: 0,
        };
        let slice = read_symbol_slice(temp_dir.path(), "a.py", span).unwrap();
        assert_eq!(slice, "line2\nline3");
    }

    #[test]
    fn test_read_symbol_slice_out_of_range() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.py"), "only\n").unwrap();
        let span = Span {
            start_line: 5,
            start_col: 0,
            end_line: 9,
            end_col: 0,
        };
        assert!(read_symbol_slice(temp_dir.path(), "a.py", span).is_err());
    }
}
