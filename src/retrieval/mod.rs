//! Retrieval adapters
//!
//! Each adapter is an independent search over one external knowledge source
//! (history, tickets, code, issues). The answer pipeline queries all of them
//! for every job; a failing, hanging or panicking adapter contributes zero
//! results and never fails the job.

mod history;
mod nats;

pub use history::HistoryAdapter;
pub use nats::NatsSearchAdapter;

use anyhow::Result;
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Title or identifier (ticket key, file path, issue number)
    #[serde(alias = "identifier")]
    pub title: String,
    pub uri: String,
    #[serde(default)]
    pub snippet: String,
}

/// Search contract. "No results" is `Ok(vec![])`, never an error.
#[async_trait::async_trait]
pub trait SearchAdapter: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>>;

    /// Adapter name; also the citation `source` for its results
    fn name(&self) -> &str;
}

/// Results of one adapter for one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterResults {
    pub adapter: String,
    pub results: Vec<SearchResult>,
    /// The adapter errored, timed out or panicked
    pub failed: bool,
}

/// Query every adapter concurrently, each under its own timeout.
/// Output order follows `adapters`.
pub async fn search_all(
    adapters: &[Arc<dyn SearchAdapter>],
    query: &str,
    top_k: usize,
    timeout: Duration,
) -> Vec<AdapterResults> {
    let calls = adapters
        .iter()
        .map(|adapter| guarded_search(Arc::clone(adapter), query, top_k, timeout));

    join_all(calls).await
}

async fn guarded_search(
    adapter: Arc<dyn SearchAdapter>,
    query: &str,
    top_k: usize,
    timeout: Duration,
) -> AdapterResults {
    let name = adapter.name().to_string();
    let call = AssertUnwindSafe(adapter.search(query, top_k)).catch_unwind();

    let outcome = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(Ok(mut results))) => {
            results.truncate(top_k);
            debug!("Adapter {} returned {} results for '{}'", name, results.len(), query);
            Ok(results)
        }
        Ok(Ok(Err(e))) => Err(format!("error: {:#}", e)),
        Ok(Err(_)) => Err("panicked".to_string()),
        Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
    };

    match outcome {
        Ok(results) => AdapterResults {
            adapter: name,
            results,
            failed: false,
        },
        Err(reason) => {
            warn!("Retrieval adapter {} failed ({}); continuing without it", name, reason);
            AdapterResults {
                adapter: name,
                results: Vec::new(),
                failed: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<SearchResult>);

    #[async_trait::async_trait]
    impl SearchAdapter for Fixed {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchResult>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "tickets"
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl SearchAdapter for Failing {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchResult>> {
            anyhow::bail!("backend unavailable")
        }

        fn name(&self) -> &str {
            "code"
        }
    }

    struct Hanging;

    #[async_trait::async_trait]
    impl SearchAdapter for Hanging {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchResult>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "issues"
        }
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl SearchAdapter for Panicking {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchResult>> {
            panic!("adapter bug")
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn hit(title: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            uri: format!("https://tracker.example/{}", title),
            snippet: String::new(),
        }
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_adapter() {
        let adapters: Vec<Arc<dyn SearchAdapter>> = vec![
            Arc::new(Fixed(vec![hit("PROJ-1"), hit("PROJ-2"), hit("PROJ-3")])),
            Arc::new(Failing),
            Arc::new(Hanging),
            Arc::new(Panicking),
        ];

        let results = search_all(&adapters, "PROJ", 2, Duration::from_millis(50)).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].adapter, "tickets");
        assert_eq!(results[0].results.len(), 2);
        assert!(!results[0].failed);
        for failed in &results[1..] {
            assert!(failed.failed, "{} should be marked failed", failed.adapter);
            assert!(failed.results.is_empty());
        }
    }

    #[test]
    fn test_search_result_accepts_identifier_alias() {
        let json = r#"{"identifier": "src/lib.rs", "uri": "git://repo/src/lib.rs"}"#;
        let result: SearchResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.title, "src/lib.rs");
        assert!(result.snippet.is_empty());
    }
}
