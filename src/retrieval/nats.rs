use anyhow::{Context, Result};
use serde::Serialize;

use super::{SearchAdapter, SearchResult};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

/// Search backend (tickets, code, issues) reachable over NATS request/reply.
/// The reply payload is a JSON array of `SearchResult`.
pub struct NatsSearchAdapter {
    name: String,
    subject: String,
    client: async_nats::Client,
}

impl NatsSearchAdapter {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, client: async_nats::Client) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl SearchAdapter for NatsSearchAdapter {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let payload = serde_json::to_vec(&SearchRequest { query, top_k })?;

        let reply = self
            .client
            .request(self.subject.clone(), payload.into())
            .await
            .with_context(|| format!("Search request to {} failed", self.subject))?;

        serde_json::from_slice(&reply.payload)
            .with_context(|| format!("Invalid search reply from {}", self.subject))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
