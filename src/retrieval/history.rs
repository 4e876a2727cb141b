use anyhow::{Context, Result};
use std::path::Path;
use std::sync::RwLock;
use tracing::info;

use super::{SearchAdapter, SearchResult};

/// Searches an in-process corpus of past meeting material (previous answers,
/// notes, prep documents) by term overlap.
#[derive(Debug, Default)]
pub struct HistoryAdapter {
    documents: RwLock<Vec<SearchResult>>,
}

impl HistoryAdapter {
    pub fn new(documents: Vec<SearchResult>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Load a JSON array of search results
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read history corpus: {}", path.display()))?;
        let documents: Vec<SearchResult> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse history corpus: {}", path.display()))?;

        info!("Loaded {} history documents from {}", documents.len(), path.display());
        Ok(Self::new(documents))
    }

    pub fn push(&self, document: SearchResult) {
        if let Ok(mut documents) = self.documents.write() {
            documents.push(document);
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|t| t.len() > 1)
        .map(|t| t.to_lowercase())
        .collect()
}

#[async_trait::async_trait]
impl SearchAdapter for HistoryAdapter {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let documents = self
            .documents
            .read()
            .map_err(|_| anyhow::anyhow!("history corpus lock poisoned"))?;

        let mut scored: Vec<(usize, &SearchResult)> = documents
            .iter()
            .map(|doc| {
                let doc_terms = terms(&format!("{} {}", doc.title, doc.snippet));
                let score = query_terms.iter().filter(|t| doc_terms.contains(t)).count();
                (score, doc)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps corpus order among equal scores
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    fn name(&self) -> &str {
        "history"
    }
}
