use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::generation::SessionAnswer;
use crate::transcript::TranscriptSegment;

#[derive(Debug, Default)]
struct SessionRecords {
    segments: Vec<TranscriptSegment>,
    answers: Vec<SessionAnswer>,
}

/// In-process store. Each session's records sit behind their own lock, so
/// writers on different sessions never contend beyond the map lookup.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, Arc<RwLock<SessionRecords>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn records(&self, session_id: &str) -> Arc<RwLock<SessionRecords>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(records) = sessions.get(session_id) {
                return Arc::clone(records);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session_id.to_string()).or_default())
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn append_segment(&self, session_id: &str, segment: TranscriptSegment) -> Result<()> {
        let records = self.records(session_id).await;
        let mut records = records.write().await;

        // Keep ordered by start time even if the writer delivers slightly out of order
        let index = records
            .segments
            .partition_point(|s| s.ts_start_ms <= segment.ts_start_ms);
        records.segments.insert(index, segment);
        Ok(())
    }

    async fn segments_between(
        &self,
        session_id: &str,
        from_ms: u64,
        to_ms: u64,
    ) -> Result<Vec<TranscriptSegment>> {
        let records = self.records(session_id).await;
        let records = records.read().await;

        Ok(records
            .segments
            .iter()
            .filter(|s| s.ts_end_ms >= from_ms && s.ts_end_ms <= to_ms)
            .cloned()
            .collect())
    }

    async fn insert_answer(&self, answer: &SessionAnswer) -> Result<()> {
        let records = self.records(&answer.session_id).await;
        records.write().await.answers.push(answer.clone());
        Ok(())
    }

    async fn answers(&self, session_id: &str) -> Result<Vec<SessionAnswer>> {
        let records = self.records(session_id).await;
        let answers = records.read().await.answers.clone();
        Ok(answers)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
