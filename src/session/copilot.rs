use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::registry::{SessionRegistry, SharedSession};
use super::session::IngestOutcome;
use super::stats::SessionStats;
use crate::broker::{AnswerBroker, AnswerSink, Listener};
use crate::cache::SegmentCache;
use crate::captions::CaptionChunk;
use crate::config::Config;
use crate::diarization::SpeakerProfile;
use crate::error::{CopilotError, Result};
use crate::generation::{AnswerGenerator, AnswerService, SessionAnswer};
use crate::queue::{AnswerJob, AnswerQueue, JobHandler, ShutdownMode};
use crate::retrieval::SearchAdapter;
use crate::store::SessionStore;
use crate::transcript::TranscriptSegment;

type SegmentWrite = (String, TranscriptSegment);

/// Runs a dequeued job through the answer service and reports back to the
/// session so its flow can wait for the next question
struct CopilotHandler {
    service: AnswerService,
    sessions: Arc<SessionRegistry>,
    cache: Arc<SegmentCache>,
}

#[async_trait::async_trait]
impl JobHandler for CopilotHandler {
    async fn handle(&self, job: AnswerJob) -> Result<()> {
        let result = self.service.process_job(&job).await;

        // The session may have ended while the job was in flight
        match self.sessions.get(&job.session_id).await {
            Some(session) => session.lock().await.on_job_finished(result.is_ok()),
            None => self.cache.invalidate(&job.session_id),
        }

        result.map(|_| ())
    }
}

/// The whole pipeline behind one handle: caption ingestion on the producer
/// side, answer jobs on the worker side.
pub struct Copilot {
    sessions: Arc<SessionRegistry>,
    cache: Arc<SegmentCache>,
    store: Arc<dyn SessionStore>,
    broker: AnswerBroker,
    queue: AnswerQueue,
    segment_tx: Mutex<Option<mpsc::UnboundedSender<SegmentWrite>>>,
    segment_writer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl Copilot {
    /// Wire the pipeline and spawn its background tasks
    pub fn start(
        config: &Config,
        store: Arc<dyn SessionStore>,
        adapters: Vec<Arc<dyn SearchAdapter>>,
        generator: Arc<dyn AnswerGenerator>,
        sinks: Vec<Arc<dyn AnswerSink>>,
    ) -> Self {
        let template = SessionConfig::from_config(String::new(), config);
        let sessions = Arc::new(SessionRegistry::new(template));
        let cache = Arc::new(SegmentCache::new(config.cache.clone()));
        let broker = AnswerBroker::new(&config.broker);

        info!(
            "Starting copilot: {} adapters, generator {}, store {}",
            adapters.len(),
            generator.name(),
            store.name()
        );

        let service = AnswerService::new(
            config.generation.clone(),
            Arc::clone(&cache),
            Arc::clone(&store),
            generator,
            broker.clone(),
        )
        .with_adapters(adapters)
        .with_sinks(sinks);

        let handler = Arc::new(CopilotHandler {
            service,
            sessions: Arc::clone(&sessions),
            cache: Arc::clone(&cache),
        });
        let queue = AnswerQueue::start(&config.queue, handler);

        let (segment_tx, segment_rx) = mpsc::unbounded_channel();
        let segment_writer = tokio::spawn(run_segment_writer(segment_rx, Arc::clone(&store)));

        let heartbeat = (config.broker.heartbeat_secs > 0)
            .then(|| broker.start_heartbeat(Duration::from_secs(config.broker.heartbeat_secs)));

        Self {
            sessions,
            cache,
            store,
            broker,
            queue,
            segment_tx: Mutex::new(Some(segment_tx)),
            segment_writer: tokio::sync::Mutex::new(Some(segment_writer)),
            heartbeat: Mutex::new(heartbeat),
        }
    }

    /// Open a session, generating an id if none is given
    pub async fn open_session(&self, session_id: Option<String>) -> Result<String> {
        self.sessions.open(session_id).await
    }

    /// Feed one caption chunk. Never waits on I/O: segments go to the cache
    /// and the background writer, a completed question goes to the queue.
    ///
    /// Unknown sessions are opened on first caption; ended sessions reject
    /// captions with `SessionClosed`.
    pub async fn ingest(&self, session_id: &str, chunk: &CaptionChunk) -> Result<IngestOutcome> {
        let session = self.sessions.get_or_open(session_id).await?;
        self.ingest_into(session_id, &session, chunk).await
    }

    /// The session may have ended between lookup and lock
    async fn ingest_into(&self, session_id: &str, session: &SharedSession, chunk: &CaptionChunk) -> Result<IngestOutcome> {
        let mut session = session.lock().await;
        if session.is_closed() {
            return Err(CopilotError::SessionClosed(session_id.to_string()));
        }

        let outcome = session.ingest(chunk);
        for segment in &outcome.segments {
            self.record_segment(session_id, segment.clone());
        }

        if let Some(job) = &outcome.job {
            info!("Question detected in session {}: {}", session_id, job.question_text);
            if let Err(e) = self.queue.enqueue(job.clone()) {
                warn!("Could not queue answer job for session {}: {}", session_id, e);
                session.on_job_finished(false);
                return Err(e);
            }
        }

        Ok(outcome)
    }

    /// Teardown: flush buffered speech, drop detection state and cached
    /// segments, and refuse further captions. In-flight jobs still publish.
    pub async fn end_session(&self, session_id: &str) -> Result<SessionStats> {
        let session = self.sessions.end(session_id).await?;
        let mut session = session.lock().await;
        session.close();
        self.broker.close_session(session_id);

        for segment in session.flush() {
            self.record_segment(session_id, segment);
        }
        self.cache.invalidate(session_id);

        Ok(session.stats())
    }

    /// Register an answer listener. Works for any session id, live or not;
    /// after the session ended it only receives heartbeats.
    pub fn subscribe(&self, session_id: &str) -> Listener {
        self.broker.register(session_id)
    }

    pub async fn stats(&self, session_id: &str) -> Result<SessionStats> {
        if let Some(session) = self.sessions.get(session_id).await {
            return Ok(session.lock().await.stats());
        }

        if self.sessions.is_closed(session_id).await {
            Err(CopilotError::SessionClosed(session_id.to_string()))
        } else {
            Err(CopilotError::UnknownSession(session_id.to_string()))
        }
    }

    pub async fn speakers(&self, session_id: &str) -> Result<Vec<SpeakerProfile>> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| CopilotError::UnknownSession(session_id.to_string()))?;
        let profiles = session.lock().await.profiles();
        Ok(profiles)
    }

    /// Persisted answers, oldest first
    pub async fn answers(&self, session_id: &str) -> Result<Vec<SessionAnswer>> {
        self.store
            .answers(session_id)
            .await
            .map_err(|e| CopilotError::Persistence(format!("{:#}", e)))
    }

    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.ids().await
    }

    pub fn broker(&self) -> &AnswerBroker {
        &self.broker
    }

    /// Stop the workers (draining or aborting queued jobs), then flush
    /// pending segment writes
    pub async fn shutdown(&self, mode: ShutdownMode) {
        info!("Shutting down copilot ({:?})", mode);

        self.queue.shutdown(mode).await;

        if let Some(task) = self
            .heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            task.abort();
        }

        // Closing the channel lets the writer finish what is queued
        drop(
            self.segment_tx
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take(),
        );

        let mut handle = self.segment_writer.lock().await;
        if let Some(task) = handle.take() {
            if let Err(e) = task.await {
                error!("Segment writer task panicked: {}", e);
            }
        }

        info!("Copilot stopped");
    }

    fn record_segment(&self, session_id: &str, segment: TranscriptSegment) {
        if !self.cache.append(session_id, segment.clone()) {
            debug!("No live cache entry for session {}", session_id);
        }

        let segment_tx = self
            .segment_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match segment_tx.as_ref() {
            Some(tx) => {
                if tx.send((session_id.to_string(), segment)).is_err() {
                    warn!("Segment writer stopped; segment for {} not persisted", session_id);
                }
            }
            None => warn!("Copilot is shut down; segment for {} not persisted", session_id),
        }
    }
}

async fn run_segment_writer(mut rx: mpsc::UnboundedReceiver<SegmentWrite>, store: Arc<dyn SessionStore>) {
    debug!("Segment writer started");

    while let Some((session_id, segment)) = rx.recv().await {
        if let Err(e) = store.append_segment(&session_id, segment).await {
            error!("Failed to persist segment for session {}: {:#}", session_id, e);
        }
    }

    debug!("Segment writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};

    struct Echo;

    #[async_trait::async_trait]
    impl AnswerGenerator for Echo {
        async fn generate(&self, _request: &crate::generation::GeneratorRequest) -> anyhow::Result<Value> {
            Ok(json!({
                "answer": "echo",
                "citations": [{"source": "transcript", "uri": "transcript://recent"}],
                "confidence": 0.5
            }))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_ingest_after_end_on_stale_handle_is_rejected() {
        let mut config = Config::default();
        config.broker.heartbeat_secs = 0;
        let copilot = Copilot::start(&config, Arc::new(MemoryStore::new()), Vec::new(), Arc::new(Echo), Vec::new());

        // Looked up before the end, locked after it
        let stale = copilot.sessions.get_or_open("s1").await.unwrap();
        copilot.end_session("s1").await.unwrap();

        let result = copilot
            .ingest_into("s1", &stale, &CaptionChunk::new("spk_0", "Why?", 0))
            .await;
        assert!(matches!(result, Err(CopilotError::SessionClosed(_))));
        assert!(copilot.cache.get("s1").is_none());
        assert_eq!(stale.lock().await.stats().segments, 0);

        copilot.shutdown(ShutdownMode::Drain).await;
        assert!(copilot.store.segments_between("s1", 0, u64::MAX).await.unwrap().is_empty());
    }
}
