use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::contract::{answer_schema, fallback_answer, validate_response, ContractViolation};
use super::prompt::PromptProfile;
use super::{AnswerGenerator, GenerationConfig, GeneratorRequest, SessionAnswer};
use crate::broker::{AnswerBroker, AnswerSink, StreamEvent};
use crate::cache::SegmentCache;
use crate::error::{CopilotError, Result};
use crate::keywords::{build_query, extract_keywords};
use crate::queue::AnswerJob;
use crate::retrieval::{search_all, SearchAdapter};
use crate::store::SessionStore;
use crate::transcript::{window_segments, TranscriptSegment};

/// Turns one answer job into exactly one persisted and published answer
pub struct AnswerService {
    config: GenerationConfig,
    cache: Arc<SegmentCache>,
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn AnswerGenerator>,
    broker: AnswerBroker,
    adapters: Vec<Arc<dyn SearchAdapter>>,
    sinks: Vec<Arc<dyn AnswerSink>>,
}

impl AnswerService {
    pub fn new(
        config: GenerationConfig,
        cache: Arc<SegmentCache>,
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn AnswerGenerator>,
        broker: AnswerBroker,
    ) -> Self {
        Self {
            config,
            cache,
            store,
            generator,
            broker,
            adapters: Vec::new(),
            sinks: Vec::new(),
        }
    }

    pub fn with_adapters(mut self, adapters: Vec<Arc<dyn SearchAdapter>>) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn AnswerSink>>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Answer one job.
    ///
    /// Adapter and generator failures are absorbed (the latter into the
    /// fallback answer). Only a failed answer write is returned as an error,
    /// in which case nothing is published.
    pub async fn process_job(&self, job: &AnswerJob) -> Result<SessionAnswer> {
        let context = self.load_context(job).await;

        let question = if job.question_text.trim().is_empty() {
            context.last().map(|s| s.text.clone()).unwrap_or_default()
        } else {
            job.question_text.clone()
        };

        let keywords = extract_keywords(&question);
        let query = build_query(&keywords, &self.config.default_query);
        debug!("Job {} retrieval query: '{}'", job.id, query);

        let retrieval = search_all(
            &self.adapters,
            &query,
            self.config.top_k,
            Duration::from_millis(self.config.adapter_timeout_ms),
        )
        .await;

        let profile = PromptProfile::select(&question, &context, &retrieval);
        let request = GeneratorRequest {
            prompt: profile.render(),
            schema: answer_schema(),
        };
        let known_sources = self.config.strict_citations.then(|| profile.known_sources());

        debug!("Job {} using {} prompt", job.id, profile.name());

        let validated = match self
            .call_generator(&request)
            .await
            .and_then(|raw| validate_response(&raw, known_sources.as_ref()))
        {
            Ok(validated) => validated,
            Err(violation) => {
                warn!(
                    "Generator contract failure for job {} ({}), publishing fallback answer",
                    job.id, violation
                );
                fallback_answer()
            }
        };

        let latency_ms = (Utc::now() - job.enqueued_at).num_milliseconds().max(0) as u64;
        let answer = SessionAnswer {
            id: format!("ans-{}", uuid::Uuid::new_v4()),
            session_id: job.session_id.clone(),
            token_count: validated.answer.split_whitespace().count(),
            answer_text: validated.answer,
            citations: validated.citations,
            confidence: validated.confidence,
            latency_ms,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_answer(&answer).await {
            error!(
                "Failed to persist answer for job {} in {}: {:#}",
                job.id,
                self.store.name(),
                e
            );
            return Err(CopilotError::Persistence(format!("{:#}", e)));
        }

        let listeners = self
            .broker
            .publish(&job.session_id, StreamEvent::Answer(Arc::new(answer.clone())));

        info!(
            "Answered job {} for session {} in {}ms (confidence {:.2}, {} listeners)",
            job.id, job.session_id, answer.latency_ms, answer.confidence, listeners
        );

        for sink in &self.sinks {
            if let Err(e) = sink.deliver(&answer).await {
                warn!("Answer sink {} failed: {:#}", sink.name(), e);
            }
        }

        Ok(answer)
    }

    /// Cached window, else a store read merged with the job's own segment.
    /// A failed read degrades to the job's segment alone.
    async fn load_context(&self, job: &AnswerJob) -> Vec<TranscriptSegment> {
        let window_ms = self.config.context_window_secs * 1000;

        let segments = match self.cache.get(&job.session_id) {
            Some(segments) => {
                debug!("Segment cache hit for session {}", job.session_id);
                segments
            }
            None => {
                let from_ms = job.timestamp_ms.saturating_sub(window_ms);
                match self
                    .store
                    .segments_between(&job.session_id, from_ms, u64::MAX)
                    .await
                {
                    Ok(mut segments) => {
                        // The segment writer may still be behind the question
                        if let Some(segment) = &job.segment {
                            if !segments.iter().any(|s| s.id == segment.id) {
                                segments.push(segment.clone());
                                segments.sort_by_key(|s| s.ts_start_ms);
                            }
                        }
                        self.cache.set(&job.session_id, segments.clone());
                        segments
                    }
                    Err(e) => {
                        warn!(
                            "Transcript read for session {} failed, answering without context: {:#}",
                            job.session_id, e
                        );
                        job.segment.iter().cloned().collect()
                    }
                }
            }
        };

        window_segments(&segments, window_ms)
    }

    async fn call_generator(&self, request: &GeneratorRequest) -> std::result::Result<Value, ContractViolation> {
        let timeout_ms = self.config.generator_timeout_ms;
        let call = AssertUnwindSafe(self.generator.generate(request)).catch_unwind();

        match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
            Ok(Ok(Ok(raw))) => Ok(raw),
            Ok(Ok(Err(e))) => Err(ContractViolation::Generator(format!(
                "{}: {:#}",
                self.generator.name(),
                e
            ))),
            Ok(Err(_)) => Err(ContractViolation::Generator(format!(
                "{} panicked",
                self.generator.name()
            ))),
            Err(_) => Err(ContractViolation::Timeout(timeout_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerConfig;
    use crate::cache::CacheConfig;
    use crate::generation::{FALLBACK_CONFIDENCE, FALLBACK_TEXT};
    use crate::retrieval::SearchResult;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedGenerator {
        response: Value,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedGenerator {
        fn new(response: Value) -> Arc<Self> {
            Arc::new(Self {
                response,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl AnswerGenerator for FixedGenerator {
        async fn generate(&self, request: &GeneratorRequest) -> anyhow::Result<Value> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(self.response.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct SlowGenerator;

    #[async_trait::async_trait]
    impl AnswerGenerator for SlowGenerator {
        async fn generate(&self, _request: &GeneratorRequest) -> anyhow::Result<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct Tickets;

    #[async_trait::async_trait]
    impl SearchAdapter for Tickets {
        async fn search(&self, query: &str, _top_k: usize) -> anyhow::Result<Vec<SearchResult>> {
            Ok(vec![SearchResult {
                title: "PROJ-142".to_string(),
                uri: "https://tracker.example/PROJ-142".to_string(),
                snippet: format!("matched {}", query),
            }])
        }

        fn name(&self) -> &str {
            "tickets"
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl SearchAdapter for Broken {
        async fn search(&self, _query: &str, _top_k: usize) -> anyhow::Result<Vec<SearchResult>> {
            anyhow::bail!("index offline")
        }

        fn name(&self) -> &str {
            "code"
        }
    }

    fn service(generator: Arc<dyn AnswerGenerator>, store: Arc<dyn SessionStore>) -> (AnswerService, AnswerBroker) {
        let broker = AnswerBroker::new(&BrokerConfig::default());
        let config = GenerationConfig {
            generator_timeout_ms: 100,
            ..GenerationConfig::default()
        };
        let service = AnswerService::new(
            config,
            Arc::new(SegmentCache::new(CacheConfig::default())),
            store,
            generator,
            broker.clone(),
        );
        (service, broker)
    }

    #[tokio::test]
    async fn test_empty_citations_become_fallback() {
        let generator = FixedGenerator::new(json!({"answer": "X", "citations": [], "confidence": 0.9}));
        let store = Arc::new(MemoryStore::new());
        let (service, broker) = service(generator, store.clone());
        let mut listener = broker.register("s1");

        let answer = service
            .process_job(&AnswerJob::new("s1", "seg-1", "What is PROJ-142?", 1_000))
            .await
            .unwrap();

        assert_eq!(answer.answer_text, FALLBACK_TEXT);
        assert_eq!(answer.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(answer.citations[0].source, "system");

        assert_eq!(store.answers("s1").await.unwrap(), vec![answer.clone()]);
        assert_eq!(listener.recv().await, Some(StreamEvent::Answer(Arc::new(answer))));
    }

    #[tokio::test]
    async fn test_citations_limited_to_healthy_sources() {
        let generator = FixedGenerator::new(json!({
            "answer": "The migration is tracked in PROJ-142.",
            "citations": [
                {"source": "code", "uri": "git://payments/src/lib.rs"},
                {"source": "tickets", "uri": "https://tracker.example/PROJ-142"}
            ],
            "confidence": 0.8
        }));
        let (service, _broker) = service(generator.clone(), Arc::new(MemoryStore::new()));
        let service = service.with_adapters(vec![Arc::new(Broken), Arc::new(Tickets)]);

        let answer = service
            .process_job(&AnswerJob::new("s1", "seg-1", "Where is the PROJ-142 migration?", 1_000))
            .await
            .unwrap();

        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].source, "tickets");
        assert_eq!(answer.token_count, 6);

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("PROJ-142 (uri: https://tracker.example/PROJ-142)"));
        assert!(!prompts[0].contains("## code"));
    }

    #[tokio::test]
    async fn test_generator_timeout_becomes_fallback() {
        let (service, _broker) = service(Arc::new(SlowGenerator), Arc::new(MemoryStore::new()));

        let answer = service
            .process_job(&AnswerJob::new("s1", "seg-1", "Why?", 1_000))
            .await
            .unwrap();
        assert_eq!(answer.answer_text, FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn test_context_read_from_store_on_miss() {
        let store = Arc::new(MemoryStore::new());
        store
            .append_segment("s1", TranscriptSegment::new("spk_0", "We shard by tenant.", 500, 900))
            .await
            .unwrap();

        let generator = FixedGenerator::new(json!({
            "answer": "By tenant.",
            "citations": [{"source": "transcript", "uri": "transcript://recent"}],
            "confidence": 0.6
        }));
        let (service, _broker) = service(generator.clone(), store);

        let answer = service
            .process_job(&AnswerJob::new("s1", "seg-9", "", 1_000))
            .await
            .unwrap();

        assert_eq!(answer.answer_text, "By tenant.");
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("spk_0: We shard by tenant."));
        assert!(prompts[0].ends_with("## Question\nWe shard by tenant.\n"));
    }

    #[tokio::test]
    async fn test_expired_cache_falls_back_to_store_and_job_segment() {
        let store = Arc::new(MemoryStore::new());
        let earlier = TranscriptSegment::new("spk_1", "I built the ledger service in Go.", 0, 900);
        store.append_segment("s1", earlier.clone()).await.unwrap();

        let cache = Arc::new(SegmentCache::new(CacheConfig {
            ttl_ms: 50,
            max_segments: 200,
        }));
        cache.set("s1", vec![earlier]);
        tokio::time::sleep(Duration::from_millis(150)).await;

        // Not yet persisted by the segment writer
        let question = TranscriptSegment::new("spk_0", "How would you scale the ledger?", 1_100, 1_900);
        assert!(!cache.append("s1", question.clone()));

        let generator = FixedGenerator::new(json!({
            "answer": "Partition by account.",
            "citations": [{"source": "transcript", "uri": "transcript://recent"}],
            "confidence": 0.7
        }));
        let service = AnswerService::new(
            GenerationConfig::default(),
            cache.clone(),
            store,
            generator.clone(),
            AnswerBroker::new(&BrokerConfig::default()),
        );

        let job = AnswerJob::new("s1", question.id.clone(), question.text.clone(), question.ts_end_ms)
            .with_segment(question);
        service.process_job(&job).await.unwrap();

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("spk_1: I built the ledger service in Go."));
        assert!(prompts[0].contains("spk_0: How would you scale the ledger?"));
    }
}
