use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::broker::BrokerConfig;
use crate::cache::CacheConfig;
use crate::captions::DetectorConfig;
use crate::diarization::DiarizationConfig;
use crate::flow::FlowConfig;
use crate::generation::GenerationConfig;
use crate::queue::QueueConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    pub detector: DetectorConfig,
    pub flow: FlowConfig,
    pub diarization: DiarizationConfig,
    pub cache: CacheConfig,
    pub generation: GenerationConfig,
    pub queue: QueueConfig,
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-copilot".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3710,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,

    /// Subject carrying caption chunks from the STT service
    pub caption_subject: String,

    /// Answers are re-published on `<prefix>.<session_id>`
    pub answer_subject_prefix: String,

    /// Request/reply subject of the answer generator
    pub generator_subject: String,

    /// Retrieval adapters reachable over request/reply (adapter name → subject)
    pub search_subjects: BTreeMap<String, String>,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            caption_subject: "captions.>".to_string(),
            answer_subject_prefix: "copilot.answer".to_string(),
            generator_subject: "llm.generate".to_string(),
            search_subjects: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (extension optional, file optional),
    /// then apply `COPILOT`-prefixed environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("COPILOT").separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
