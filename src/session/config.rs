use serde::{Deserialize, Serialize};

use crate::captions::DetectorConfig;
use crate::config::Config;
use crate::diarization::DiarizationConfig;
use crate::flow::FlowConfig;

/// Configuration for one copilot session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "interview-2026-03-02-backend")
    pub session_id: String,

    /// Boundary detection tuning, applied per speaker stream
    pub detector: DetectorConfig,

    /// Question flow tuning
    pub flow: FlowConfig,

    /// Role assignment tuning
    pub diarization: DiarizationConfig,
}

impl SessionConfig {
    /// Session settings taken from the service configuration
    pub fn from_config(session_id: impl Into<String>, config: &Config) -> Self {
        Self {
            session_id: session_id.into(),
            detector: config.detector.clone(),
            flow: config.flow.clone(),
            diarization: config.diarization.clone(),
        }
    }

    pub fn with_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            detector: DetectorConfig::default(),
            flow: FlowConfig::default(),
            diarization: DiarizationConfig::default(),
        }
    }
}
