pub mod audio;
pub mod broker;
pub mod cache;
pub mod captions;
pub mod config;
pub mod diarization;
pub mod ended;
pub mod error;
pub mod flow;
pub mod generation;
pub mod http;
pub mod keywords;
pub mod nats;
pub mod queue;
pub mod retrieval;
pub mod session;
pub mod store;
pub mod transcript;

pub use audio::AudioFile;
pub use broker::{AnswerBroker, AnswerSink, BrokerConfig, Listener, StreamEvent};
pub use cache::{CacheConfig, SegmentCache};
pub use captions::{BoundaryReason, CaptionChunk, DetectorConfig, QuestionBoundaryDetector, Utterance};
pub use config::Config;
pub use diarization::{
    AcousticDiarizer, DiarizationConfig, DiarizationSource, LexicalDiarizer, Role, SpeakerIdentifier,
    SpeakerProfile, SpeakerSegment,
};
pub use error::CopilotError;
pub use flow::{FlowConfig, FlowEvent, FlowState, InterviewFlow};
pub use generation::{
    AnswerGenerator, AnswerService, Citation, GenerationConfig, GeneratorRequest, SessionAnswer,
};
pub use http::{create_router, AppState};
pub use nats::{CaptionMessage, NatsClient, NatsGenerator};
pub use queue::{AnswerJob, AnswerQueue, JobHandler, QueueConfig, ShutdownMode};
pub use retrieval::{HistoryAdapter, NatsSearchAdapter, SearchAdapter, SearchResult};
pub use session::{Copilot, CopilotSession, IngestOutcome, SessionConfig, SessionRegistry, SessionStats};
pub use store::{MemoryStore, SessionStore};
pub use transcript::TranscriptSegment;
