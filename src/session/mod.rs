//! Copilot session management
//!
//! This module provides:
//! - `CopilotSession`: per-session detection state (boundary detectors,
//!   role assignment, interview flow, counters)
//! - `SessionRegistry`: the session-keyed store holding them
//! - `Copilot`: the pipeline facade (ingest, teardown, subscribe, shutdown)
//! - Session statistics

mod config;
mod copilot;
mod registry;
mod session;
mod stats;

pub use config::SessionConfig;
pub use copilot::Copilot;
pub use registry::{SessionRegistry, SharedSession};
pub use session::{CopilotSession, IngestOutcome};
pub use stats::SessionStats;
