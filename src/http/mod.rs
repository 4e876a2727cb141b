//! HTTP API for overlay clients and operators
//!
//! - POST /sessions/start - Open a session
//! - POST /sessions/:id/end - End a session (teardown)
//! - POST /sessions/:id/captions - Feed caption chunks (alternative to NATS)
//! - GET /sessions - List live sessions
//! - GET /sessions/:id/status - Flow state, roles and counters
//! - GET /sessions/:id/speakers - Speaker profiles
//! - GET /sessions/:id/answers - Persisted answers
//! - GET /sessions/:id/stream - Live answers as Server-Sent Events
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
