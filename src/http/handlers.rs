use super::state::AppState;
use crate::broker::StreamEvent;
use crate::captions::CaptionChunk;
use crate::error::CopilotError;
use crate::session::SessionStats;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct EndSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct CaptionsResponse {
    pub session_id: String,
    /// Transcript segments completed by these captions
    pub segments: usize,
    /// Questions queued for answering
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: CopilotError) -> Response {
    let status = match &err {
        CopilotError::UnknownSession(_) => StatusCode::NOT_FOUND,
        CopilotError::SessionClosed(_) => StatusCode::GONE,
        CopilotError::MalformedJob(_) => StatusCode::BAD_REQUEST,
        CopilotError::QueueFull(_) | CopilotError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        CopilotError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions/start
/// Open a new copilot session
pub async fn start_session(
    State(state): State<AppState>,
    body: Option<Json<StartSessionRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    match state.copilot.open_session(req.session_id).await {
        Ok(session_id) => {
            info!("Session {} started", session_id);
            (
                StatusCode::OK,
                Json(StartSessionResponse {
                    session_id: session_id.clone(),
                    status: "active".to_string(),
                    message: format!("Session {} started", session_id),
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /sessions/:session_id/end
/// End a session; buffered speech is flushed and further captions are rejected
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Ending session: {}", session_id);

    match state.copilot.end_session(&session_id).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(EndSessionResponse {
                session_id: session_id.clone(),
                status: "ended".to_string(),
                message: "Session ended".to_string(),
                stats,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /sessions/:session_id/captions
/// Feed caption chunks in arrival order
pub async fn post_captions(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(captions): Json<Vec<CaptionChunk>>,
) -> impl IntoResponse {
    let mut response = CaptionsResponse {
        session_id: session_id.clone(),
        segments: 0,
        questions: Vec::new(),
    };

    for chunk in &captions {
        match state.copilot.ingest(&session_id, chunk).await {
            Ok(outcome) => {
                response.segments += outcome.segments.len();
                response.questions.extend(outcome.job.map(|job| job.question_text));
            }
            Err(e) => return error_response(e),
        }
    }

    (StatusCode::OK, Json(response)).into_response()
}

/// GET /sessions
/// List live sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.copilot.session_ids().await))
}

/// GET /sessions/:session_id/status
/// Get flow state, roles and counters of a live session
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.copilot.stats(&session_id).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /sessions/:session_id/speakers
/// Get speaker profiles of a live session
pub async fn get_session_speakers(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.copilot.speakers(&session_id).await {
        Ok(profiles) => (StatusCode::OK, Json(profiles)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /sessions/:session_id/answers
/// Get persisted answers (live or ended session)
pub async fn get_session_answers(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.copilot.answers(&session_id).await {
        Ok(answers) => (StatusCode::OK, Json(answers)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /sessions/:session_id/stream
/// Server-Sent Events: `answer` events with the answer JSON, periodic `heartbeat` events.
/// The listener is unregistered when the client disconnects.
pub async fn stream_answers(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Answer stream opened for session {}", session_id);
    let listener = state.copilot.subscribe(&session_id);

    let events = futures::stream::unfold(listener, |mut listener| async move {
        let event = match listener.recv().await? {
            StreamEvent::Answer(answer) => Event::default()
                .event("answer")
                .json_data(answer.as_ref())
                .unwrap_or_else(|e| {
                    warn!("Failed to encode answer {}: {}", answer.id, e);
                    Event::default().comment("answer could not be encoded")
                }),
            StreamEvent::Heartbeat => Event::default().event("heartbeat").data(""),
        };
        Some((Ok::<_, Infallible>(event), listener))
    });

    Sse::new(events)
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
