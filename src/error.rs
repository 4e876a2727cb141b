use thiserror::Error;

/// Failures that leave the answer pipeline.
///
/// Adapter failures, generator contract failures and cache staleness are
/// absorbed inside the pipeline and never show up here.
#[derive(Debug, Error)]
pub enum CopilotError {
    /// Job rejected before entering the queue
    #[error("malformed job: {0}")]
    MalformedJob(String),

    /// Durable store write or read failed while processing a job
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Queue is at capacity; detection never waits for room
    #[error("answer queue is full ({0} jobs)")]
    QueueFull(usize),

    /// Queue has been shut down
    #[error("answer queue is closed")]
    QueueClosed,

    /// Captions arrived for a session that has already ended
    #[error("session {0} has ended")]
    SessionClosed(String),

    /// No live session with this id
    #[error("unknown session {0}")]
    UnknownSession(String),
}

pub type Result<T> = std::result::Result<T, CopilotError>;
