//! Durable store contract
//!
//! The storage engine itself is an external collaborator; the pipeline only
//! needs simple CRUD over transcript segments and answers. `MemoryStore` is
//! the in-process implementation used by the binary and the tests.

mod memory;

pub use memory::MemoryStore;

use anyhow::Result;

use crate::generation::SessionAnswer;
use crate::transcript::TranscriptSegment;

/// Shared by every session and worker; implementations must tolerate
/// concurrent access without cross-session locking.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Append a transcript segment to a session
    async fn append_segment(&self, session_id: &str, segment: TranscriptSegment) -> Result<()>;

    /// Segments whose end falls in `[from_ms, to_ms]`, ordered by start time
    async fn segments_between(
        &self,
        session_id: &str,
        from_ms: u64,
        to_ms: u64,
    ) -> Result<Vec<TranscriptSegment>>;

    /// Persist an answer
    async fn insert_answer(&self, answer: &SessionAnswer) -> Result<()>;

    /// All answers for a session, oldest first
    async fn answers(&self, session_id: &str) -> Result<Vec<SessionAnswer>>;

    /// Store name for logging
    fn name(&self) -> &str;
}
