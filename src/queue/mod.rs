//! Answer job queue
//!
//! FIFO hand-off from detection (producer side, never blocks) to a small
//! fixed pool of workers. Jobs of one session always go to the same worker,
//! so a later question never overtakes an unanswered earlier one. A failing
//! or panicking job is logged and dropped; there is no retry.

mod job;

pub use job::AnswerJob;

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::error::{CopilotError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Worker tasks
    pub workers: usize,

    /// Jobs buffered across all workers before enqueue fails
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            capacity: 64,
        }
    }
}

/// Processes one dequeued job
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: AnswerJob) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop intake, finish every queued job
    Drain,
    /// Stop intake, abandon queued and in-flight jobs
    Abort,
}

pub struct AnswerQueue {
    per_worker_capacity: usize,
    senders: Mutex<Option<Vec<mpsc::Sender<AnswerJob>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AnswerQueue {
    /// Spawn the worker pool
    pub fn start(config: &QueueConfig, handler: Arc<dyn JobHandler>) -> Self {
        let worker_count = config.workers.max(1);
        let per_worker_capacity = config.capacity.max(1).div_ceil(worker_count);

        let mut senders = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let (tx, rx) = mpsc::channel(per_worker_capacity);
            senders.push(tx);
            workers.push(tokio::spawn(run_worker(worker_id, rx, Arc::clone(&handler))));
        }

        info!(
            "Answer queue started: {} workers, {} jobs per worker",
            worker_count, per_worker_capacity
        );

        Self {
            per_worker_capacity,
            senders: Mutex::new(Some(senders)),
            workers: Mutex::new(workers),
        }
    }

    /// Validate and enqueue without waiting. Fails with `QueueFull` when the
    /// session's worker is saturated and `QueueClosed` after shutdown.
    pub fn enqueue(&self, job: AnswerJob) -> Result<()> {
        job.validate()?;

        let senders = self.senders.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(senders) = senders.as_ref() else {
            return Err(CopilotError::QueueClosed);
        };

        let worker = worker_for(&job.session_id, senders.len());
        debug!("Enqueueing job {} for session {} on worker {}", job.id, job.session_id, worker);

        match senders[worker].try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                warn!("Answer queue full, rejecting job {}", job.id);
                Err(CopilotError::QueueFull(self.per_worker_capacity))
            }
            Err(TrySendError::Closed(_)) => Err(CopilotError::QueueClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// Close intake and stop the workers. Safe to call more than once.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        // Dropping the senders lets each worker drain its channel and exit
        let senders = self
            .senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(senders);

        let workers: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
        );

        info!("Shutting down answer queue ({:?}, {} workers)", mode, workers.len());

        if mode == ShutdownMode::Abort {
            for worker in &workers {
                worker.abort();
            }
        }

        for worker in workers {
            match worker.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!("Queue worker panicked: {}", e),
            }
        }
    }
}

fn worker_for(session_id: &str, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    session_id.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

/// Aborts the in-flight job if its worker is aborted
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_worker(worker_id: usize, mut rx: mpsc::Receiver<AnswerJob>, handler: Arc<dyn JobHandler>) {
    debug!("Queue worker {} started", worker_id);

    while let Some(job) = rx.recv().await {
        let job_id = job.id.clone();
        let session_id = job.session_id.clone();

        // Run each job in its own task so a panic only loses that job
        let handler = Arc::clone(&handler);
        let task = tokio::spawn(async move { handler.handle(job).await });
        let _abort_guard = AbortOnDrop(task.abort_handle());

        match task.await {
            Ok(Ok(())) => debug!("Worker {} finished job {}", worker_id, job_id),
            Ok(Err(e)) => error!(
                "Job {} for session {} failed and was dropped: {}",
                job_id, session_id, e
            ),
            Err(e) => error!(
                "Job {} for session {} panicked and was dropped: {}",
                job_id, session_id, e
            ),
        }
    }

    debug!("Queue worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    struct Recorder {
        seen: AsyncMutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl JobHandler for Recorder {
        async fn handle(&self, job: AnswerJob) -> Result<()> {
            if job.question_text == "panic" {
                panic!("handler blew up");
            }
            if job.question_text == "fail" {
                return Err(CopilotError::Persistence("disk on fire".to_string()));
            }
            // First question is slow so a FIFO violation would show
            if job.question_text == "first" {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.seen.lock().await.push(job.question_text);
            Ok(())
        }
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder {
            seen: AsyncMutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_same_session_fifo() {
        let handler = recorder();
        let queue = AnswerQueue::start(&QueueConfig::default(), handler.clone());

        queue.enqueue(AnswerJob::new("s1", "seg-1", "first", 0)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(AnswerJob::new("s1", "seg-2", "second", 10)).unwrap();

        queue.shutdown(ShutdownMode::Drain).await;
        assert_eq!(*handler.seen.lock().await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_failures_and_panics_do_not_stop_worker() {
        let handler = recorder();
        let queue = AnswerQueue::start(
            &QueueConfig {
                workers: 1,
                capacity: 8,
            },
            handler.clone(),
        );

        queue.enqueue(AnswerJob::new("s1", "seg-1", "panic", 0)).unwrap();
        queue.enqueue(AnswerJob::new("s1", "seg-2", "fail", 1)).unwrap();
        queue.enqueue(AnswerJob::new("s1", "seg-3", "after", 2)).unwrap();

        queue.shutdown(ShutdownMode::Drain).await;
        assert_eq!(*handler.seen.lock().await, vec!["after"]);
    }

    #[tokio::test]
    async fn test_malformed_and_closed() {
        let queue = AnswerQueue::start(&QueueConfig::default(), recorder());

        assert!(matches!(
            queue.enqueue(AnswerJob::new("", "seg-1", "q", 0)),
            Err(CopilotError::MalformedJob(_))
        ));

        queue.shutdown(ShutdownMode::Abort).await;
        assert!(queue.is_closed());
        assert!(matches!(
            queue.enqueue(AnswerJob::new("s1", "seg-1", "q", 0)),
            Err(CopilotError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        struct Stuck;

        #[async_trait::async_trait]
        impl JobHandler for Stuck {
            async fn handle(&self, _job: AnswerJob) -> Result<()> {
                std::future::pending::<()>().await;
                Ok(())
            }
        }

        let queue = AnswerQueue::start(
            &QueueConfig {
                workers: 1,
                capacity: 1,
            },
            Arc::new(Stuck),
        );

        // One job in flight, one buffered, the third is rejected
        queue.enqueue(AnswerJob::new("s1", "seg-1", "a", 0)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(AnswerJob::new("s1", "seg-2", "b", 1)).unwrap();
        assert!(matches!(
            queue.enqueue(AnswerJob::new("s1", "seg-3", "c", 2)),
            Err(CopilotError::QueueFull(1))
        ));

        queue.shutdown(ShutdownMode::Abort).await;
    }
}
