//! Per-session answer fan-out
//!
//! Each listener gets its own bounded queue. Publishing is best-effort: a
//! full listener queue drops that event for that listener only, and the
//! publisher never waits. No reordering, no persistence.
//!
//! Once a session is closed, listeners registered afterwards only get
//! heartbeats; answers still in flight reach the listeners that were
//! already registered.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ended::EndedIds;
use crate::generation::SessionAnswer;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Events buffered per listener before drops start
    pub listener_capacity: usize,

    /// Heartbeat period in seconds (0 disables heartbeats)
    pub heartbeat_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listener_capacity: 32,
            heartbeat_secs: 15,
        }
    }
}

/// Delivered to listeners: `{"event": "answer", "data": {...}}` or `{"event": "heartbeat"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Answer(Arc<SessionAnswer>),
    Heartbeat,
}

/// Out-of-process delivery target (e.g. a message bus) notified of every answer
#[async_trait::async_trait]
pub trait AnswerSink: Send + Sync {
    async fn deliver(&self, answer: &SessionAnswer) -> anyhow::Result<()>;

    fn name(&self) -> &str;
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<StreamEvent>,
    /// False for listeners registered after the session closed
    answers: bool,
}

#[derive(Default)]
struct BrokerState {
    sessions: HashMap<String, Vec<Subscriber>>,
    closed: EndedIds,
}

struct BrokerInner {
    capacity: usize,
    next_id: AtomicU64,
    state: Mutex<BrokerState>,
}

impl BrokerInner {
    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, session_id: &str, listener_id: u64) -> bool {
        let mut state = self.state();
        let sessions = &mut state.sessions;
        let Some(subscribers) = sessions.get_mut(session_id) else {
            return false;
        };

        let before = subscribers.len();
        subscribers.retain(|s| s.id != listener_id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            sessions.remove(session_id);
        }
        removed
    }
}

#[derive(Clone)]
pub struct AnswerBroker {
    inner: Arc<BrokerInner>,
}

impl AnswerBroker {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                capacity: config.listener_capacity.max(1),
                next_id: AtomicU64::new(1),
                state: Mutex::new(BrokerState::default()),
            }),
        }
    }

    /// Register a new listener for `session_id`
    pub fn register(&self, session_id: &str) -> Listener {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut state = self.inner.state();
        let answers = !state.closed.contains(session_id);
        state
            .sessions
            .entry(session_id.to_string())
            .or_default()
            .push(Subscriber { id, tx, answers });
        drop(state);

        debug!(
            "Listener {} registered for session {} (answers={})",
            id, session_id, answers
        );

        Listener {
            id,
            session_id: session_id.to_string(),
            rx,
            broker: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a listener. Unknown handles are not an error.
    pub fn unregister(&self, listener: Listener) -> bool {
        let removed = self.inner.remove(&listener.session_id, listener.id);
        debug!(
            "Listener {} unregistered from session {} (removed={})",
            listener.id, listener.session_id, removed
        );
        removed
    }

    /// Mark `session_id` as ended. Listeners registered from now on get no
    /// answers for it.
    pub fn close_session(&self, session_id: &str) {
        if let Some(forgotten) = self.inner.state().closed.insert(session_id) {
            debug!("Broker forgetting ended session {}", forgotten);
        }
    }

    /// Push `event` to every listener of `session_id`. Returns how many
    /// listeners accepted it.
    pub fn publish(&self, session_id: &str, event: StreamEvent) -> usize {
        let mut state = self.inner.state();
        let sessions = &mut state.sessions;
        let Some(subscribers) = sessions.get_mut(session_id) else {
            debug!("No listeners for session {}", session_id);
            return 0;
        };

        let is_answer = matches!(event, StreamEvent::Answer(_));
        let mut delivered = 0;
        subscribers.retain(|subscriber| {
            if is_answer && !subscriber.answers {
                return !subscriber.tx.is_closed();
            }
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Listener {} on session {} is full, dropping event",
                        subscriber.id, session_id
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });

        if subscribers.is_empty() {
            sessions.remove(session_id);
        }
        delivered
    }

    /// Send a heartbeat to every listener of every session
    pub fn heartbeat(&self) {
        let session_ids: Vec<String> = self.inner.state().sessions.keys().cloned().collect();
        for session_id in session_ids {
            self.publish(&session_id, StreamEvent::Heartbeat);
        }
    }

    /// Spawn the periodic heartbeat task
    pub fn start_heartbeat(&self, period: Duration) -> JoinHandle<()> {
        let broker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                broker.heartbeat();
            }
        })
    }

    pub fn listener_count(&self, session_id: &str) -> usize {
        self.inner
            .state()
            .sessions
            .get(session_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or_default()
    }
}

/// Receiving end of one registration. Dropping it unregisters.
pub struct Listener {
    id: u64,
    session_id: String,
    rx: mpsc::Receiver<StreamEvent>,
    broker: Weak<BrokerInner>,
}

impl Listener {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next event; `None` once unregistered or the broker is gone
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Next already-queued event, if any
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(inner) = self.broker.upgrade() {
            inner.remove(&self.session_id, self.id);
        }
    }
}
