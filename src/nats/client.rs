use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::CaptionMessage;
use crate::broker::AnswerSink;
use crate::error::CopilotError;
use crate::generation::SessionAnswer;
use crate::session::Copilot;

pub struct NatsClient {
    client: Client,
    answer_subject_prefix: String,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, answer_subject_prefix: impl Into<String>) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            answer_subject_prefix: answer_subject_prefix.into(),
        })
    }

    /// Underlying connection, shared with request/reply collaborators
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Subject answers for `session_id` are re-published on
    pub fn answer_subject(&self, session_id: &str) -> String {
        format!("{}.{}", self.answer_subject_prefix, session_id)
    }

    /// Publish an answer as JSON
    pub async fn publish_answer(&self, answer: &SessionAnswer) -> Result<()> {
        let subject = self.answer_subject(&answer.session_id);
        let payload = serde_json::to_vec(answer)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish answer")?;

        debug!("Published answer {} to {}", answer.id, subject);

        Ok(())
    }

    /// Subscribe to caption messages
    pub async fn subscribe_captions(&self, subject: &str) -> Result<async_nats::Subscriber> {
        info!("Subscribing to captions on {}", subject);

        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .context("Failed to subscribe to captions")?;

        info!("Subscribed to {}", subject);

        Ok(subscriber)
    }

    /// Feed every final caption on `subject` into the copilot until the
    /// subscription ends
    pub async fn spawn_caption_ingest(&self, subject: &str, copilot: Arc<Copilot>) -> Result<JoinHandle<()>> {
        let mut captions = self.subscribe_captions(subject).await?;

        Ok(tokio::spawn(async move {
            info!("Caption ingest task started");

            while let Some(msg) = captions.next().await {
                let caption = match serde_json::from_slice::<CaptionMessage>(&msg.payload) {
                    Ok(caption) => caption,
                    Err(e) => {
                        warn!("Failed to parse caption message on {}: {}", msg.subject, e);
                        continue;
                    }
                };

                if caption.partial {
                    continue;
                }

                match copilot.ingest(&caption.session_id, &caption.to_chunk()).await {
                    Ok(_) => {}
                    Err(CopilotError::SessionClosed(session_id)) => {
                        debug!("Dropping caption for ended session {}", session_id);
                    }
                    Err(e) => warn!("Caption for session {} not processed: {}", caption.session_id, e),
                }
            }

            info!("Caption ingest task stopped");
        }))
    }
}

#[async_trait::async_trait]
impl AnswerSink for NatsClient {
    async fn deliver(&self, answer: &SessionAnswer) -> Result<()> {
        self.publish_answer(answer).await
    }

    fn name(&self) -> &str {
        "nats"
    }
}
