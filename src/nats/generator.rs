use anyhow::{Context, Result};
use serde_json::Value;

use crate::generation::{AnswerGenerator, GeneratorRequest};

/// Language-model service reachable over NATS request/reply.
/// Sends `{prompt, schema}`; the reply payload is the raw JSON response.
pub struct NatsGenerator {
    subject: String,
    client: async_nats::Client,
}

impl NatsGenerator {
    pub fn new(subject: impl Into<String>, client: async_nats::Client) -> Self {
        Self {
            subject: subject.into(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl AnswerGenerator for NatsGenerator {
    async fn generate(&self, request: &GeneratorRequest) -> Result<Value> {
        let payload = serde_json::to_vec(request)?;

        let reply = self
            .client
            .request(self.subject.clone(), payload.into())
            .await
            .with_context(|| format!("Generator request to {} failed", self.subject))?;

        serde_json::from_slice(&reply.payload)
            .with_context(|| format!("Generator reply from {} is not JSON", self.subject))
    }

    fn name(&self) -> &str {
        &self.subject
    }
}
