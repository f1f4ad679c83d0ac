//! Model gateway: one analysis request to one named model.
//!
//! Streams the response, concatenates deltas, and retries with linear
//! backoff. Stateless across invocations; multi-model fallback is the
//! depth stage's concern, not the gateway's.

use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAIClient, OpenAIError};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::prompts::SYSTEM_PROMPT;

/// Backoff unit; attempt N waits N times this before retrying.
const BACKOFF_UNIT: Duration = Duration::from_secs(2);

/// A successful model response.
#[derive(Debug, Clone)]
pub struct ModelReply {
    /// Full concatenated response text, trimmed.
    pub content: String,
    /// The model that produced it.
    pub model: String,
    /// Which attempt succeeded (1-based).
    pub attempts: u32,
}

/// Seam for model invocation, mocked in tests.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
        max_retries: u32,
    ) -> Result<ModelReply, GatewayError>;
}

/// Gateway backed by an OpenAI-compatible streaming endpoint.
pub struct ModelGateway {
    client: OpenAIClient,
    max_tokens: u32,
}

impl ModelGateway {
    pub fn new(client: OpenAIClient, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }

    async fn attempt(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<String, GatewayError> {
        let request = ChatRequest::new(model)
            .message(Message::system(SYSTEM_PROMPT))
            .message(Message::user(prompt))
            .temperature(temperature)
            .max_tokens(self.max_tokens);

        let stream = self
            .client
            .chat_completion_stream(request)
            .await
            .map_err(map_openai_error)?;

        let content = stream.collect_content().await.map_err(map_openai_error)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        Ok(content.to_string())
    }
}

fn map_openai_error(e: OpenAIError) -> GatewayError {
    match e {
        OpenAIError::Network(msg) => GatewayError::Network(msg),
        other => GatewayError::Api(other.to_string()),
    }
}

#[async_trait]
impl Gateway for ModelGateway {
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
        max_retries: u32,
    ) -> Result<ModelReply, GatewayError> {
        let max_retries = max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_retries {
            info!(model = %model, attempt, max_retries, "invoking model");

            match self.attempt(prompt, model, temperature).await {
                Ok(content) => {
                    info!(
                        model = %model,
                        attempt,
                        content_len = content.len(),
                        "model call completed"
                    );
                    return Ok(ModelReply {
                        content,
                        model: model.to_string(),
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    warn!(model = %model, attempt, error = %e, "model call failed");
                    last_error = e.to_string();

                    if attempt < max_retries {
                        let wait = BACKOFF_UNIT * attempt;
                        info!(wait_secs = wait.as_secs(), "backing off before retry");
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        Err(GatewayError::Exhausted {
            model: model.to_string(),
            attempts: max_retries,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGateway;

    #[tokio::test]
    async fn test_mock_gateway_replies_in_order() {
        let gateway = MockGateway::new(vec![
            Ok("first".to_string()),
            Err(GatewayError::EmptyResponse),
            Ok("third".to_string()),
        ]);

        let reply = gateway.invoke("p", "m", 0.1, 3).await.unwrap();
        assert_eq!(reply.content, "first");
        assert_eq!(reply.model, "m");

        assert!(gateway.invoke("p", "m", 0.1, 3).await.is_err());

        let reply = gateway.invoke("p", "m2", 0.1, 3).await.unwrap();
        assert_eq!(reply.content, "third");
        assert_eq!(reply.model, "m2");
        assert_eq!(gateway.call_count(), 3);
    }
}
