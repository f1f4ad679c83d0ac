//! Test doubles shared across stage and pipeline tests.
//!
//! Useful for exercising the stages without real model or network calls.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::{Config, ProcessingConfig};
use crate::error::GatewayError;
use crate::gateway::{Gateway, ModelReply};

/// Scripted gateway: hands out canned replies in order, recording each
/// prompt and the model it was asked for.
pub struct MockGateway {
    replies: Mutex<VecDeque<Result<String, GatewayError>>>,
    prompts: Mutex<Vec<String>>,
    models: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new(replies: Vec<Result<String, GatewayError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.models.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        _temperature: f32,
        _max_retries: u32,
    ) -> Result<ModelReply, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.models.lock().unwrap().push(model.to_string());

        let scripted = self.replies.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(content)) => Ok(ModelReply {
                content,
                model: model.to_string(),
                attempts: 1,
            }),
            Some(Err(e)) => Err(e),
            None => Err(GatewayError::Api("mock reply queue exhausted".to_string())),
        }
    }
}

/// A config with real scoring knobs but no pacing, so tests run fast.
pub fn scenario_config() -> Config {
    Config {
        learning_db_url: "postgres://unused".to_string(),
        source_x_db_url: None,
        source_jike_db_url: None,
        openai_api_key: "test-key".to_string(),
        openai_base_url: None,
        fast_model: "fast-model".to_string(),
        smart_models: vec!["smart-a".to_string(), "smart-b".to_string()],
        max_tokens: 1000,
        notion_token: None,
        notion_parent_page_id: None,
        processing: ProcessingConfig {
            fast_delay: Duration::ZERO,
            smart_delay: Duration::ZERO,
            smart_retry_delay: Duration::ZERO,
            ..ProcessingConfig::default()
        },
    }
}
