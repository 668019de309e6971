//! OpenAI-compatible chat completion driver.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{LlmDriver, LlmSettings, Message};
use crate::error::UpstreamError;
use crate::retry::RetryPolicy;

const SERVICE: &str = "LLM";

/// OpenAI-compatible API driver.
#[derive(Debug, Clone)]
pub struct OpenAiDriver {
    settings: LlmSettings,
    client: Client,
    retry: RetryPolicy,
}

impl OpenAiDriver {
    pub fn new(settings: LlmSettings, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to create LLM HTTP client")?;

        Ok(Self {
            settings,
            client,
            retry,
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn complete_once(&self, body: &serde_json::Value) -> Result<String, UpstreamError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured { service: SERVICE })?;

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;

        if !response.status().is_success() {
            return Err(UpstreamError::from_response(SERVICE, response).await);
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| UpstreamError::Decode {
                service: SERVICE,
                message: "completion has no message content".to_string(),
            })
    }
}

#[async_trait]
impl LlmDriver for OpenAiDriver {
    async fn complete(&self, messages: &[Message]) -> Result<String, UpstreamError> {
        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "response_format": { "type": "json_object" },
        });

        self.retry
            .run("llm completion", UpstreamError::is_retryable, || {
                self.complete_once(&body)
            })
            .await
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
