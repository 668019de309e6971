//! Generate and publish calls made by the run executor.
//!
//! The executor talks to the content service through this trait. In
//! production that is [`HttpContentPipeline`], which calls this service's own
//! internal endpoints over loopback HTTP.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{PublishOutcome, Schedule};
use crate::error::UpstreamError;
use crate::retry::RetryPolicy;

/// Generate/publish operations for one work item.
#[async_trait]
pub trait ContentPipeline: Send + Sync {
    /// Generate content for `article_id`, returning the new content id.
    async fn generate(&self, schedule: &Schedule, article_id: &str) -> anyhow::Result<String>;

    /// Publish previously generated content to the project's targets.
    async fn publish(&self, schedule: &Schedule, content_id: &str)
    -> anyhow::Result<PublishOutcome>;
}

/// Body of `POST /api/internal/content/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalGenerateRequest {
    pub tenant_id: String,
    pub article_id: String,
    pub project_id: String,
    pub schedule_id: Option<String>,
}

/// Response of `POST /api/internal/content/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalGenerateResponse {
    pub content_id: String,
}

/// Body of `POST /api/internal/content/publish`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalPublishRequest {
    pub tenant_id: String,
    pub content_id: String,
    pub project_id: String,
    #[serde(default)]
    pub platforms: Vec<String>,
}

const SERVICE: &str = "content service";

/// Loopback HTTP implementation authenticated with the cron secret.
#[derive(Debug, Clone)]
pub struct HttpContentPipeline {
    client: reqwest::Client,
    base_url: String,
    cron_secret: Option<String>,
    retry: RetryPolicy,
}

impl HttpContentPipeline {
    pub fn new(
        base_url: impl Into<String>,
        cron_secret: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build internal HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cron_secret,
            retry,
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, UpstreamError>
    where
        B: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(secret) = &self.cron_secret {
            request = request.bearer_auth(secret);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;
        if !response.status().is_success() {
            return Err(UpstreamError::from_response(SERVICE, response).await);
        }
        response
            .json::<R>()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))
    }
}

#[async_trait]
impl ContentPipeline for HttpContentPipeline {
    async fn generate(&self, schedule: &Schedule, article_id: &str) -> anyhow::Result<String> {
        let body = InternalGenerateRequest {
            tenant_id: schedule.tenant_id.clone(),
            article_id: article_id.to_string(),
            project_id: schedule.project_id.clone(),
            schedule_id: Some(schedule.id.clone()),
        };

        // Generation is not idempotent, so only connection failures are retried.
        let response: InternalGenerateResponse = self
            .retry
            .run(
                "internal generate",
                |e: &UpstreamError| matches!(e, UpstreamError::Transport { .. }),
                || self.post("/api/internal/content/generate", &body),
            )
            .await?;
        Ok(response.content_id)
    }

    async fn publish(
        &self,
        schedule: &Schedule,
        content_id: &str,
    ) -> anyhow::Result<PublishOutcome> {
        let body = InternalPublishRequest {
            tenant_id: schedule.tenant_id.clone(),
            content_id: content_id.to_string(),
            project_id: schedule.project_id.clone(),
            platforms: schedule.platforms.clone(),
        };

        let outcome = self
            .retry
            .run(
                "internal publish",
                |e: &UpstreamError| matches!(e, UpstreamError::Transport { .. }),
                || self.post("/api/internal/content/publish", &body),
            )
            .await?;
        Ok(outcome)
    }
}
