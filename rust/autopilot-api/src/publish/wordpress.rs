//! WordPress REST client.
//!
//! Posts are created with `POST {base}/wp-json/wp/v2/posts` using an
//! application password over basic auth.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::WordPressCredentials;
use crate::error::UpstreamError;
use crate::retry::RetryPolicy;

const SERVICE: &str = "WordPress";

/// Body of a post creation request.
#[derive(Debug, Clone, Serialize)]
pub struct WordPressPost {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    /// `publish` or `draft`.
    pub status: String,
}

/// The created post.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishedPost {
    pub id: i64,
    pub link: String,
}

#[async_trait]
pub trait WordPressPublisher: Send + Sync {
    async fn create_post(
        &self,
        credentials: &WordPressCredentials,
        post: &WordPressPost,
    ) -> Result<PublishedPost, UpstreamError>;
}

#[derive(Debug, Clone)]
pub struct WordPressClient {
    client: Client,
    retry: RetryPolicy,
}

impl WordPressClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create WordPress HTTP client")?;
        Ok(Self { client, retry })
    }

    async fn create_once(
        &self,
        url: &str,
        credentials: &WordPressCredentials,
        post: &WordPressPost,
    ) -> Result<PublishedPost, UpstreamError> {
        let response = self
            .client
            .post(url)
            .basic_auth(&credentials.username, Some(&credentials.app_password))
            .json(post)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;

        if !response.status().is_success() {
            return Err(UpstreamError::from_response(SERVICE, response).await);
        }
        response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))
    }
}

pub(crate) fn posts_url(base_url: &str) -> String {
    format!("{}/wp-json/wp/v2/posts", base_url.trim_end_matches('/'))
}

#[async_trait]
impl WordPressPublisher for WordPressClient {
    async fn create_post(
        &self,
        credentials: &WordPressCredentials,
        post: &WordPressPost,
    ) -> Result<PublishedPost, UpstreamError> {
        let url = posts_url(&credentials.base_url);
        // A timed-out create may still have landed; only retry what never
        // reached the server or was explicitly throttled.
        self.retry
            .run(
                "wordpress create post",
                |e: &UpstreamError| match e {
                    UpstreamError::Transport { .. } => true,
                    UpstreamError::Http { status, .. } => *status == 429 || *status == 503,
                    _ => false,
                },
                || self.create_once(&url, credentials, post),
            )
            .await
    }
}
