//! Ayrshare-compatible social posting client.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;
use crate::retry::RetryPolicy;

const SERVICE: &str = "social";

#[derive(Debug, Clone, Serialize)]
pub struct SocialPost {
    pub post: String,
    pub platforms: Vec<String>,
}

/// Per-platform result of one post request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialPostResult {
    /// Platform name to `"success"` or `"failed"`.
    pub statuses: BTreeMap<String, String>,
    pub errors: BTreeMap<String, String>,
}

#[async_trait]
pub trait SocialPublisher: Send + Sync {
    async fn post(&self, profile_key: &str, post: &SocialPost)
    -> Result<SocialPostResult, UpstreamError>;
}

#[derive(Clone)]
pub struct AyrshareClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for AyrshareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AyrshareClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl AyrshareClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create social HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            retry,
        })
    }

    async fn post_once(
        &self,
        api_key: &str,
        profile_key: &str,
        post: &SocialPost,
    ) -> Result<SocialPostResult, UpstreamError> {
        let response = self
            .client
            .post(format!("{}/api/post", self.base_url))
            .bearer_auth(api_key)
            .header("Profile-Key", profile_key)
            .json(post)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;

        // Ayrshare reports per-platform failures with a 400 and a JSON body;
        // only other statuses are request-level failures.
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::BAD_REQUEST {
            return Err(UpstreamError::from_response(SERVICE, response).await);
        }

        let body: AyrshareResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;
        Ok(body.into_result(&post.platforms))
    }
}

#[async_trait]
impl SocialPublisher for AyrshareClient {
    async fn post(
        &self,
        profile_key: &str,
        post: &SocialPost,
    ) -> Result<SocialPostResult, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured { service: SERVICE })?;

        self.retry
            .run(
                "social post",
                |e: &UpstreamError| matches!(e, UpstreamError::Transport { .. }),
                || self.post_once(api_key, profile_key, post),
            )
            .await
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AyrshareResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    post_ids: Vec<AyrsharePostId>,
    #[serde(default)]
    errors: Vec<AyrshareError>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AyrsharePostId {
    platform: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct AyrshareError {
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    message: String,
}

impl AyrshareResponse {
    /// Every requested platform ends up in `statuses`; platforms the
    /// response does not confirm are failed.
    fn into_result(self, requested: &[String]) -> SocialPostResult {
        let mut result = SocialPostResult::default();

        for id in self.post_ids {
            let ok = id.status.is_empty() || id.status == "success";
            result
                .statuses
                .insert(id.platform, if ok { "success" } else { "failed" }.to_string());
        }
        for err in self.errors {
            if let Some(platform) = err.platform {
                result.statuses.insert(platform.clone(), "failed".to_string());
                result.errors.insert(platform, err.message);
            }
        }

        let fallback = self
            .message
            .unwrap_or_else(|| format!("post status '{}'", self.status));
        for platform in requested {
            let status = result
                .statuses
                .entry(platform.clone())
                .or_insert_with(|| "failed".to_string());
            if *status == "failed" {
                result
                    .errors
                    .entry(platform.clone())
                    .or_insert_with(|| fallback.clone());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platforms(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_all_platforms_succeed() {
        let raw = r#"{"status":"success","postIds":[{"platform":"twitter","status":"success","id":"1"},{"platform":"linkedin","status":"success","id":"2"}]}"#;
        let body: AyrshareResponse = serde_json::from_str(raw).unwrap();
        let result = body.into_result(&platforms(&["twitter", "linkedin"]));
        assert_eq!(result.statuses["twitter"], "success");
        assert_eq!(result.statuses["linkedin"], "success");
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_partial_failure() {
        let raw = r#"{"status":"error","postIds":[{"platform":"twitter","status":"success"}],"errors":[{"platform":"linkedin","message":"token expired","code":156}]}"#;
        let body: AyrshareResponse = serde_json::from_str(raw).unwrap();
        let result = body.into_result(&platforms(&["twitter", "linkedin"]));
        assert_eq!(result.statuses["twitter"], "success");
        assert_eq!(result.statuses["linkedin"], "failed");
        assert_eq!(result.errors["linkedin"], "token expired");
    }

    #[test]
    fn test_unconfirmed_platform_is_failed() {
        let raw = r#"{"status":"error","message":"Profile not linked"}"#;
        let body: AyrshareResponse = serde_json::from_str(raw).unwrap();
        let result = body.into_result(&platforms(&["facebook"]));
        assert_eq!(result.statuses["facebook"], "failed");
        assert_eq!(result.errors["facebook"], "Profile not linked");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = AyrshareClient::new(
            "https://app.ayrshare.com",
            None,
            Duration::from_secs(1),
            RetryPolicy::none(),
        )
        .unwrap();
        let post = SocialPost {
            post: "hi".into(),
            platforms: platforms(&["twitter"]),
        };
        assert!(matches!(
            client.post("profile", &post).await,
            Err(UpstreamError::NotConfigured { .. })
        ));
    }
}
