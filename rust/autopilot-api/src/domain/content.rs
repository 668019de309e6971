//! Generated content and publish results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Article body produced by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: String,
    pub tenant_id: String,
    pub project_id: String,
    pub article_id: String,
    pub title: String,
    pub html: String,
    pub meta_description: String,
    pub excerpt: String,
    pub wordpress_post_id: Option<i64>,
    pub wordpress_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    pub fn new(
        tenant_id: impl Into<String>,
        project_id: impl Into<String>,
        article_id: impl Into<String>,
        generated: GeneratedArticle,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            project_id: project_id.into(),
            article_id: article_id.into(),
            title: generated.title,
            html: generated.content,
            meta_description: generated.meta_description,
            excerpt: generated.excerpt,
            wordpress_post_id: None,
            wordpress_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Structured LLM output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArticle {
    pub title: String,
    /// HTML body.
    pub content: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub excerpt: String,
}

/// Result of a publish request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub wordpress_url: Option<String>,
    pub wordpress_error: Option<String>,
    /// Platform name to `"success"` or `"failed"`.
    pub platform_statuses: BTreeMap<String, String>,
    pub platform_errors: BTreeMap<String, String>,
    pub credits_charged: i64,
    pub balance_after: Option<i64>,
}

impl PublishOutcome {
    /// At least one target accepted the post.
    pub fn any_succeeded(&self) -> bool {
        self.wordpress_url.is_some() || self.platform_statuses.values().any(|s| s == "success")
    }

    /// Every attempted target accepted the post.
    pub fn all_succeeded(&self) -> bool {
        self.wordpress_error.is_none() && self.platform_errors.is_empty()
    }

    /// Summary of every failure, for `lastError`.
    pub fn error_summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(err) = &self.wordpress_error {
            parts.push(format!("wordpress: {err}"));
        }
        for (platform, err) in &self.platform_errors {
            parts.push(format!("{platform}: {err}"));
        }
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}
