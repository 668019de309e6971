//! Projects and their publish targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// WordPress application-password credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPressCredentials {
    pub base_url: String,
    pub username: String,
    pub app_password: String,
}

impl std::fmt::Debug for WordPressCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPressCredentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("app_password", &"[REDACTED]")
            .finish()
    }
}

/// A tenant's site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub language: String,
    pub wordpress: Option<WordPressCredentials>,
    /// Social-posting profile key.
    pub social_profile_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            language: "en".to_string(),
            wordpress: None,
            social_profile_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_wordpress(&self) -> bool {
        self.wordpress.is_some()
    }

    pub fn has_social(&self) -> bool {
        self.social_profile_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }
}
