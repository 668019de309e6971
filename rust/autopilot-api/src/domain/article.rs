//! Article (work item) types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    /// Planned but not attached to any schedule run.
    Planned,
    /// Waiting for a schedule to pick it up.
    Queued,
    /// Content generation in progress.
    Writing,
    /// Content generated, not yet published.
    Completed,
    /// Published to WordPress.
    Published,
    /// Generation failed.
    Failed,
}

impl ArticleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Queued => "queued",
            Self::Writing => "writing",
            Self::Completed => "completed",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    /// The single transition table for article statuses.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ArticleStatus::{Completed, Failed, Planned, Published, Queued, Writing};
        matches!(
            (self, next),
            (Planned, Queued | Writing)
                | (Queued, Planned | Writing)
                | (Writing, Completed | Failed)
                | (Completed, Published | Writing)
                | (Published | Failed, Writing)
                | (Failed, Queued)
        )
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArticleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(Self::Planned),
            "queued" => Ok(Self::Queued),
            "writing" => Ok(Self::Writing),
            "completed" => Ok(Self::Completed),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown article status '{other}'")),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("article cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ArticleStatus,
    pub to: ArticleStatus,
}

/// A planned piece of content belonging to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub tenant_id: String,
    pub project_id: String,
    pub title: String,
    pub focus_keyword: String,
    pub outline: Option<String>,
    pub notes: Option<String>,
    pub status: ArticleStatus,
    pub schedule_id: Option<String>,
    pub content_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Create a new article in the `planned` state.
    pub fn new(
        tenant_id: impl Into<String>,
        project_id: impl Into<String>,
        title: impl Into<String>,
        focus_keyword: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            project_id: project_id.into(),
            title: title.into(),
            focus_keyword: focus_keyword.into(),
            outline: None,
            notes: None,
            status: ArticleStatus::Planned,
            schedule_id: None,
            content_id: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, or fail without changing anything.
    pub fn transition(&mut self, next: ArticleStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Start writing. Clears any previous error.
    pub fn start_writing(&mut self) -> Result<(), InvalidTransition> {
        self.transition(ArticleStatus::Writing)?;
        self.last_error = None;
        Ok(())
    }

    /// Start writing at `now`. An article left in `writing` for at least
    /// `stale_after` is taken over, since its writer is gone.
    pub fn start_writing_at(
        &mut self,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<(), InvalidTransition> {
        if self.is_stale_writing(now, stale_after) {
            self.updated_at = now;
        } else {
            self.transition(ArticleStatus::Writing)?;
        }
        self.last_error = None;
        Ok(())
    }

    /// Whether a writer has held this article for at least `stale_after`.
    pub fn is_stale_writing(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.status == ArticleStatus::Writing && now - self.updated_at >= stale_after
    }

    /// Record generated content.
    pub fn complete(&mut self, content_id: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(ArticleStatus::Completed)?;
        self.content_id = Some(content_id.into());
        Ok(())
    }

    /// Mark generation as failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(ArticleStatus::Failed)?;
        self.last_error = Some(error.into());
        Ok(())
    }

    /// Whether the article is in a terminal-for-now state.
    pub fn is_done(&self) -> bool {
        matches!(self.status, ArticleStatus::Published)
    }
}
