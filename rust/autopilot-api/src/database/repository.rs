//! Repository traits.
//!
//! Handlers and the scheduler depend on these traits rather than on a
//! concrete store. Every read and write is scoped by tenant except the
//! due-schedule scan, which runs on behalf of the system.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Article, Content, CreditBalance, CreditGrant, CreditTransaction, GrantOutcome, Project,
    Schedule, TransactionType,
};

/// A schedule that is ready to run, joined with its project.
#[derive(Debug, Clone)]
pub struct DueSchedule {
    pub schedule: Schedule,
    pub project: Project,
}

/// Repository trait for project operations.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create_project(&self, project: &Project) -> anyhow::Result<()>;

    async fn get_project(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Project>>;

    async fn list_projects(&self, tenant_id: &str) -> anyhow::Result<Vec<Project>>;

    async fn update_project(&self, project: &Project) -> anyhow::Result<()>;

    /// Returns `false` when nothing matched.
    async fn delete_project(&self, tenant_id: &str, id: &str) -> anyhow::Result<bool>;
}

/// Repository trait for article (work item) operations.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn create_article(&self, article: &Article) -> anyhow::Result<()>;

    async fn get_article(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Article>>;

    async fn list_articles(&self, tenant_id: &str, project_id: &str)
    -> anyhow::Result<Vec<Article>>;

    async fn update_article(&self, article: &Article) -> anyhow::Result<()>;

    async fn delete_article(&self, tenant_id: &str, id: &str) -> anyhow::Result<bool>;
}

/// Repository trait for generated content.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn create_content(&self, content: &Content) -> anyhow::Result<()>;

    async fn get_content(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Content>>;

    async fn update_content(&self, content: &Content) -> anyhow::Result<()>;
}

/// Repository trait for autopilot schedules.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create_schedule(&self, schedule: &Schedule) -> anyhow::Result<()>;

    async fn get_schedule(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Schedule>>;

    async fn list_schedules(&self, tenant_id: &str) -> anyhow::Result<Vec<Schedule>>;

    /// Whole-row write, including `claimed_until`.
    async fn update_schedule(&self, schedule: &Schedule) -> anyhow::Result<()>;

    async fn delete_schedule(&self, tenant_id: &str, id: &str) -> anyhow::Result<bool>;

    /// Active, unclaimed schedules with `next_run_at <= now`, oldest first,
    /// joined with their project. Schedules whose project is gone are skipped.
    async fn list_due_schedules(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<DueSchedule>>;

    /// Take the run lease until `until` unless another run holds it at `now`.
    ///
    /// Returns `false` when the schedule is missing, inactive or already claimed.
    async fn claim_schedule(
        &self,
        id: &str,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
}

/// Repository trait for the credit ledger.
///
/// Debits and grants are atomic: the balance change and the journal entry
/// are written together or not at all. Debit failures caused by the ledger
/// rules surface as [`crate::domain::LedgerError`] inside the `anyhow` error.
#[async_trait]
pub trait CreditRepository: Send + Sync {
    /// Current balance, creating a zero balance on first access.
    async fn get_balance(&self, tenant_id: &str) -> anyhow::Result<CreditBalance>;

    async fn apply_debit(
        &self,
        tenant_id: &str,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
    ) -> anyhow::Result<CreditTransaction>;

    /// Apply the flag change and the credit of `grant` in one transaction.
    async fn apply_grant(&self, tenant_id: &str, grant: &CreditGrant)
    -> anyhow::Result<GrantOutcome>;

    /// Newest first.
    async fn list_transactions(
        &self,
        tenant_id: &str,
        limit: usize,
        offset: usize,
    ) -> anyhow::Result<Vec<CreditTransaction>>;
}
