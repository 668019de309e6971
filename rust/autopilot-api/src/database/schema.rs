//! SQLite schema and column helpers.
//!
//! Entity tables keep the full serialized object in a `data` JSON column and
//! duplicate the fields that queries filter on. Timestamps are stored as
//! fixed-width RFC 3339 UTC strings so lexical order matches time order.

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};

/// SQLite schema, applied at startup.
pub const SQLITE_SCHEMA: &str = r"
-- Projects
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    data JSON NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_projects_tenant ON projects(tenant_id, created_at);

-- Articles (work items)
CREATE TABLE IF NOT EXISTS articles (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    status TEXT NOT NULL,
    schedule_id TEXT,
    created_at TEXT NOT NULL,
    data JSON NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_articles_project ON articles(tenant_id, project_id, created_at);
CREATE INDEX IF NOT EXISTS idx_articles_schedule ON articles(schedule_id) WHERE schedule_id IS NOT NULL;

-- Generated content
CREATE TABLE IF NOT EXISTS contents (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    article_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    data JSON NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_contents_article ON contents(article_id);

-- Autopilot schedules
CREATE TABLE IF NOT EXISTS schedules (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    is_active BOOLEAN NOT NULL,
    next_run_at TEXT NOT NULL,
    claimed_until TEXT,
    created_at TEXT NOT NULL,
    data JSON NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_schedules_tenant ON schedules(tenant_id, created_at);
CREATE INDEX IF NOT EXISTS idx_schedules_due ON schedules(is_active, next_run_at);

-- Credit balances, one row per tenant
CREATE TABLE IF NOT EXISTS credit_balances (
    tenant_id TEXT PRIMARY KEY,
    subscription_credits INTEGER NOT NULL DEFAULT 0 CHECK (subscription_credits >= 0),
    top_up_credits INTEGER NOT NULL DEFAULT 0 CHECK (top_up_credits >= 0),
    total_credits_used INTEGER NOT NULL DEFAULT 0,
    is_unlimited BOOLEAN NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

-- Credit journal (append-only)
CREATE TABLE IF NOT EXISTS credit_transactions (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    amount INTEGER NOT NULL,
    transaction_type TEXT NOT NULL,
    description TEXT NOT NULL,
    balance_after INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_credit_tx_tenant ON credit_transactions(tenant_id, created_at DESC);
";

/// Format a timestamp for storage.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
pub fn parse_ts(value: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp '{value}'"))
}
