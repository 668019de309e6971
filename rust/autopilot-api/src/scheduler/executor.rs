//! Run executor.
//!
//! Picks up due schedules one at a time, works through each schedule's next
//! batch sequentially and writes the run result back as one row.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::next_run::compute_next_run;
use super::pipeline::ContentPipeline;
use crate::database::{DueSchedule, ScheduleRepository};
use crate::domain::{Frequency, Project, Schedule};

/// Per-schedule entry in a cron response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScheduleRunResult {
    #[serde(rename_all = "camelCase")]
    Completed {
        schedule_id: String,
        schedule_name: String,
        processed: u32,
        successful: u32,
        failed: u32,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        schedule_id: String,
        schedule_name: String,
        error: String,
    },
}

/// Body of the cron trigger response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CronSummary {
    pub success: bool,
    /// Number of schedules examined.
    pub processed: usize,
    pub results: Vec<ScheduleRunResult>,
}

#[derive(Debug, Default)]
struct RunTally {
    processed: u32,
    successful: u32,
    failed: u32,
    errors: Vec<String>,
}

/// Executes due schedules.
#[derive(Clone)]
pub struct RunExecutor {
    schedules: Arc<dyn ScheduleRepository>,
    pipeline: Arc<dyn ContentPipeline>,
    lease: chrono::Duration,
}

impl std::fmt::Debug for RunExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunExecutor")
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

impl RunExecutor {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        pipeline: Arc<dyn ContentPipeline>,
        lease: chrono::Duration,
    ) -> Self {
        Self {
            schedules,
            pipeline,
            lease,
        }
    }

    /// Run every schedule due at `now`.
    ///
    /// Fails only when the due schedules cannot be listed; per-schedule
    /// failures are reported in the summary.
    pub async fn run_due(&self, now: DateTime<Utc>) -> anyhow::Result<CronSummary> {
        let due = self.schedules.list_due_schedules(now).await?;
        tracing::info!(count = due.len(), "Processing due autopilot schedules");

        let mut results = Vec::with_capacity(due.len());
        for item in due {
            results.push(self.run_schedule(item, now).await);
        }

        Ok(CronSummary {
            success: true,
            processed: results.len(),
            results,
        })
    }

    /// [`Self::run_due`] on its own task. A caller that stops waiting, such
    /// as a timed-out HTTP request, does not cut the batch short.
    pub async fn run_due_detached(self: Arc<Self>, now: DateTime<Utc>) -> anyhow::Result<CronSummary> {
        tokio::spawn(async move { self.run_due(now).await })
            .await
            .context("Autopilot run task failed")?
    }

    /// [`Self::run_schedule`] on its own task.
    pub async fn run_schedule_detached(
        self: Arc<Self>,
        due: DueSchedule,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ScheduleRunResult> {
        tokio::spawn(async move { self.run_schedule(due, now).await })
            .await
            .context("Schedule run task failed")
    }

    /// Claim and run one schedule, regardless of `next_run_at`.
    pub async fn run_schedule(&self, due: DueSchedule, now: DateTime<Utc>) -> ScheduleRunResult {
        let DueSchedule { schedule, project } = due;
        let schedule_id = schedule.id.clone();
        let schedule_name = schedule.name.clone();

        match self
            .schedules
            .claim_schedule(&schedule.id, now, now + self.lease)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(schedule_id = %schedule_id, "Schedule already claimed, skipping");
                return ScheduleRunResult::Failed {
                    schedule_id,
                    schedule_name,
                    error: "Schedule is already being processed".to_string(),
                };
            }
            Err(e) => {
                tracing::error!(schedule_id = %schedule_id, error = ?e, "Failed to claim schedule");
                return ScheduleRunResult::Failed {
                    schedule_id,
                    schedule_name,
                    error: format!("Failed to claim schedule: {e}"),
                };
            }
        }

        let started = Instant::now();
        match self.execute(schedule.clone(), &project, now).await {
            Ok(tally) => {
                tracing::info!(
                    schedule_id = %schedule_id,
                    tenant_id = %schedule.tenant_id,
                    processed = tally.processed,
                    successful = tally.successful,
                    failed = tally.failed,
                    duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Schedule run finished"
                );
                ScheduleRunResult::Completed {
                    schedule_id,
                    schedule_name,
                    processed: tally.processed,
                    successful: tally.successful,
                    failed: tally.failed,
                }
            }
            Err(e) => {
                let error = format!("{e:#}");
                tracing::error!(schedule_id = %schedule_id, error = %error, "Schedule run failed");
                self.record_failure(schedule, now, &error).await;
                ScheduleRunResult::Failed {
                    schedule_id,
                    schedule_name,
                    error,
                }
            }
        }
    }

    async fn execute(
        &self,
        mut schedule: Schedule,
        project: &Project,
        now: DateTime<Utc>,
    ) -> anyhow::Result<RunTally> {
        let batch = schedule.next_batch();

        if batch.is_empty() {
            if schedule.frequency.is_one_off() {
                tracing::info!(schedule_id = %schedule.id, "One-off schedule exhausted, deactivating");
                schedule.is_active = false;
            } else {
                // Recurring schedules start over from the top of their list.
                schedule.processed_article_ids.clear();
                schedule.next_run_at = compute_next_run(&schedule, now);
            }
            schedule.claimed_until = None;
            schedule.updated_at = now;
            self.schedules.update_schedule(&schedule).await?;
            return Ok(RunTally::default());
        }

        let publish_enabled = schedule.auto_publish
            && (project.has_wordpress() || (project.has_social() && !schedule.platforms.is_empty()));

        let mut tally = RunTally::default();
        for article_id in &batch {
            tally.processed += 1;
            match self.process_item(&schedule, article_id, publish_enabled).await {
                Ok(()) => tally.successful += 1,
                Err(e) => {
                    tracing::warn!(
                        schedule_id = %schedule.id,
                        article_id = %article_id,
                        error = %e,
                        "Autopilot item failed"
                    );
                    tally.failed += 1;
                    tally.errors.push(format!("{article_id}: {e:#}"));
                }
            }
        }

        schedule.mark_processed(&batch);
        schedule.total_runs += 1;
        schedule.successful_runs += tally.successful;
        schedule.failed_runs += tally.failed;
        schedule.last_run_at = Some(now);
        schedule.last_error = (!tally.errors.is_empty()).then(|| tally.errors.join("; "));

        if schedule.frequency == Frequency::Once && schedule.is_exhausted() {
            schedule.is_active = false;
        } else {
            schedule.next_run_at = compute_next_run(&schedule, now);
        }
        schedule.claimed_until = None;
        schedule.updated_at = now;
        self.schedules.update_schedule(&schedule).await?;

        Ok(tally)
    }

    /// Generate, then publish when enabled. Either failing fails the item.
    async fn process_item(
        &self,
        schedule: &Schedule,
        article_id: &str,
        publish_enabled: bool,
    ) -> anyhow::Result<()> {
        let content_id = self.pipeline.generate(schedule, article_id).await?;
        if !publish_enabled {
            return Ok(());
        }

        let outcome = self.pipeline.publish(schedule, &content_id).await?;
        if !outcome.any_succeeded() {
            anyhow::bail!(
                "publish failed: {}",
                outcome
                    .error_summary()
                    .unwrap_or_else(|| "no target accepted the post".to_string())
            );
        }
        if let Some(summary) = outcome.error_summary() {
            tracing::warn!(
                schedule_id = %schedule.id,
                content_id = %content_id,
                errors = %summary,
                "Published with partial failures"
            );
        }
        Ok(())
    }

    /// Record a whole-schedule failure as one failed run and release the lease.
    async fn record_failure(&self, mut schedule: Schedule, now: DateTime<Utc>, error: &str) {
        schedule.failed_runs += 1;
        schedule.last_error = Some(error.to_string());
        schedule.next_run_at = compute_next_run(&schedule, now);
        schedule.claimed_until = None;
        schedule.updated_at = now;

        if let Err(e) = self.schedules.update_schedule(&schedule).await {
            tracing::error!(
                schedule_id = %schedule.id,
                error = ?e,
                "Failed to record schedule failure; lease expires on its own"
            );
        }
    }
}
