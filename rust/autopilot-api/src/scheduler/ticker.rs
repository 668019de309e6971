//! In-process cron ticker.
//!
//! Optional replacement for an external cron caller: runs the executor every
//! `interval` until cancelled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::executor::RunExecutor;

/// Spawn the ticker. The first pass runs after one full interval.
///
/// Cancellation is only observed between passes: a pass already running
/// finishes its whole batch before the task exits, so shutdown can wait up to
/// one full run.
pub fn spawn_ticker(
    executor: Arc<RunExecutor>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // interval() fires immediately on the first tick.
        ticker.tick().await;

        tracing::info!(interval_secs = interval.as_secs(), "Autopilot ticker started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Autopilot ticker stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match executor.run_due(Utc::now()).await {
                        Ok(summary) if summary.processed > 0 => {
                            tracing::info!(processed = summary.processed, "Ticker pass complete");
                        }
                        Ok(_) => tracing::debug!("Ticker pass found nothing due"),
                        Err(e) => tracing::error!(error = ?e, "Ticker pass failed"),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteStore;
    use crate::domain::{PublishOutcome, Schedule};
    use crate::scheduler::ContentPipeline;
    use async_trait::async_trait;

    struct NoopPipeline;

    #[async_trait]
    impl ContentPipeline for NoopPipeline {
        async fn generate(&self, _: &Schedule, article_id: &str) -> anyhow::Result<String> {
            Ok(article_id.to_string())
        }

        async fn publish(&self, _: &Schedule, _: &str) -> anyhow::Result<PublishOutcome> {
            Ok(PublishOutcome::default())
        }
    }

    #[tokio::test]
    async fn test_ticker_stops_on_cancel() {
        let store = SqliteStore::in_memory().unwrap();
        let executor = Arc::new(RunExecutor::new(
            Arc::new(store),
            Arc::new(NoopPipeline),
            chrono::Duration::minutes(15),
        ));
        let shutdown = CancellationToken::new();
        let handle = spawn_ticker(executor, Duration::from_millis(10), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(35)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("ticker did not stop")
            .unwrap();
    }
}
