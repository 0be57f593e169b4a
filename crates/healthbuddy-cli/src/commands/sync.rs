//! Sync command - Drain the outbound queue now
//!
//! Provides the `healthbuddy sync` CLI command which checks the remote and,
//! when it is reachable, runs one manual drain cycle (bypassing any backoff
//! window) and reports what happened.

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use healthbuddy_sync::{DrainOutcome, DrainTrigger};

use super::AppContext;
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let parts = ctx.engine(CancellationToken::new()).await?;
        let coordinator = parts.engine.coordinator();

        info!("Manual sync requested");
        let report = coordinator.drain(DrainTrigger::Manual).await;
        let remaining = coordinator.status().await?.pending_count;

        if format.is_json() {
            let mut json = serde_json::to_value(&report)?;
            json["remaining"] = serde_json::json!(remaining);
            formatter.print_json(&json);
            parts.pool.close().await;
            return Ok(());
        }

        match &report.outcome {
            DrainOutcome::Offline => formatter.error(&format!(
                "{} is unreachable; {} operation{} stay queued",
                ctx.config.remote.base_url,
                remaining,
                plural(remaining)
            )),
            DrainOutcome::Completed if report.attempted == 0 => {
                formatter.success("Already up to date")
            }
            DrainOutcome::Completed => formatter.success(&format!(
                "Synced {} operation{}",
                report.succeeded,
                plural(u64::from(report.succeeded))
            )),
            DrainOutcome::BackedOff { until } => formatter.warn(&format!(
                "Remote failed temporarily; next automatic attempt after {}",
                until.format("%Y-%m-%d %H:%M:%S")
            )),
            DrainOutcome::ConnectivityLost => formatter.warn("Connectivity lost during sync"),
            DrainOutcome::StorageFailure { message } => {
                formatter.error(&format!("Local storage failed: {}", message))
            }
            DrainOutcome::AlreadyDraining | DrainOutcome::BackingOff { .. } => {
                formatter.info("Sync already in progress")
            }
        }

        if report.attempted > 0 {
            formatter.info(&format!(
                "Attempted: {}, succeeded: {}, remaining: {}",
                report.attempted, report.succeeded, remaining
            ));
        }

        for notice in &report.evicted {
            formatter.error(&format!(
                "{} {} was dropped ({}): {}",
                notice.method, notice.target, notice.reason, notice.last_error
            ));
        }

        parts.pool.close().await;
        Ok(())
    }
}
