//! Status command - Display sync status
//!
//! Provides the `healthbuddy status` CLI command which:
//! 1. Opens the local store and checks the remote once
//! 2. Shows the sync indicator, connectivity and pending operation count
//! 3. Lists mirror entries still awaiting reconciliation

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use healthbuddy_core::ports::IMirrorStore;

use super::AppContext;
use crate::output::{get_formatter, indicator_badge, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Also list every entry awaiting reconciliation
    #[arg(long)]
    pub pending: bool,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let parts = ctx.engine(CancellationToken::new()).await?;

        let status = parts
            .engine
            .coordinator()
            .status()
            .await
            .context("Failed to read sync status")?;
        let pending_entries = parts
            .store
            .list_pending()
            .await
            .context("Failed to list pending entries")?;

        if format.is_json() {
            let mut json = serde_json::to_value(&status)?;
            json["remote"] = serde_json::json!(ctx.config.remote.base_url);
            json["pending_entries"] = pending_entries
                .iter()
                .map(|e| serde_json::json!(e.entity_id().as_str()))
                .collect();
            formatter.print_json(&json);
        } else {
            formatter.success(&format!(
                "HealthBuddy: {} {}",
                indicator_badge(status.indicator),
                status.indicator
            ));
            formatter.info(&format!(
                "Remote:       {} ({})",
                ctx.config.remote.base_url, status.connectivity
            ));
            formatter.info(&format!(
                "Queue:        {} operation{} pending",
                status.pending_count,
                plural(status.pending_count)
            ));
            formatter.info(&format!(
                "Unreconciled: {} entr{}",
                pending_entries.len(),
                if pending_entries.len() == 1 { "y" } else { "ies" }
            ));

            if self.pending {
                for entry in &pending_entries {
                    formatter.info(&format!(
                        "  - {} (updated {})",
                        entry.entity_id(),
                        entry.last_updated().format("%Y-%m-%d %H:%M:%S")
                    ));
                }
            }
        }

        parts.pool.close().await;
        Ok(())
    }
}
