//! Queue command - Inspect and manage the outbound queue
//!
//! Provides the `healthbuddy queue` CLI command which:
//! 1. Lists pending operations in dispatch order
//! 2. Discards every pending operation (user-initiated, needs `--yes`)

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::warn;

use healthbuddy_core::ports::IOutboundQueue;

use super::AppContext;
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// List pending operations in dispatch order
    List,
    /// Discard all pending operations; their local changes stay unsynced
    Clear {
        /// Confirm discarding the operations
        #[arg(long)]
        yes: bool,
    },
}

impl QueueCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        match self {
            QueueCommand::List => self.execute_list(ctx, format).await,
            QueueCommand::Clear { yes } => self.execute_clear(ctx, *yes, format).await,
        }
    }

    async fn execute_list(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let (pool, store) = ctx.open_store().await?;

        let operations = store
            .peek_ordered()
            .await
            .context("Failed to read outbound queue")?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&operations)?);
        } else if operations.is_empty() {
            formatter.success("Outbound queue is empty");
        } else {
            formatter.success(&format!(
                "{} pending operation{}",
                operations.len(),
                plural(operations.len() as u64)
            ));
            for op in &operations {
                formatter.info(&format!(
                    "#{:<5} {:<6} {:<24} {} retr{} (queued {})",
                    op.queue_id(),
                    op.method(),
                    op.target(),
                    op.retry_count(),
                    if op.retry_count() == 1 { "y" } else { "ies" },
                    op.enqueued_at().format("%Y-%m-%d %H:%M:%S")
                ));
                if let Some(error) = op.last_error() {
                    formatter.info(&format!("        last error: {}", error));
                }
            }
        }

        pool.close().await;
        Ok(())
    }

    async fn execute_clear(&self, ctx: &AppContext, yes: bool, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        if !yes {
            formatter.warn("This discards every unsynced change. Re-run with --yes to confirm.");
            return Ok(());
        }

        let (pool, store) = ctx.open_store().await?;
        let removed = store.clear().await.context("Failed to clear queue")?;
        warn!(removed, "Outbound queue cleared by user");

        if format.is_json() {
            formatter.print_json(&serde_json::json!({ "removed": removed }));
        } else {
            formatter.success(&format!(
                "Discarded {} operation{}",
                removed,
                plural(removed)
            ));
        }

        pool.close().await;
        Ok(())
    }
}
