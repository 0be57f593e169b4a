//! Run command - Keep the sync engine running in the foreground
//!
//! Starts the scheduler and the reachability check, prints notifications
//! (eviction alerts included) as they arrive, and shuts down gracefully on
//! Ctrl+C or SIGTERM.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Seconds between reachability checks
    #[arg(long, default_value_t = 15)]
    pub check_interval: u64,
}

impl RunCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal(signal_token).await;
        });

        let mut parts = ctx.engine(shutdown.clone()).await?;
        let mut notifications = parts.engine.notifications();

        let Some(scheduler) = parts.engine.take_scheduler() else {
            anyhow::bail!("Scheduler already started");
        };
        let scheduler_task = tokio::spawn(scheduler.run());
        let check_task = tokio::spawn(
            parts
                .reachability
                .clone()
                .run(Duration::from_secs(self.check_interval.max(1)), shutdown.clone()),
        );

        formatter.success(&format!(
            "Syncing with {} (Ctrl+C to stop)",
            ctx.config.remote.base_url
        ));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = notifications.recv() => match received {
                    Ok(notification) if format.is_json() => {
                        formatter.print_json(&serde_json::to_value(&notification)?);
                    }
                    Ok(notification) => {
                        formatter.warn(&format!("{}: {}", notification.title, notification.body));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Notification subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        for (name, task) in [("scheduler", scheduler_task), ("reachability", check_task)] {
            if let Err(e) = task.await {
                error!(task = name, error = %e, "Task ended abnormally");
            }
        }

        parts.pool.close().await;
        info!("HealthBuddy sync stopped");
        formatter.success("Stopped");
        Ok(())
    }
}

/// Cancels `token` on SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}
