//! Mirror command - Inspect locally mirrored entities

use anyhow::{Context, Result};
use clap::Subcommand;

use healthbuddy_core::domain::newtypes::{EntityId, EntityKind};
use healthbuddy_core::domain::MirrorEntry;
use healthbuddy_core::ports::{EntryFilter, IMirrorStore};

use super::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum MirrorCommand {
    /// Show one entry, e.g. `profile` or `meal:<id>`
    Show {
        entity_id: EntityId,
    },
    /// List entries, newest first
    List {
        /// Only this kind (profile, goals, meal, hydration, biometric)
        #[arg(long)]
        kind: Option<EntityKind>,
        /// Only entries awaiting reconciliation
        #[arg(long)]
        pending: bool,
        /// Maximum number of entries
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

impl MirrorCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let (pool, store) = ctx.open_store().await?;

        match self {
            MirrorCommand::Show { entity_id } => {
                let entry = store
                    .get(entity_id)
                    .await
                    .context("Failed to read mirror")?;
                match entry {
                    Some(entry) if format.is_json() => {
                        formatter.print_json(&serde_json::to_value(&entry)?)
                    }
                    Some(entry) => {
                        formatter.success(&describe(&entry));
                        let pretty = serde_json::to_string_pretty(entry.value())?;
                        for line in pretty.lines() {
                            formatter.info(line);
                        }
                    }
                    None => formatter.error(&format!("No local value for {}", entity_id)),
                }
            }
            MirrorCommand::List {
                kind,
                pending,
                limit,
            } => {
                let mut filter = EntryFilter::new().with_limit(*limit);
                if let Some(kind) = kind {
                    filter = filter.with_kind(*kind);
                }
                if *pending {
                    filter = filter.pending();
                }

                let entries = store.list(&filter).await.context("Failed to list mirror")?;
                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&entries)?);
                } else if entries.is_empty() {
                    formatter.info("No entries");
                } else {
                    for entry in &entries {
                        formatter.info(&describe(entry));
                    }
                }
            }
        }

        pool.close().await;
        Ok(())
    }
}

fn describe(entry: &MirrorEntry) -> String {
    format!(
        "{} [{}] updated {}",
        entry.entity_id(),
        if entry.pending_sync() { "pending" } else { "synced" },
        entry.last_updated().format("%Y-%m-%d %H:%M:%S")
    )
}
