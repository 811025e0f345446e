//! `keel history <release>`: recorded revisions, most recent first.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use keel_core::{ReleaseName, ReleaseRecord};

use super::{format_age, parse_release_name, Session};

/// Arguments for `keel history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[arg(value_parser = parse_release_name)]
    pub release: ReleaseName,

    /// Show at most N revisions (default: `history_max` from config).
    #[arg(long, value_name = "N")]
    pub max: Option<usize>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "revision")]
    revision: u64,
    #[tabled(rename = "updated")]
    updated: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "checksum")]
    checksum: String,
    #[tabled(rename = "description")]
    description: String,
}

impl From<&ReleaseRecord> for HistoryRow {
    fn from(record: &ReleaseRecord) -> Self {
        Self {
            revision: record.revision.0,
            updated: format!(
                "{} ({})",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                format_age(record.timestamp)
            ),
            status: record.status.to_string(),
            checksum: record.checksum.chars().take(12).collect(),
            description: record.description.clone(),
        }
    }
}

impl HistoryArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let release = self.release;
        let limit = self.max.unwrap_or(session.config.history_max);
        let records = session.manager().history(&release, Some(limit))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&records)
                    .context("failed to serialize history JSON")?
            );
            return Ok(());
        }

        println!("{}", format!("RELEASE {release}").bold());
        let rows: Vec<HistoryRow> = records.iter().map(HistoryRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        if let Some(failure) = records.first().and_then(|r| r.failure.as_ref()) {
            println!(
                "{} latest revision failed at `{}`: {}",
                "✗".red().bold(),
                failure.operation,
                failure.error
            );
        }
        Ok(())
    }
}
