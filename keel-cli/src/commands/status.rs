//! `keel status <release>`: recorded revision, lifecycle phase and live drift.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use keel_core::{LiveComponent, ReleaseName};
use keel_release::{ReleasePhase, ReleaseStatusReport};

use super::{format_age, parse_release_name, Session};

/// Arguments for `keel status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(value_parser = parse_release_name)]
    pub release: ReleaseName,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "component")]
    name: String,
    #[tabled(rename = "image")]
    image: String,
    #[tabled(rename = "ready")]
    ready: String,
    #[tabled(rename = "exposure")]
    exposure: String,
    #[tabled(rename = "ports")]
    ports: String,
}

impl From<&LiveComponent> for ComponentRow {
    fn from(c: &LiveComponent) -> Self {
        Self {
            name: c.name.to_string(),
            image: c.image.clone(),
            ready: format!("{}/{}", c.ready_replicas, c.replicas),
            exposure: c.exposure.to_string(),
            ports: c
                .ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl StatusArgs {
    pub async fn run(self, session: &Session) -> Result<()> {
        let release = self.release;
        let report = session.manager().status(&release).await?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &ReleaseStatusReport) {
    let record = &report.record;
    println!(
        "{} | revision {} | {} | updated {}",
        record.spec.name.to_string().bold(),
        record.revision,
        phase_label(report.phase),
        format_age(record.timestamp),
    );
    if let Some(failure) = &record.failure {
        println!("  failed at `{}`: {}", failure.operation, failure.error);
    }

    if report.live.is_empty() {
        println!("No live components.");
    } else {
        let rows: Vec<ComponentRow> = report.live.components.iter().map(ComponentRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if report.is_converged() {
        println!("{} live state matches revision {}", "✓".green().bold(), record.revision);
    } else if !report.drift.is_empty() {
        println!("{} drift from revision {}:", "!".yellow().bold(), record.revision);
        print!("{}", report.drift);
    } else {
        println!("{} waiting for replicas to become ready", "…".yellow());
    }
}

fn phase_label(phase: ReleasePhase) -> String {
    let label = phase.to_string().to_uppercase();
    match phase {
        ReleasePhase::Active => label.green().bold().to_string(),
        ReleasePhase::Failed => label.red().bold().to_string(),
        ReleasePhase::Absent => label.bright_black().to_string(),
        _ => label.yellow().bold().to_string(),
    }
}
