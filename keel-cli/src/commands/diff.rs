//! `keel diff <release> <file>`: show what an upgrade would do. Applies nothing.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use keel_core::ReleaseName;

use super::{load_spec, parse_release_name, Session};

/// Arguments for `keel diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[arg(value_parser = parse_release_name)]
    pub release: ReleaseName,

    /// Candidate release description (YAML).
    pub file: PathBuf,
}

impl DiffArgs {
    pub async fn run(self, session: &Session) -> Result<()> {
        let release = self.release;
        let spec = load_spec(&self.file, Some(&release))?;
        let diff = session.manager().diff(&spec).await?;

        print!("{}", diff.plan);
        if diff.unified_diff.is_empty() {
            match diff.base_revision {
                Some(revision) => println!("No spec changes since revision {revision}."),
                None => println!("Release '{release}' is not installed."),
            }
            return Ok(());
        }

        println!();
        for line in diff.unified_diff.lines() {
            let line = if line.starts_with("+++") || line.starts_with("---") {
                line.bold()
            } else if line.starts_with('+') {
                line.green()
            } else if line.starts_with('-') {
                line.red()
            } else if line.starts_with("@@") {
                line.cyan()
            } else {
                line.normal()
            };
            println!("{line}");
        }
        Ok(())
    }
}
