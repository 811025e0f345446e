//! `keel upgrade <release> <file>`

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use keel_core::ReleaseName;

use super::{load_spec, parse_release_name, print_recorded, Session};

/// Arguments for `keel upgrade`.
#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Release to upgrade; must match the `name` in the file.
    #[arg(value_parser = parse_release_name)]
    pub release: ReleaseName,

    /// New release description (YAML).
    pub file: PathBuf,
}

impl UpgradeArgs {
    pub async fn run(self, session: &Session) -> Result<()> {
        let release = self.release;
        let spec = load_spec(&self.file, Some(&release))?;
        let record = session.manager().upgrade(spec).await?;
        print_recorded("upgraded", &record);
        Ok(())
    }
}
