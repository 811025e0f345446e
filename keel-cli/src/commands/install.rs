//! `keel install <file>`: create a release from a description file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::{load_spec, print_recorded, Session};

/// Arguments for `keel install`.
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Release description (YAML).
    pub file: PathBuf,
}

impl InstallArgs {
    pub async fn run(self, session: &Session) -> Result<()> {
        let spec = load_spec(&self.file, None)?;
        let record = session.manager().install(spec).await?;
        print_recorded("installed", &record);
        Ok(())
    }
}
