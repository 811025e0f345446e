//! `keel rollback <release> <revision>`

use anyhow::Result;
use clap::Args;
use keel_core::{ReleaseName, Revision};

use super::{parse_release_name, print_recorded, Session};

/// Arguments for `keel rollback`.
#[derive(Args, Debug)]
pub struct RollbackArgs {
    #[arg(value_parser = parse_release_name)]
    pub release: ReleaseName,

    /// Revision whose spec is re-deployed (see `keel history`).
    pub revision: u64,
}

impl RollbackArgs {
    pub async fn run(self, session: &Session) -> Result<()> {
        let release = self.release;
        let record = session
            .manager()
            .rollback(&release, Revision(self.revision))
            .await?;
        print_recorded("rolled back", &record);
        Ok(())
    }
}
