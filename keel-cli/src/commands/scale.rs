//! `keel scale <release> <component> <count>`

use anyhow::Result;
use clap::Args;
use keel_core::{ComponentName, ReleaseName};

use super::{parse_release_name, print_recorded, Session};

/// Arguments for `keel scale`.
#[derive(Args, Debug)]
pub struct ScaleArgs {
    #[arg(value_parser = parse_release_name)]
    pub release: ReleaseName,

    pub component: String,

    /// Desired replica count.
    pub replicas: u32,
}

impl ScaleArgs {
    pub async fn run(self, session: &Session) -> Result<()> {
        let release = self.release;
        let component = ComponentName::from(self.component);
        let record = session
            .manager()
            .scale(&release, &component, self.replicas)
            .await?;
        print_recorded("scaled", &record);
        Ok(())
    }
}
