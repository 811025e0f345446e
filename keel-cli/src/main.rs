//! keel: declarative release management CLI.
//!
//! # Usage
//!
//! ```text
//! keel install <file>
//! keel upgrade <release> <file>
//! keel rollback <release> <revision>
//! keel scale <release> <component> <count>
//! keel history <release> [--max N] [--json]
//! keel status <release> [--json]
//! keel diff <release> <file>
//! ```
//!
//! Exit codes: 0 ok, 2 invalid spec, 3 not found, 4 conflict,
//! 5 orchestration failure, 1 anything else.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;

use commands::{
    diff::DiffArgs, history::HistoryArgs, install::InstallArgs, rollback::RollbackArgs,
    scale::ScaleArgs, status::StatusArgs, upgrade::UpgradeArgs, Session,
};
use keel_release::ReleaseError;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "keel",
    version,
    about = "Install, upgrade and roll back multi-component releases",
    long_about = None,
)]
struct Cli {
    /// Directory holding `.keel/` (defaults to the user's home directory).
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a new release from a description file.
    Install(InstallArgs),

    /// Upgrade an existing release to a new description.
    Upgrade(UpgradeArgs),

    /// Re-deploy the spec of an earlier revision as a new revision.
    Rollback(RollbackArgs),

    /// Change the replica count of one component.
    Scale(ScaleArgs),

    /// List recorded revisions of a release.
    History(HistoryArgs),

    /// Show the recorded revision, lifecycle phase and live state.
    Status(StatusArgs),

    /// Show the plan and spec diff an upgrade would apply.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let session = Session::load(cli.home)?;
    match cli.command {
        Commands::Install(args) => args.run(&session).await,
        Commands::Upgrade(args) => args.run(&session).await,
        Commands::Rollback(args) => args.run(&session).await,
        Commands::Scale(args) => args.run(&session).await,
        Commands::History(args) => args.run(&session),
        Commands::Status(args) => args.run(&session).await,
        Commands::Diff(args) => args.run(&session).await,
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print the error chain to stderr, skipping causes already spelled out by
/// the message above them.
fn report(err: &anyhow::Error) {
    let mut shown = err.to_string();
    eprintln!("{} {shown}", "error:".red().bold());
    for cause in err.chain().skip(1) {
        let text = cause.to_string();
        if !shown.contains(&text) {
            eprintln!("  {} {text}", "caused by:".bright_black());
            shown = text;
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ReleaseError>())
        .map_or(1, |e| e.kind().exit_code() as u8)
}
