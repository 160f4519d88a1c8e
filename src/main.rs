mod azure;
mod commands;
mod config;
mod credentials;
mod error;
mod input;
mod pr;
mod report;
mod store;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use commands::{ChangeRepositoryOptions, Commands, ListOptions};
use error::AppError;
use store::FileStore;

/// Release Components: lists the platform components touched by your
/// completed Azure DevOps pull requests since a release date, and writes
/// them to a spreadsheet.
#[derive(Parser, Debug)]
#[command(name = "release-components", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the release components and write the spreadsheet
    List {
        /// Release starting date (dd-mm-yyyy); asked for when omitted
        #[arg(long)]
        since: Option<String>,

        /// Workspace directory receiving the spreadsheet
        #[arg(long, default_value = ".")]
        workspace: PathBuf,

        /// Also print the retrieved pull requests as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change the default Azure DevOps repository
    ChangeRepo {
        /// Azure DevOps organization
        #[arg(long)]
        organization: Option<String>,

        /// Project ID or project name
        #[arg(long)]
        project: Option<String>,

        /// Repository ID of the pull requests' target branch
        #[arg(long)]
        repository_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error::report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    info!("loading configuration");
    let config = config::Config::load()?;

    let store = FileStore::open(config.state_path())?;
    debug!(path = %store.path().display(), "using state store");

    let credentials = credentials::GitCredentialManager::new(&config.credentials);
    let mut commands = Commands::new(
        config,
        Box::new(store),
        Box::new(credentials),
        Box::new(input::StdinPrompter),
    );

    match cli.command {
        Command::List {
            since,
            workspace,
            json,
        } => {
            let span = info_span!("list", workspace = %workspace.display());
            let outcome = commands
                .list_release_components(ListOptions {
                    since,
                    workspace,
                    json,
                })
                .instrument(span)
                .await?;
            report::print_summary(&outcome.records, &outcome.output);
            info!(
                pull_requests = outcome.pull_requests.len(),
                records = outcome.records.len(),
                "done"
            );
        }
        Command::ChangeRepo {
            organization,
            project,
            repository_id,
        } => {
            let coordinates = commands
                .change_default_repository(ChangeRepositoryOptions {
                    organization,
                    project,
                    repository_id,
                })
                .await?;
            println!(
                "{} {}/{}/{}",
                "Default repository set to".green().bold(),
                coordinates.organization,
                coordinates.project,
                coordinates.repository_id
            );
        }
    }

    Ok(())
}
