//! Command definitions and dispatch

mod bucket;
mod completions;
mod get;
mod health;
mod link;
mod ls;
mod mv;
mod put;
mod rm;
mod stat;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use ns_core::Config;
use ns_http::StorageClient;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download an object to a file or stdout
    Get(get::GetArgs),

    /// Upload a local file
    Put(put::PutArgs),

    /// Delete an object
    Rm(rm::RmArgs),

    /// Rename an object
    Mv(mv::MvArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// List objects by prefix
    Ls(ls::LsArgs),

    /// Print a download URL for an object
    Link(link::LinkArgs),

    /// Create a bucket
    Mb(bucket::MakeBucketArgs),

    /// Remove a bucket
    Rb(bucket::RemoveBucketArgs),

    /// List buckets
    Buckets,

    /// Check every storage node and show its health
    Health,

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Execute a command
pub async fn execute(
    command: Commands,
    config_path: Option<PathBuf>,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    // Completions need no storage connection
    if let Commands::Completions(args) = &command {
        return completions::execute(args);
    }

    let client = match connect(config_path.as_deref()) {
        Ok(client) => client,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::UsageError;
        }
    };

    let code = run(command, &client, &formatter).await;
    client.shutdown();
    code
}

async fn run(command: Commands, client: &StorageClient, formatter: &Formatter) -> ExitCode {
    match command {
        Commands::Get(args) => get::execute(args, client, formatter).await,
        Commands::Put(args) => put::execute(args, client, formatter).await,
        Commands::Rm(args) => rm::execute(args, client, formatter).await,
        Commands::Mv(args) => mv::execute(args, client, formatter).await,
        Commands::Stat(args) => stat::execute(args, client, formatter).await,
        Commands::Ls(args) => ls::execute(args, client, formatter).await,
        Commands::Link(args) => link::execute(args, client, formatter).await,
        Commands::Mb(args) => bucket::execute_make(args, client, formatter).await,
        Commands::Rb(args) => bucket::execute_remove(args, client, formatter).await,
        Commands::Buckets => bucket::execute_list(client, formatter).await,
        Commands::Health => health::execute(client, formatter).await,
        Commands::Completions(args) => completions::execute(&args),
    }
}

/// Load configuration and build a client
///
/// `-c` wins; without it the path comes from the environment.
fn connect(config_path: Option<&Path>) -> anyhow::Result<StorageClient> {
    let config = match config_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env().context("No configuration given, use --config")?,
    };
    tracing::debug!(
        io_hosts = ?config.io_hosts,
        uc_hosts = ?config.uc_hosts,
        bucket = %config.bucket,
        "Loaded configuration"
    );
    StorageClient::new(&config).context("Failed to create storage client")
}

/// Print an operation error and map it to an exit code
pub(crate) fn report(formatter: &Formatter, what: &str, error: &ns_core::Error) -> ExitCode {
    formatter.error(&format!("{what}: {error}"));
    ExitCode::from(error)
}
