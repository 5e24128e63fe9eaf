//! ns: command-line client for nodestore storage nodes

mod commands;
mod exit_code;
mod output;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::Commands;
use crate::output::OutputConfig;

/// Resilient client for plain-HTTP object storage nodes
#[derive(Parser, Debug)]
#[command(name = "ns", version, about, propagate_version = true)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true, env = ns_core::CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Print strict JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true)]
    pub no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log host selection, retries and discovery to stderr
    #[arg(short = 'v', long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    fn output_config(&self) -> OutputConfig {
        OutputConfig {
            json: self.json,
            no_color: self.no_color || std::env::var_os("NO_COLOR").is_some(),
            quiet: self.quiet,
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let output_config = cli.output_config();
    let code = commands::execute(cli.command, cli.config, output_config).await;
    std::process::exit(code.as_i32());
}
