//! voom - vCenter VM inventory and usage rollups

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use voom::cli::ConnectArgs;
use voom::rollup::Unattributed;

mod commands;

#[derive(Parser)]
#[command(author, version, about = "vCenter VM inventory and usage rollups")]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,

    /// log verbosity (trace, debug, info, warn, error); RUST_LOG wins
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// list VMs
    Ls,
    /// dump all found VMs to standard output, in JSON
    Dump,
    /// summarize resource usage, by BOSH director and deployment
    #[command(alias = "sum")]
    Summary {
        /// show each director's share of the grand total
        #[arg(short, long)]
        percentage: bool,
        /// print the summary tree as JSON
        #[arg(long)]
        json: bool,
        /// leave VMs without a director out instead of grouping them
        #[arg(long)]
        drop_unattributed: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // logs go to stderr so dump/json output stays pipeable
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ls => commands::ls::run(&cli.connect).await?,
        Commands::Dump => commands::dump::run(&cli.connect).await?,
        Commands::Summary {
            percentage,
            json,
            drop_unattributed,
        } => {
            let policy = if drop_unattributed {
                Unattributed::Drop
            } else {
                Unattributed::Bucket
            };
            commands::summary::run(&cli.connect, percentage, json, policy).await?
        }
    };

    Ok(())
}
