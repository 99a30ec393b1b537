// Copyright 2026 Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Harvest — registry enumeration and archiving runtime, entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use harvest_runtime::cli;

#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Harvest — enumerate registry identifiers and archive the records behind them",
    version,
    after_help = "Run 'harvest <command> --help' for details on each command."
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a serial range against the remote registry and archive found records
    Run {
        /// Path to a config file (default: HARVEST_CONFIG, ./harvest.json,
        /// ~/.harvest/config.json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Realm (partition) code override
        #[arg(long)]
        realm: Option<String>,
        /// First serial in the range (inclusive)
        #[arg(long)]
        start: Option<u64>,
        /// Last serial in the range (inclusive)
        #[arg(long)]
        end: Option<u64>,
        /// Output directory override
        #[arg(long)]
        output: Option<PathBuf>,
        /// Run the browser with a visible window
        #[arg(long)]
        headed: bool,
        /// Skip serials already journaled as found or not-found
        #[arg(long)]
        resume: bool,
    },
    /// Compute or verify the check digit for one identifier
    Check {
        /// Identifier as REALM/SERIAL or REALM/SERIAL/DIGIT
        identifier: String,
    },
    /// Write a starter configuration file
    Init {
        /// Where to write the config
        #[arg(long, default_value = "harvest.json")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            realm,
            start,
            end,
            output,
            headed,
            resume,
        } => {
            cli::run_cmd::run(cli::run_cmd::RunArgs {
                config,
                realm,
                start,
                end,
                output,
                headed,
                resume,
            })
            .await
        }
        Commands::Check { identifier } => cli::check_cmd::run(&identifier),
        Commands::Init { path, force } => cli::init_cmd::run(&path, force),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "harvest", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    result
}
