//! printscan - discover networked printers from the command line.
//!
//! Broadcasts discovery probes on every local IPv4 interface and lists the
//! devices of the configured model that answer.

mod cli;
mod commands;
mod device;
mod error;
mod logging;
mod output;

use clap::Parser;

use cli::{Cli, Commands};
use error::{exit_codes, CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Discover(args) => {
            let config = commands::load_config(cli.port, cli.model).await?;
            commands::run_discover(args, config, cli.json).await
        }
        Commands::Interfaces => commands::run_interfaces(cli.json),
        Commands::Config(args) => {
            commands::run_config(args, cli.port, cli.model, cli.json).await
        }
        Commands::Simulate(args) => {
            let config = commands::load_config(cli.port, cli.model).await?;
            commands::run_simulate(args, config, cli.json).await
        }
    }
}
