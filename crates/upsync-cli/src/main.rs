//! upsync CLI
//!
//! Keeps a host's service-manager instances in sync with the UPS device
//! configuration file. The default invocation runs one reconcile pass;
//! subcommands expose read-only queries over the device↔unit mapping.
//!
//! Exit status is the interface for callers: 0 already-matched (or
//! converged quietly), 42 converged with changes, 13 still unmatched,
//! 1 invalid input, 2 missing configuration.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::Cli;
use error::CliError;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    match commands::execute(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            exit_code_for(&e)
        }
    }
}

/// Map a failed run to the exit-status contract: missing/empty
/// configuration is 2, everything else (unknown backend included) is 1.
fn exit_code_for(error: &CliError) -> i32 {
    use upsync_config::Error as ConfigError;

    let config_error = match error {
        CliError::Config(e) => Some(e),
        CliError::Core(upsync_core::Error::Config(e)) => Some(e),
        _ => None,
    };

    match config_error {
        Some(ConfigError::ConfigMissing { .. } | ConfigError::ConfigEmpty { .. }) => {
            commands::EXIT_CONFIG
        }
        _ => commands::EXIT_INVALID,
    }
}
