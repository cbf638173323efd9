//! pagewatch CLI
//!
//! Command-line interface for pagewatch - competitor page change monitoring.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pagewatch_core::Config;

mod commands;
mod extract;
mod fetch;
mod output;
mod targets;

use output::{Output, OutputFormat};

const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Parser)]
#[command(name = "pagewatch")]
#[command(about = "pagewatch - report what changed on competitor pages")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every target and report new items
    Run {
        /// TOML file of [[target]] entries
        targets: PathBuf,
        /// Save results locally without publishing
        #[arg(long)]
        no_publish: bool,
    },
    /// Publish every stored snapshot to the remote mirror
    Publish,
    /// Show the stored snapshot for a target
    Show {
        /// Company name
        company: String,
        /// Page type (e.g. News, Blog)
        url_type: String,
    },
    /// Show backend, storage and remote status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, backend, chunk_size, publish_per_chunk,
        /// log_level, remote.owner, remote.repo, remote.branch, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands must work even when the file does not parse yet
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, &output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config, log_ansi(&cli));

    match cli.command {
        Commands::Run {
            targets,
            no_publish,
        } => commands::run::run(config, &targets, no_publish, &output).await,
        Commands::Publish => commands::publish::publish(config, &output).await,
        Commands::Show { company, url_type } => {
            commands::show::show(config, &company, &url_type, &output).await
        }
        Commands::Status => commands::status::show(config, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Log to stderr
///
/// `RUST_LOG` wins when set; otherwise the configured level (default warn)
/// applies to pagewatch crates only.
fn init_logging(config: &Config, ansi: bool) {
    let level = config.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pagewatch_core={},pagewatch={}", level, level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Plain log lines when the caller is parsing JSON output
fn log_ansi(cli: &Cli) -> bool {
    !cli.json
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_output_disables_ansi_logs() {
        let cli = Cli::try_parse_from(["pagewatch", "--json", "status"]).unwrap();
        assert!(!log_ansi(&cli));

        let cli = Cli::try_parse_from(["pagewatch", "status"]).unwrap();
        assert!(log_ansi(&cli));
    }
}
