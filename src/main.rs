use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wrapup::{app, config::Config, global};

#[derive(Parser)]
#[command(name = "wrapup", about = "Meeting summary pipeline service")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the config file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Some(CliCommand::Version) = cli.command {
        println!("WrapUp {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = match cli.config {
        Some(path) => Config::load_from(&path)?,
        None => Config::load_from(&global::config_file()?)?,
    };

    app::run_service(config).await
}
