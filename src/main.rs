//! virtrest CLI entry point.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use virtrest::config::VirtrestConfig;

mod cli;

/// virtrest - HTTP lifecycle control for virtual machines
#[derive(Parser, Debug)]
#[command(name = "virtrest")]
#[command(about = "HTTP lifecycle control for hypervisor-managed virtual machines")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API server.
    Serve(cli::serve::ServeCmd),

    /// List domains on the hypervisor.
    #[command(alias = "ls")]
    List(cli::list::ListCmd),

    /// Export the OpenAPI specification.
    Openapi(cli::openapi::OpenapiCmd),
}

fn main() {
    let cli = Cli::parse();

    // The server logs its lifecycle at info; one-shot commands stay quiet.
    let default_level = match cli.command {
        Commands::Serve(_) => "virtrest=info,tower_http=info",
        _ => "virtrest=warn",
    };
    init_logging(cli.log_format, default_level);

    tracing::debug!(version = virtrest::VERSION, "starting virtrest");

    // Load configuration
    let config = match VirtrestConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Serve(cmd) => cmd.run(config),
        Commands::List(cmd) => cmd.run(&config),
        Commands::Openapi(cmd) => cmd.run(),
    };

    // Handle errors
    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
fn init_logging(format: LogFormat, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}
