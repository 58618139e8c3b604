//! medikit-proxy: server-side proxy for medical assistant chat completions
//!
//! Receives a request kind plus payload, builds the provider prompt, calls
//! the upstream chat-completion service, and relays the answer buffered or
//! streamed.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use medikit_proxy::{config::AppConfig, run_server};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Parser)]
#[command(name = "medikit-proxy")]
#[command(version = "0.1.0")]
#[command(about = "Server-side proxy for medical assistant chat completions")]
struct Cli {
    /// Path to config file (optional; defaults plus OPENAI_API_KEY apply when absent)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override upstream chat-completions URL
        #[arg(long)]
        upstream_url: Option<String>,
    },

    /// Validate configuration and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    match cli.command {
        Commands::Run { port, upstream_url } => {
            let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(url) = upstream_url {
                config.upstream.url = url;
            }
            run_server(config).await?;
        }
        Commands::CheckConfig => {
            check_config(cli.config.as_deref());
        }
    }

    Ok(())
}

/// Validate configuration and print the effective settings
fn check_config(config_path: Option<&Path>) {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("\nUpstream:");
            println!("  URL: {}", config.upstream.url);
            println!("  Model: {}", config.upstream.model);
            println!("  Timeout: {}s", config.upstream.timeout_seconds);
            println!(
                "  Credential: {}",
                if config.upstream.api_key.is_some() {
                    "configured"
                } else {
                    "MISSING (set OPENAI_API_KEY)"
                }
            );
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
