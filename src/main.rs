//! conclave - supervised, streaming AI worker agents.
//!
//! Entry point for the conclave CLI.

mod cli;
mod cmd_agent;
mod cmd_config;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use conclave_config::{ConfigLoader, LoggingConfig};

use cli::{Cli, Commands};

/// Initialize tracing with console and file output.
///
/// `RUST_LOG` overrides the configured level. Log files rotate daily under
/// `~/.conclave/logs/` unless `logging.directory` says otherwise.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Console output goes to stderr so `send` keeps stdout for the reply.
    let console = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let file = match logging.resolved_directory() {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir)?;
            let (prefix, suffix) = logging
                .file
                .rsplit_once('.')
                .unwrap_or((logging.file.as_str(), "log"));
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .filename_suffix(suffix)
                .max_log_files(30)
                .build(&log_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keep the writer alive for the program duration.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(cli.config.as_deref())?;
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Send(args) => cmd_agent::send(&config, args).await,
        Commands::Check => cmd_config::check(&config),
        Commands::Probe(args) => cmd_agent::probe(&config, args).await,
    }
}
