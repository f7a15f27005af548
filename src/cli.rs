//! CLI definitions for conclave.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// conclave CLI.
#[derive(Parser)]
#[command(name = "conclave")]
#[command(about = "Run and supervise streaming AI worker agents")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.conclave/config.toml)
    #[arg(short, long, env = "CONCLAVE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Send one message to a fresh agent and stream the reply to stdout
    Send(SendArgs),

    /// Validate the configuration file
    Check,

    /// Start an agent and run a single health probe against it
    Probe(AgentArgs),
}

/// Which agent to start.
#[derive(Args)]
pub(crate) struct AgentArgs {
    /// Provider name or kind (subprocess, http)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model override
    #[arg(short, long)]
    pub model: Option<String>,

    /// Agent display name
    #[arg(long, default_value = "cli")]
    pub name: String,
}

#[derive(Args)]
pub(crate) struct SendArgs {
    #[command(flatten)]
    pub agent: AgentArgs,

    /// System prompt (HTTP providers only)
    #[arg(long)]
    pub system: Option<String>,

    /// Sampling temperature override
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Give up after this many seconds (default: runtime.default_timeout_seconds)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Message text; read from stdin when omitted
    pub message: Option<String>,
}
