//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// logpush - tail log files, stream them live and ship them in bulk
#[derive(Parser, Debug)]
#[command(
    name = "logpush",
    author,
    version,
    about = "Tail log files, stream them live and ship them in bulk",
    long_about = "Tails the configured log files and delivers every line twice:\n\
                  to live text/event-stream clients over HTTP, and in\n\
                  count/size/time-bounded batches to a bulk indexer over UDP."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LOGPUSH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "LOGPUSH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tail sources and serve the live feed until interrupted
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Listen for bulk datagrams and check their framing
    Receive(ReceiveArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "logpush.toml", env = "LOGPUSH_CONFIG")]
    pub config: PathBuf,

    /// Override the HTTP listen address
    #[arg(long, env = "LOGPUSH_LISTEN")]
    pub listen: Option<String>,

    /// Override the bulk endpoint (udp://host:port)
    #[arg(long, env = "LOGPUSH_BULK_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "LOGPUSH_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus exporter port (0 = disabled)
    #[arg(long, default_value = "0", env = "LOGPUSH_METRICS_PORT")]
    pub metrics_port: u16,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[arg(short, long, default_value = "logpush.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[arg(short, long, default_value = "logpush.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the effective configuration, defaults filled in, as TOML
    #[arg(long, conflicts_with = "json")]
    pub effective: bool,
}

#[derive(Parser, Debug)]
pub struct ReceiveArgs {
    /// UDP address to bind
    #[arg(short, long, default_value = "127.0.0.1:9700", env = "LOGPUSH_RECEIVE_BIND")]
    pub bind: String,

    /// Print every parsed document to stdout
    #[arg(long)]
    pub print: bool,

    /// Stop after this many datagrams (0 = until interrupted)
    #[arg(long, default_value = "0")]
    pub count: u64,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

impl Cli {
    /// Level used when RUST_LOG is unset
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
