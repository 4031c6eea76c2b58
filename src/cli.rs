use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use logstore::Severity;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "logstore")]
#[command(about = "Inspect and maintain a logstore directory", long_about = None)]
pub struct Cli {
    /// Store directory (overrides store.path from configuration)
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,

    /// Configuration file (defaults to $LOGSTORE_CONFIG or config/logstore.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append one entry
    Write(WriteArgs),
    /// Show the most recent entries
    Recent(RecentArgs),
    /// Show entries within a time range
    Between(BetweenArgs),
    /// Delete entries older than the retention window
    Prune(PruneArgs),
    /// Show entry count and time span
    Stats,
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct WriteArgs {
    /// Entry message
    pub message: String,

    #[arg(long, short, default_value = "notice")]
    pub severity: Severity,

    /// Metadata field as key=value; JSON values are parsed, anything else is a string
    #[arg(long = "field", short = 'f', value_parser = parse_field)]
    pub fields: Vec<(String, String)>,
}

#[derive(clap::Args, Debug)]
pub struct RecentArgs {
    #[arg(long, short = 'n', default_value_t = 20)]
    pub count: usize,

    /// Least severe level to include
    #[arg(long, short, default_value = "debug")]
    pub severity: Severity,

    /// One JSON object per line
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct BetweenArgs {
    /// Inclusive lower bound (RFC 3339)
    #[arg(long, value_parser = parse_timestamp)]
    pub start: Option<DateTime<Utc>>,

    /// Inclusive upper bound (RFC 3339)
    #[arg(long, value_parser = parse_timestamp)]
    pub end: Option<DateTime<Utc>>,

    #[arg(long, short, default_value = "debug")]
    pub severity: Severity,

    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct PruneArgs {
    /// Retention window in days (defaults to the configured value)
    #[arg(long)]
    pub days: Option<f64>,
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{s}': {e}"))
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}
