use logstore::config::LoggerConfig;
use logstore::{Entry, Logger, Severity};
use serde_json::Value;
use tracing::info;

use crate::cli::{BetweenArgs, Cli, Commands, PruneArgs, RecentArgs, WriteArgs};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(cli: Cli) -> Result<(), AnyError> {
    let mut config = match cli.config {
        Some(path) => LoggerConfig::load_from_path(path)?,
        None => LoggerConfig::load()?,
    };
    if let Some(path) = cli.path {
        config.store.path = Some(path);
    }
    if let Commands::Prune(PruneArgs { days: Some(days) }) = &cli.command {
        config.retention.prune_limit_days = *days;
    }
    if let Commands::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    // One-shot commands only prune when asked to
    config.retention.auto_prune = false;

    let logger = Logger::from_config(&config)?;
    // The CLI prints its own output
    logger.set_mirror_to_console(false);
    logger.open().await?;

    let outcome = match cli.command {
        Commands::Write(args) => write(&logger, args),
        Commands::Recent(args) => recent(&logger, args).await,
        Commands::Between(args) => between(&logger, args).await,
        Commands::Prune(_) => prune(&logger).await,
        Commands::Stats => stats(&logger).await,
        Commands::Config => Ok(()),
    };

    logger.close().await?;
    outcome
}

fn write(logger: &Logger, args: WriteArgs) -> Result<(), AnyError> {
    let entry = args
        .fields
        .into_iter()
        .fold(Entry::new(args.severity, args.message), |entry, (key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            entry.with_field(key, value)
        });

    // An explicit write is never filtered out
    logger.set_filter_severity(Severity::Debug);
    logger.log_entry(entry);
    info!(path = %logger.path().display(), "Entry queued");
    Ok(())
}

async fn recent(logger: &Logger, args: RecentArgs) -> Result<(), AnyError> {
    let entries = logger.retrieve_recent(args.count, args.severity).await?;
    print_entries(&entries, args.json)
}

async fn between(logger: &Logger, args: BetweenArgs) -> Result<(), AnyError> {
    let entries = logger
        .retrieve_between(args.start, args.end, args.severity)
        .await?;
    print_entries(&entries, args.json)
}

async fn prune(logger: &Logger) -> Result<(), AnyError> {
    let removed = logger.prune_now().await?;
    println!("Removed {removed} entries older than {} days", logger.retention().prune_limit_days);
    Ok(())
}

async fn stats(logger: &Logger) -> Result<(), AnyError> {
    let stats = logger.stats().await?;
    let span = |ts: Option<chrono::DateTime<chrono::Utc>>| {
        ts.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
    };

    println!("path:    {}", logger.path().display());
    println!("entries: {}", stats.entry_count);
    println!("oldest:  {}", span(stats.oldest));
    println!("newest:  {}", span(stats.newest));
    Ok(())
}

fn print_entries(entries: &[Entry], json: bool) -> Result<(), AnyError> {
    for entry in entries {
        if json {
            println!("{}", serde_json::to_string(entry)?);
            continue;
        }

        let metadata = match &entry.metadata {
            Some(metadata) => format!(" {}", serde_json::to_string(metadata)?),
            None => String::new(),
        };
        println!(
            "{} {:<9} {}{}",
            entry.timestamp.to_rfc3339(),
            entry.severity.as_str(),
            entry.message,
            metadata
        );
    }
    Ok(())
}
