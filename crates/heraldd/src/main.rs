//! Build Herald daemon
//!
//! Reads newline-delimited JSON build events (stdin by default), keeps the
//! builder registry current and reports settled status changes to an IRC
//! channel until signalled or the feed closes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use herald_core::{
    init_tracing, pump_json_lines, BotConfig, BotHandle, BuildEventFeed, MemoryRegistry,
    StatusBot,
};
use herald_irc::IrcConnector;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "heraldd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Report settled build status changes to IRC", long_about = None)]
struct Cli {
    /// Bot configuration file (TOML)
    #[arg(short, long, env = "HERALD_CONFIG")]
    config: PathBuf,

    /// Read build events from this file instead of stdin
    #[arg(long)]
    feed: Option<PathBuf>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: Level,
}

async fn open_feed(path: Option<&PathBuf>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open build feed {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

/// Pump the feed until EOF, then stop the bot: no feed, nothing to report.
async fn run_feed(
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    registry: Arc<MemoryRegistry>,
    feed: Arc<BuildEventFeed>,
    handle: BotHandle,
    quit_message: String,
) {
    match pump_json_lines(reader, &registry, &feed).await {
        Ok(published) => info!(published, "build feed closed"),
        Err(e) => error!(error = %e, "build feed failed"),
    }
    handle.shutdown(&quit_message);
}

/// Resolve on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, cli.log_level);

    let config = BotConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    let reader = open_feed(cli.feed.as_ref()).await?;

    let registry = Arc::new(MemoryRegistry::new());
    let feed = Arc::new(BuildEventFeed::new());
    let (bot, handle) = StatusBot::new(
        config.clone(),
        registry.clone(),
        Arc::new(IrcConnector::new()),
    );
    handle.subscribe(&feed);

    let pump = tokio::spawn(run_feed(
        reader,
        registry,
        feed,
        handle.clone(),
        config.quit_message.clone(),
    ));

    let interrupt = {
        let handle = handle.clone();
        let quit_message = config.quit_message.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            handle.shutdown(&quit_message);
        })
    };

    bot.run().await.context("status bot failed")?;
    pump.abort();
    interrupt.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "heraldd",
            "--config",
            "herald.toml",
            "--json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("herald.toml"));
        assert!(cli.json);
        assert_eq!(cli.log_level, Level::DEBUG);
        assert_eq!(cli.feed, None);
    }

    #[test]
    fn test_cli_requires_config() {
        assert!(Cli::try_parse_from(["heraldd"]).is_err());
    }
}
