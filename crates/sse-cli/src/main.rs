//! sse-cli - Command-line tool for Server-Sent Event streams
//!
//! Watches a live stream with bounded reconnects, decodes captured streams
//! offline and prints the wire form of hand-built events.

mod commands;
mod config;
mod output;
mod reconnect;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sse_client::ReqwestTransport;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::WatchSettings;
use crate::config::{ArgOverrides, Config};
use crate::output::{OutputContext, OutputFormat};
use crate::reconnect::Backoff;

#[derive(Parser)]
#[command(name = "sse-cli")]
#[command(author, version, about = "Server-Sent Events CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SSE_CLI_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to a stream and print events as they arrive
    Watch {
        /// Stream URL (falls back to the config file)
        #[arg(env = "SSE_URL")]
        url: Option<String>,

        /// Resume after this event id (sent as Last-Event-ID)
        #[arg(long)]
        last_id: Option<String>,

        /// Stop after an event of this type (repeatable)
        #[arg(long = "exit-event", value_name = "EVENT")]
        exit_events: Vec<String>,

        /// Accepted HTTP status (repeatable, default 200, 301, 307)
        #[arg(long = "status", value_name = "CODE")]
        statuses: Vec<u16>,

        /// Overall timeout per connection, in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Extra request header (repeatable)
        #[arg(short = 'H', long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Total reconnect attempts for the whole run
        #[arg(long)]
        max_retries: Option<u32>,

        /// Stop after this many events
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Decode a captured stream body from a file ("-" for stdin)
    Parse {
        /// Input file
        file: PathBuf,
    },

    /// Print the wire form of one event
    Dump {
        /// Event payload (newlines become separate data lines)
        #[arg(long, default_value = "")]
        data: String,

        /// Event type
        #[arg(long)]
        event: Option<String>,

        /// Event id
        #[arg(long)]
        id: Option<String>,

        /// Reconnection delay hint in milliseconds
        #[arg(long)]
        retry: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let (url, headers, timeout, max_retries) = match &cli.command {
        Commands::Watch {
            url,
            headers,
            timeout,
            max_retries,
            ..
        } => (url.as_deref(), headers.as_slice(), *timeout, *max_retries),
        _ => (None, &[][..], None, None),
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(ArgOverrides {
        url,
        output: None,
        no_color: cli.no_color,
        timeout_secs: timeout,
        max_retries,
        headers,
    });

    let format = match (cli.output, merged.output.as_deref()) {
        (Some(format), _) => format,
        (None, Some(name)) => OutputFormat::from_str(name, true)
            .map_err(|e| anyhow::anyhow!("Invalid output format in config: {}", e))?,
        (None, None) => OutputFormat::default(),
    };

    // Create output context
    let ctx = OutputContext::new(format, merged.no_color, cli.quiet);

    // Execute command
    match cli.command {
        Commands::Watch {
            last_id,
            exit_events,
            statuses,
            count,
            ..
        } => {
            let url = merged
                .url
                .clone()
                .context("No stream URL given (pass one or set `url` in the config file)")?;
            let settings = WatchSettings {
                url,
                last_id,
                exit_events,
                valid_statuses: statuses,
                timeout: merged.timeout,
                headers: merged.headers.clone(),
                max_retries: merged.max_retries,
                backoff: Backoff::default(),
                count,
            };
            commands::watch(Arc::new(ReqwestTransport::new()), settings, &ctx).await?;
        }

        Commands::Parse { file } => {
            commands::parse(&file, &ctx)?;
        }

        Commands::Dump {
            data,
            event,
            id,
            retry,
        } => {
            commands::dump(&data, event.as_deref(), id.as_deref(), retry)?;
        }
    }

    Ok(())
}

/// Parse a `NAME:VALUE` header argument
fn parse_header(s: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name must not be empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Authorization: Bearer x:y").unwrap(),
            ("Authorization".to_string(), "Bearer x:y".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_cli_parses_watch() {
        let cli = Cli::try_parse_from([
            "sse-cli",
            "watch",
            "http://localhost/stream",
            "--exit-event",
            "bye",
            "--status",
            "200",
            "-H",
            "X-A: 1",
            "-n",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Watch {
                url,
                exit_events,
                statuses,
                headers,
                count,
                ..
            } => {
                assert_eq!(url.as_deref(), Some("http://localhost/stream"));
                assert_eq!(exit_events, vec!["bye"]);
                assert_eq!(statuses, vec![200]);
                assert_eq!(headers, vec![("X-A".to_string(), "1".to_string())]);
                assert_eq!(count, Some(3));
            }
            _ => panic!("expected watch"),
        }
    }
}
