//! bifrost: command-line host for the dispatch gateway.
//!
//! Loads adapters from a TOML config and dispatches single requests,
//! printing the normalized response envelope as JSON.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bifrost::{Bifrost, BifrostError, Config, Method, RequestDescriptor};
use clap::{Parser, Subcommand};

/// Bifrost API gateway CLI
#[derive(Parser)]
#[command(name = "bifrost")]
#[command(version)]
#[command(about = "Dispatch requests to configured upstream APIs")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "BIFROST_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List configured adapters and their health
    Adapters,

    /// Dispatch one request through an adapter
    Call {
        /// Adapter name
        adapter: String,
        /// HTTP method (GET, POST, PUT, DELETE, PATCH)
        method: String,
        /// Path relative to the adapter's base URL
        path: String,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
        /// Header as key=value (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_key_value)]
        headers: Vec<(String, String)>,
        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialise tracing (default: info; override with RUST_LOG).
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = Config::load(args.config.as_deref())?;
    let gateway = Bifrost::from_config(&config)?;

    match args.command {
        Command::Adapters => {
            for (name, healthy) in gateway.registry().health_report() {
                let status = if healthy { "healthy" } else { "unhealthy" };
                println!("{name}\t{status}");
            }
        }
        Command::Call {
            adapter,
            method,
            path,
            query,
            headers,
            body,
        } => {
            let method: Method = method.parse()?;
            let body = body
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .map_err(BifrostError::from)?;
            let request = RequestDescriptor {
                method,
                path,
                headers: headers.into_iter().collect::<BTreeMap<_, _>>(),
                query: query.into_iter().collect::<BTreeMap<_, _>>(),
                body,
            };

            let response = gateway.execute(&adapter, &request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
