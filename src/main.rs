//! BQ Query Guard entry point.
//!
//! Reads one JSON request per line from stdin and writes one JSON response
//! per line to stdout. Requests are validated or built, never executed: the
//! dry-run executor echoes what an engine would receive.

use anyhow::Result;
use bq_query_guard::transport::serve;
use bq_query_guard::{Config, DryRunExecutor, QueryGateway};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout carries responses)
    init_logging();

    let version = env!("CARGO_PKG_VERSION");
    info!("BQ Query Guard v{version} starting (stdio)");

    let config = Config::from_env()?;
    info!(
        "Limits: {} chars, {} lines, default row limit {}, strict identifiers {}",
        config.validation.max_query_length,
        config.validation.max_query_lines,
        config.builder.default_limit,
        config.builder.strict_identifiers
    );

    let gateway = QueryGateway::new(&config, DryRunExecutor);
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    serve(&gateway, stdin, stdout).await?;

    info!("Input closed, shutting down");
    Ok(())
}

/// Initialize tracing subscriber with stderr output.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,bq_query_guard=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
