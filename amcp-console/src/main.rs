//! Entry point for the AMCP console.
//!
//! ```text
//! amcp-console                     Connect with defaults
//! amcp-console --config <path>     Use custom config TOML
//! amcp-console --host 10.0.0.5     Override the server address
//! amcp-console --gen-config        Dump default config and exit
//! ```

use std::path::PathBuf;

use amcp_core::Connection;
use clap::Parser;
use futures::StreamExt;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use amcp_console::config::ConsoleConfig;
use amcp_console::console;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "amcp-console", about = "Interactive AMCP command console")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "amcp-console.toml")]
    config: PathBuf,

    /// Server host (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ConsoleConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ConsoleConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.connection.host = host;
    }
    if let Some(port) = cli.port {
        config.connection.port = port;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("amcp-console v{}", env!("CARGO_PKG_VERSION"));

    let conn = Connection::with_options(config.connection);
    info!("server {}", conn.endpoint());

    // Report connectivity transitions in the background.
    let mut connectivity = conn.connectivity();
    let watcher = tokio::spawn(async move {
        while let Some(connected) = connectivity.next().await {
            if connected {
                info!("connected");
            } else {
                warn!("disconnected");
            }
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let result = console::run(&conn, stdin, tokio::io::stdout()).await;

    info!("shutting down");
    conn.close().await;
    let _ = watcher.await;

    result.map_err(Into::into)
}
