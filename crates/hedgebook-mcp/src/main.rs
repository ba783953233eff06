//! Hedgebook MCP Server
//!
//! Model Context Protocol server exposing the hedgebook P&L engine to AI
//! agents: realized P&L on physical cargoes and their futures hedges,
//! market price tables, and mark-to-market valuation.
//!
//! # Features
//!
//! - **Realized P&L**: Physical, hedge and net P&L with per-position rows
//! - **Prices**: Loose price sheets normalized into an exact-date lookup table
//! - **Mark-to-Market**: Snapshots as of a date and a series over every priced date
//! - **Trade Book**: Buy/sell/hedge bookkeeping for one cargo per session
//!
//! Requests arrive as JSON-RPC lines on stdin; responses go to stdout and
//! logs to stderr.

mod config;
mod error;
mod session;
mod tools;

use std::io::{self, BufRead, Write};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;
use crate::session::Session;
use crate::tools::{handle_request, HedgebookTools, JsonRpcRequest};

fn main() -> anyhow::Result<()> {
    let loaded = AppConfig::load();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    // Initialize logging to stderr (stdout is for MCP protocol)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Hedgebook MCP Server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = &loaded {
        tracing::warn!(error = %e, "Using default configuration");
    }

    tracing::info!(
        server = %config.server.name,
        cargo = %config.book.cargo_name,
        max_records = config.book.max_records,
        "Configuration loaded"
    );

    let book = config.book.build()?;
    let mut tools = HedgebookTools::new(config.server.name.clone(), Session::new(book));

    tracing::info!("MCP server ready, listening on stdio");

    // Main loop: read JSON-RPC requests from stdin, write responses to stdout
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "Error reading stdin");
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, line = %line, "Error parsing request");
                continue;
            }
        };

        tracing::debug!(method = %request.method, "Received request");

        // Notifications don't get responses
        if let Some(response) = handle_request(&mut tools, request) {
            let response_str = serde_json::to_string(&response).unwrap_or_default();
            if let Err(e) = writeln!(stdout, "{}", response_str) {
                tracing::error!(error = %e, "Error writing response");
            }
            if let Err(e) = stdout.flush() {
                tracing::error!(error = %e, "Error flushing stdout");
            }
        }
    }

    tracing::info!("MCP server shutting down");
    Ok(())
}
