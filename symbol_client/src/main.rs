//! Symbol Client — reads one exchange's cached symbol list from the symbol
//! server and prints it to stdout.
//!
//! Usage example (CLI):
//! ```bash
//! symbol_client --socket-dir ./exchange deribit
//! ```
//!
//! The server writes a single JSON object per connection: either
//! `{"lastUpdated": ..., "symbols": [...]}` or `{"error": "..."}`.
#![warn(missing_docs)]
mod args;

use std::time::Duration;

use clap::Parser;
use log::{error, info};
use symbol_common::endpoint::{request, socket_path};
use symbol_common::exchanges::validate_key;
use symbol_common::{Response, Result, SymbolError};

use crate::args::Args;

fn main() -> Result<(), SymbolError> {
    init_logger();
    let args = Args::parse();
    validate_key(&args.exchange)?;

    let path = socket_path(&args.socket_dir, &args.exchange);
    info!("Requesting {} from {}", args.exchange, path.display());
    let response = request(&path, Some(Duration::from_secs(args.timeout_secs)))?;

    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    match response {
        Response::Error { error } => {
            error!("[{}] Server error: {}", args.exchange, error);
            Err(SymbolError::Format(error))
        }
        Response::Snapshot(snapshot) => {
            if !args.pretty {
                for symbol in &snapshot.symbols {
                    println!("{}\t{}", symbol.symbol_id, symbol.kind);
                }
            }
            info!(
                "[{}] {} symbols, last updated: {}",
                args.exchange,
                snapshot.symbols.len(),
                snapshot.last_updated.as_deref().unwrap_or("never")
            );
            Ok(())
        }
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
