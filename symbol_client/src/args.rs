//! Command-line arguments for the symbol client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use std::path::PathBuf;
use symbol_common::endpoint::DEFAULT_SOCKET_DIR;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Exchange to read, e.g. `binance-futures`.
    pub exchange: String,

    /// Directory holding the server's `<exchange>.sock` endpoints.
    #[clap(long, default_value = DEFAULT_SOCKET_DIR)]
    pub socket_dir: PathBuf,

    /// Seconds to wait for the response; the server answers only after any
    /// running refresh of the exchange finishes.
    #[clap(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Print the raw response as indented JSON instead of one line per symbol.
    #[clap(long)]
    pub pretty: bool,
}
