//! Command-line arguments and the runtime configuration built from them.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use symbol_common::SymbolError;
use symbol_common::endpoint::DEFAULT_SOCKET_DIR;
use symbol_common::exchanges::{ExchangeList, ExchangeListParser, default_exchanges};

use crate::fetcher::RetryPolicy;
use crate::provider::DEFAULT_PROVIDER_URL;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Serves cached exchange symbol lists over per-exchange Unix sockets", long_about = None)]
pub struct Args {
    /// Directory holding the `<exchange>.sock` endpoints.
    #[clap(long, default_value = DEFAULT_SOCKET_DIR)]
    pub socket_dir: PathBuf,

    /// Seconds between full refresh sweeps.
    #[clap(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_interval_secs: u64,

    /// Per-attempt provider timeout in milliseconds.
    #[clap(long, default_value_t = 3000)]
    pub timeout_ms: u64,

    /// Maximum fetch attempts per refresh.
    #[clap(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub retries: u32,

    /// Linear backoff unit in milliseconds; attempt `n` waits `n` units.
    #[clap(long, default_value_t = 1000)]
    pub retry_delay_ms: u64,

    /// Base URL of the exchange metadata API.
    #[clap(long, default_value = DEFAULT_PROVIDER_URL)]
    pub provider_url: String,

    /// File with exchange keys, separated by commas, spaces or new lines.
    /// The built-in exchange list is used when omitted.
    #[clap(long)]
    pub exchanges: Option<PathBuf>,
}

/// Runtime configuration of the symbol server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding the endpoint sockets.
    pub socket_dir: PathBuf,
    /// Interval between sweeps.
    pub refresh_interval: Duration,
    /// Timeout and retry policy for provider calls.
    pub retry: RetryPolicy,
    /// Base URL of the metadata API.
    pub provider_url: String,
    /// Exchanges to register at startup.
    pub exchanges: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            refresh_interval: Duration::from_secs(500),
            retry: RetryPolicy::default(),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            exchanges: default_exchanges(),
        }
    }
}

impl TryFrom<Args> for ServerConfig {
    type Error = SymbolError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let exchanges = match &args.exchanges {
            Some(path) => {
                let file = File::open(path).map_err(|e| {
                    SymbolError::StartupFatal(format!(
                        "cannot open exchange list {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                ExchangeList::parse_from_reader(BufReader::new(file))?
            }
            None => default_exchanges(),
        };

        if exchanges.is_empty() {
            return Err(SymbolError::StartupFatal("no exchanges configured".into()));
        }

        Ok(Self {
            socket_dir: args.socket_dir,
            refresh_interval: Duration::from_secs(args.refresh_interval_secs),
            retry: RetryPolicy {
                timeout: Duration::from_millis(args.timeout_ms),
                max_retries: args.retries,
                base_delay: Duration::from_millis(args.retry_delay_ms),
            },
            provider_url: args.provider_url,
            exchanges,
        })
    }
}
