//! Exchange symbol cache server.
//!
//! Keeps one in-memory snapshot of listed symbols per exchange, refreshes all of
//! them periodically from a metadata provider, and serves each snapshot on its
//! own Unix socket. The building blocks, leaves first:
//!
//! - `provider` — the `MetadataProvider` trait and the HTTP implementation.
//! - `fetcher` — provider calls with a per-attempt timeout and linear backoff.
//! - `model` — the cache store and the per-exchange in-flight token.
//! - `coordinator` — one refresh in flight per exchange; joiners share the outcome.
//! - `scheduler` — non-overlapping periodic sweeps over every exchange.
//! - `listener` — per-exchange socket endpoints serving one-shot JSON reads.
//! - `server` — registration, start and graceful stop.
//! - `config` — command-line arguments and runtime configuration.
#![warn(missing_docs)]
pub mod config;
pub mod coordinator;
pub mod fetcher;
pub mod listener;
pub mod model;
pub mod provider;
pub mod scheduler;
pub mod server;

pub use config::{Args, ServerConfig};
pub use fetcher::RetryPolicy;
pub use provider::{AvailableSymbol, ExchangeDetails, MetadataProvider, TardisProvider};
pub use server::SymbolServer;
