//! Symbol server binary.
//!
//! Registers every configured exchange, serves each one on
//! `<socket-dir>/<exchange>.sock`, refreshes them on a timer and shuts down
//! cleanly on SIGINT/SIGTERM. Exits with a non-zero status when startup fails.
use std::sync::Arc;
use std::thread;

use clap::Parser;
use crossbeam_channel::bounded;
use log::{error, info};
use symbol_common::{Result, SymbolError};
use symbol_server::{Args, MetadataProvider, ServerConfig, SymbolServer, TardisProvider};

fn main() -> Result<(), SymbolError> {
    init_logger();
    let config = ServerConfig::try_from(Args::parse())?;

    let (signal_tx, signal_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = signal_tx.try_send(());
    })
    .map_err(|e| SymbolError::StartupFatal(format!("cannot install signal handler: {}", e)))?;

    let provider: Arc<dyn MetadataProvider> =
        Arc::new(TardisProvider::new(&config.provider_url, config.retry.timeout)?);
    let exchanges = config.exchanges.clone();
    let server = SymbolServer::new(config, provider)?;

    info!("Registering {} exchanges...", exchanges.len());
    thread::scope(|scope| {
        for exchange in &exchanges {
            let server = &server;
            scope.spawn(move || {
                if let Err(e) = server.register_exchange(exchange) {
                    error!("[{}] Registration failed: {}", exchange, e);
                }
            });
        }
    });

    if let Err(e) = server.start() {
        error!("Failed to start server: {}", e);
        server.stop();
        return Err(e);
    }

    signal_rx
        .recv()
        .map_err(|e| SymbolError::ChannelRecv(e.to_string()))?;
    info!("Received shutdown signal, shutting down...");
    server.stop();
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
