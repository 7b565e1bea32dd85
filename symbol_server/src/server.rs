//! Lifecycle of the symbol server: registration, start and graceful stop.
//!
//! `SymbolServer` owns every piece of shared state (cache store, refresh
//! coordinator, scheduler, endpoints) and hands references to the parts that
//! need them.

use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use log::{error, info, warn};
use symbol_common::endpoint::exchange_from_file_name;
use symbol_common::exchanges::validate_key;
use symbol_common::{SymbolError, SymbolSnapshot};

use crate::config::ServerConfig;
use crate::coordinator::RefreshCoordinator;
use crate::fetcher::Fetcher;
use crate::listener::EndpointManager;
use crate::model::cache_store::CacheStore;
use crate::provider::MetadataProvider;
use crate::scheduler::{RefreshScheduler, SweepReport, SweepTimer};

/// Access mode of a freshly created socket directory.
const SOCKET_DIR_MODE: u32 = 0o755;

/// The symbol server: cached exchange snapshots served over Unix sockets.
pub struct SymbolServer {
    config: ServerConfig,
    store: Arc<CacheStore>,
    coordinator: Arc<RefreshCoordinator>,
    scheduler: Arc<RefreshScheduler>,
    endpoints: EndpointManager,
    timer: Mutex<Option<SweepTimer>>,
}

impl SymbolServer {
    /// Builds a server and makes sure the socket directory exists.
    pub fn new(config: ServerConfig, provider: Arc<dyn MetadataProvider>) -> Result<Self, SymbolError> {
        if !config.socket_dir.exists() {
            info!("Creating socket directory: {}", config.socket_dir.display());
            DirBuilder::new()
                .recursive(true)
                .mode(SOCKET_DIR_MODE)
                .create(&config.socket_dir)
                .map_err(|e| {
                    SymbolError::StartupFatal(format!(
                        "cannot create socket directory {}: {}",
                        config.socket_dir.display(),
                        e
                    ))
                })?;
        }

        let store = Arc::new(CacheStore::new());
        let fetcher = Fetcher::new(provider, config.retry);
        let coordinator = Arc::new(RefreshCoordinator::new(Arc::clone(&store), fetcher));
        let scheduler = Arc::new(RefreshScheduler::new(Arc::clone(&coordinator)));
        let endpoints = EndpointManager::new(config.socket_dir.clone(), Arc::clone(&coordinator));

        Ok(Self {
            config,
            store,
            coordinator,
            scheduler,
            endpoints,
            timer: Mutex::new(None),
        })
    }

    /// Registers `exchange`: empty snapshot, endpoint, then one refresh.
    ///
    /// Returns `Ok(false)` if it was already registered. A failure to open the
    /// endpoint is logged and leaves the exchange registered but unreachable;
    /// a failed refresh leaves it serving the empty snapshot.
    pub fn register_exchange(&self, exchange: &str) -> Result<bool, SymbolError> {
        validate_key(exchange)?;
        if !self.store.register(exchange) {
            info!("[{}] Already registered", exchange);
            return Ok(false);
        }
        info!("[{}] Registering...", exchange);

        if let Err(e) = self.endpoints.open(exchange) {
            error!("[{}] {}", exchange, e);
        }

        self.coordinator.refresh(exchange);
        Ok(true)
    }

    /// Removes leftover endpoints, runs the first sweep and starts the timer.
    pub fn start(&self) -> Result<Option<SweepReport>, SymbolError> {
        self.remove_stale_endpoints()?;

        let report = self.scheduler.sweep_all();

        let mut timer = self.timer.lock()?;
        if let Some(previous) = timer.take() {
            previous.stop();
        }
        *timer = Some(self.scheduler.start(self.config.refresh_interval));
        info!("Symbol server started");
        Ok(report)
    }

    /// Cancels the timer and closes every endpoint. Cleanup errors are logged,
    /// never escalated. Safe to call more than once.
    pub fn stop(&self) {
        let timer = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(timer) = timer {
            timer.stop();
        }

        let failures = self.endpoints.close_all();
        if !failures.is_empty() {
            warn!("{} endpoints failed to clean up", failures.len());
        }
        info!("Symbol server stopped");
    }

    /// Runs one sweep now. `None` if a sweep is already running.
    pub fn sweep_all(&self) -> Option<SweepReport> {
        self.scheduler.sweep_all()
    }

    /// Refreshes one exchange now, or joins its in-flight refresh.
    pub fn refresh(&self, exchange: &str) -> bool {
        self.coordinator.refresh(exchange)
    }

    /// Cached snapshot of `exchange`.
    pub fn snapshot(&self, exchange: &str) -> Option<Arc<SymbolSnapshot>> {
        self.store.get(exchange)
    }

    /// Whether a refresh of `exchange` is in flight.
    pub fn is_refreshing(&self, exchange: &str) -> bool {
        self.coordinator.is_refreshing(exchange)
    }

    /// Registered exchanges, sorted.
    pub fn exchanges(&self) -> Vec<String> {
        self.store.keys()
    }

    /// Endpoint address of `exchange`.
    pub fn socket_path(&self, exchange: &str) -> PathBuf {
        self.endpoints.socket_path(exchange)
    }

    /// Endpoint manager, for opening endpoints outside the registration flow.
    pub fn endpoints(&self) -> &EndpointManager {
        &self.endpoints
    }

    fn remove_stale_endpoints(&self) -> Result<(), SymbolError> {
        info!("Cleaning up old socket files...");
        let dir = self.endpoints.socket_dir();
        let entries = fs::read_dir(dir).map_err(|e| {
            SymbolError::StartupFatal(format!("cannot read socket directory {}: {}", dir.display(), e))
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read socket directory entry: {}", e);
                    continue;
                }
            };
            let file_name = entry.file_name();
            let Some(exchange) = file_name.to_str().and_then(exchange_from_file_name) else {
                continue;
            };
            if self.store.contains(exchange) {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => info!("Removed old socket file: {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

impl Drop for SymbolServer {
    fn drop(&mut self) {
        let timer_running = self
            .timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if timer_running || !self.endpoints.open_keys().is_empty() {
            self.stop();
        }
    }
}
