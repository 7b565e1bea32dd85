//! Per-exchange Unix socket endpoints.
//!
//! `EndpointManager` owns one listening socket per exchange. Each accepted
//! connection gets its own handler thread that waits out any in-flight refresh
//! of that exchange, writes exactly one JSON object and closes. The server never
//! reads from the client: connecting is the request.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use symbol_common::endpoint::socket_path;
use symbol_common::exchanges::validate_key;
use symbol_common::{Response, SymbolError};

use crate::coordinator::RefreshCoordinator;

/// Access mode of endpoint sockets: any local user may connect.
pub const SOCKET_MODE: u32 = 0o666;

struct Endpoint {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

/// Opens, serves and closes the per-exchange endpoints.
pub struct EndpointManager {
    socket_dir: PathBuf,
    coordinator: Arc<RefreshCoordinator>,
    endpoints: Mutex<HashMap<String, Endpoint>>,
}

impl EndpointManager {
    /// Creates a manager placing sockets in `socket_dir`.
    pub fn new(socket_dir: impl Into<PathBuf>, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            socket_dir: socket_dir.into(),
            coordinator,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding the endpoint sockets.
    pub fn socket_dir(&self) -> &Path {
        &self.socket_dir
    }

    /// Endpoint address of `exchange`.
    pub fn socket_path(&self, exchange: &str) -> PathBuf {
        socket_path(&self.socket_dir, exchange)
    }

    /// Exchanges with an open listener, sorted.
    pub fn open_keys(&self) -> Vec<String> {
        let endpoints = self.endpoints.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = endpoints.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Binds the endpoint of `exchange` and starts accepting connections.
    ///
    /// A stale socket file at the same address is removed first. Opening an
    /// exchange that is already open does nothing.
    pub fn open(&self, exchange: &str) -> Result<(), SymbolError> {
        validate_key(exchange)?;
        let mut endpoints = self.endpoints.lock()?;
        if endpoints.contains_key(exchange) {
            debug!("[{}] Endpoint already open", exchange);
            return Ok(());
        }

        let path = self.socket_path(exchange);
        let bind_error = |source: io::Error| SymbolError::EndpointBind {
            exchange: exchange.to_string(),
            source,
        };

        if fs::symlink_metadata(&path).is_ok() {
            info!("[{}] Removing existing socket file: {}", exchange, path.display());
            fs::remove_file(&path).map_err(bind_error)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_error)?;
        if let Err(e) = fs::set_permissions(&path, fs::Permissions::from_mode(SOCKET_MODE)) {
            warn!("[{}] Failed to set socket permissions: {}", exchange, e);
        }
        info!("[{}] Server listening on {}", exchange, path.display());

        let stop = Arc::new(AtomicBool::new(false));
        let accept_thread = {
            let exchange = exchange.to_string();
            let stop = Arc::clone(&stop);
            let coordinator = Arc::clone(&self.coordinator);
            thread::Builder::new()
                .name(format!("accept-{}", exchange))
                .spawn(move || accept_loop(listener, exchange, coordinator, stop))
                .map_err(bind_error)?
        };

        endpoints.insert(
            exchange.to_string(),
            Endpoint {
                path,
                stop,
                accept_thread: Some(accept_thread),
            },
        );
        Ok(())
    }

    /// Stops the listener of `exchange` and removes its socket file.
    ///
    /// Closing an exchange that is not open only cleans up a leftover file.
    pub fn close(&self, exchange: &str) -> Result<(), SymbolError> {
        let endpoint = {
            let mut endpoints = self.endpoints.lock()?;
            endpoints.remove(exchange)
        };

        let Some(mut endpoint) = endpoint else {
            return remove_socket_file(&self.socket_path(exchange));
        };

        endpoint.stop.store(true, Ordering::SeqCst);
        // Unblock `accept` so the loop can observe the stop flag.
        match UnixStream::connect(&endpoint.path) {
            Ok(_) => {
                if let Some(handle) = endpoint.accept_thread.take() {
                    if handle.join().is_err() {
                        error!("[{}] Accept thread panicked", exchange);
                    }
                }
            }
            Err(e) => warn!(
                "[{}] Could not wake accept loop ({}); detaching it",
                exchange, e
            ),
        }

        remove_socket_file(&endpoint.path)?;
        info!("[{}] Endpoint closed", exchange);
        Ok(())
    }

    /// Closes every open endpoint. Per-exchange failures are logged and
    /// returned; they never stop the remaining endpoints from closing.
    pub fn close_all(&self) -> Vec<(String, SymbolError)> {
        let mut failures = Vec::new();
        for exchange in self.open_keys() {
            if let Err(e) = self.close(&exchange) {
                error!("[{}] Failed to cleanup: {}", exchange, e);
                failures.push((exchange, e));
            }
        }
        failures
    }
}

fn remove_socket_file(path: &Path) -> Result<(), SymbolError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SymbolError::Io(e)),
    }
}

fn accept_loop(
    listener: UnixListener,
    exchange: String,
    coordinator: Arc<RefreshCoordinator>,
    stop: Arc<AtomicBool>,
) {
    // Every accepted connection is served, including one accepted after the
    // stop flag was raised; the loop exits only once it has been dispatched.
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                debug!("[{}] New client connected", exchange);
                let handler_exchange = exchange.clone();
                let coordinator = Arc::clone(&coordinator);
                let spawned = thread::Builder::new()
                    .name(format!("serve-{}", exchange))
                    .spawn(move || {
                        serve(stream, &handler_exchange, &coordinator);
                    });
                if let Err(e) = spawned {
                    error!("[{}] Failed to spawn connection handler: {}", exchange, e);
                }
            }
            Err(e) => error!("[{}] Accept error: {}", exchange, e),
        }
        if stop.load(Ordering::SeqCst) {
            break;
        }
    }
    debug!("[{}] Accept loop finished", exchange);
}

fn serve(stream: UnixStream, exchange: &str, coordinator: &RefreshCoordinator) {
    match handle_connection(stream, exchange, coordinator) {
        Ok(()) => {}
        // The wake-up connection made by `close` hangs up without reading.
        Err(SymbolError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("[{}] Client went away before the response was written", exchange);
        }
        Err(e) => error!("[{}] Error handling request: {}", exchange, e),
    }
}

/// Serves one connection: wait for any in-flight refresh, then write the
/// current snapshot (or an error object) and close.
fn handle_connection(
    mut stream: UnixStream,
    exchange: &str,
    coordinator: &RefreshCoordinator,
) -> Result<(), SymbolError> {
    if let Some(succeeded) = coordinator.wait_for(exchange) {
        debug!(
            "[{}] Waited for in-flight update (succeeded: {})",
            exchange, succeeded
        );
    }

    let payload =
        render(exchange, coordinator).or_else(|e| Response::from_error(&e).to_json_bytes())?;
    stream.write_all(&payload)?;
    stream.flush()?;
    // The peer may already be gone; the payload is written either way.
    let _ = stream.shutdown(Shutdown::Write);
    Ok(())
}

fn render(exchange: &str, coordinator: &RefreshCoordinator) -> Result<Vec<u8>, SymbolError> {
    match coordinator.store().get(exchange) {
        Some(snapshot) => {
            debug!("[{}] Sending data ({} symbols)", exchange, snapshot.symbols.len());
            Ok(serde_json::to_vec(snapshot.as_ref())?)
        }
        None => {
            debug!("[{}] No data available", exchange);
            let err = SymbolError::ExchangeNotAvailable(exchange.to_string());
            Response::from_error(&err).to_json_bytes()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{Fetcher, RetryPolicy};
    use crate::model::cache_store::CacheStore;
    use crate::provider::{AvailableSymbol, ExchangeDetails, MetadataProvider};
    use crossbeam_channel::unbounded;
    use std::time::Duration;
    use symbol_common::endpoint::request;
    use symbol_common::{SymbolRecord, SymbolSnapshot};

    const READ_TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

    fn manager(dir: &Path, provider: Arc<dyn MetadataProvider>) -> EndpointManager {
        let store = Arc::new(CacheStore::new());
        let policy = RetryPolicy {
            timeout: Duration::from_secs(5),
            max_retries: 1,
            base_delay: Duration::from_millis(1),
        };
        let coordinator = Arc::new(RefreshCoordinator::new(store, Fetcher::new(provider, policy)));
        EndpointManager::new(dir, coordinator)
    }

    fn idle_provider() -> Arc<dyn MetadataProvider> {
        Arc::new(|_: &str| Ok(ExchangeDetails::default()))
    }

    #[test]
    fn open_replaces_stale_file_and_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = manager(dir.path(), idle_provider());
        let path = endpoints.socket_path("alpha");
        fs::write(&path, b"stale").unwrap();

        endpoints.open("alpha").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, SOCKET_MODE);
        assert_eq!(endpoints.open_keys(), vec!["alpha"]);
        endpoints.close("alpha").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn registered_exchange_serves_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = manager(dir.path(), idle_provider());
        let store = endpoints.coordinator.store();
        store.register("alpha");
        store.set("alpha", SymbolSnapshot::fresh(vec![SymbolRecord::new("BTC-X", "future")]));
        endpoints.open("alpha").unwrap();

        match request(&endpoints.socket_path("alpha"), READ_TIMEOUT).unwrap() {
            Response::Snapshot(s) => {
                assert!(s.is_populated());
                assert_eq!(s.symbols, vec![SymbolRecord::new("BTC-X", "future")]);
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert!(endpoints.close_all().is_empty());
    }

    #[test]
    fn unregistered_exchange_gets_error_object() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = manager(dir.path(), idle_provider());
        endpoints.open("omega").unwrap();

        let response = request(&endpoints.socket_path("omega"), READ_TIMEOUT).unwrap();
        assert_eq!(
            response,
            Response::Error {
                error: "Exchange not available".into()
            }
        );
        endpoints.close("omega").unwrap();
    }

    #[test]
    fn read_waits_for_in_flight_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let (gate_tx, gate_rx) = unbounded::<()>();
        let provider: Arc<dyn MetadataProvider> = Arc::new(move |_: &str| {
            let _ = gate_rx.recv();
            Ok(ExchangeDetails::new(vec![AvailableSymbol::active("ETHUSD", "perpetual")]))
        });
        let endpoints = Arc::new(manager(dir.path(), provider));
        endpoints.coordinator.store().register("alpha");
        endpoints.open("alpha").unwrap();

        let refresher = {
            let coordinator = Arc::clone(&endpoints.coordinator);
            thread::spawn(move || coordinator.refresh("alpha"))
        };
        while !endpoints.coordinator.is_refreshing("alpha") {
            thread::sleep(Duration::from_millis(2));
        }

        let (done_tx, done_rx) = unbounded();
        let reader = {
            let path = endpoints.socket_path("alpha");
            thread::spawn(move || {
                let response = request(&path, READ_TIMEOUT);
                let _ = done_tx.send(());
                response
            })
        };

        // No response while the refresh is still running.
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        gate_tx.send(()).unwrap();

        assert!(refresher.join().unwrap());
        match reader.join().unwrap().unwrap() {
            Response::Snapshot(s) => {
                assert_eq!(s.symbols, vec![SymbolRecord::new("ETHUSD", "perpetual")]);
            }
            other => panic!("unexpected response: {:?}", other),
        }
        endpoints.close_all();
    }

    #[test]
    fn connection_accepted_while_closing_still_gets_a_response() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = manager(dir.path(), idle_provider());
        endpoints.coordinator.store().register("alpha");
        endpoints.open("alpha").unwrap();

        // Raise the stop flag without the wake-up connection, as `close` does
        // just before connecting; the next client lands in that window.
        {
            let open = endpoints.endpoints.lock().unwrap();
            open["alpha"].stop.store(true, Ordering::SeqCst);
        }

        let response = request(&endpoints.socket_path("alpha"), READ_TIMEOUT).unwrap();
        assert_eq!(response, Response::Snapshot(SymbolSnapshot::empty()));

        endpoints.close("alpha").unwrap();
        assert!(!endpoints.socket_path("alpha").exists());
        assert!(endpoints.open_keys().is_empty());
    }

    #[test]
    fn open_rejects_invalid_key() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = manager(dir.path(), idle_provider());
        assert!(matches!(endpoints.open("../escape"), Err(SymbolError::InvalidKey(_))));
    }

    #[test]
    fn bind_failure_is_reported_per_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let endpoints = manager(&missing, idle_provider());
        match endpoints.open("alpha") {
            Err(SymbolError::EndpointBind { exchange, .. }) => assert_eq!(exchange, "alpha"),
            other => panic!("expected bind failure, got {:?}", other),
        }
        assert!(endpoints.open_keys().is_empty());
    }

    #[test]
    fn close_of_unknown_exchange_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = manager(dir.path(), idle_provider());
        endpoints.close("never-opened").unwrap();
    }
}
