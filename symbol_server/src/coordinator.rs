//! Refresh coordination: at most one in-flight refresh per exchange.
//!
//! The first caller to `refresh` an exchange becomes the leader and performs
//! the fetch; every concurrent caller joins the leader's `InFlight` token and
//! receives the same outcome without touching the provider. The leader always
//! releases through a drop guard, so an exchange cannot stay locked even if the
//! fetch panics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use symbol_common::SymbolSnapshot;

use crate::fetcher::Fetcher;
use crate::model::cache_store::CacheStore;
use crate::model::in_flight::InFlight;

enum Claim {
    Leader(Arc<InFlight>),
    Joined(Arc<InFlight>),
}

/// Deduplicates refreshes per exchange and writes results into the store.
pub struct RefreshCoordinator {
    store: Arc<CacheStore>,
    fetcher: Fetcher,
    in_flight: Mutex<HashMap<String, Arc<InFlight>>>,
}

impl RefreshCoordinator {
    /// Creates a coordinator writing into `store` with data from `fetcher`.
    pub fn new(store: Arc<CacheStore>, fetcher: Fetcher) -> Self {
        Self {
            store,
            fetcher,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Refreshes `exchange`, or waits for the refresh already in flight.
    ///
    /// Returns whether the refresh that ran succeeded. On failure the previous
    /// snapshot is left untouched.
    pub fn refresh(&self, exchange: &str) -> bool {
        if !self.store.contains(exchange) {
            warn!("[{}] Refresh requested for unregistered exchange", exchange);
            return false;
        }

        let flight = match self.claim(exchange) {
            Claim::Joined(flight) => {
                debug!("[{}] Waiting for in-flight update to complete...", exchange);
                return flight.wait();
            }
            Claim::Leader(flight) => flight,
        };

        let mut release = Release {
            coordinator: self,
            exchange,
            flight,
            succeeded: false,
        };
        release.succeeded = self.update(exchange);
        release.succeeded
    }

    /// Blocks until the in-flight refresh of `exchange` settles, if there is one.
    ///
    /// Returns `None` when nothing was in flight.
    pub fn wait_for(&self, exchange: &str) -> Option<bool> {
        let flight = {
            let table = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            table.get(exchange).cloned()
        }?;
        Some(flight.wait())
    }

    /// Whether a refresh of `exchange` is currently in flight.
    pub fn is_refreshing(&self, exchange: &str) -> bool {
        let table = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        table.contains_key(exchange)
    }

    /// Store this coordinator writes into.
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    fn claim(&self, exchange: &str) -> Claim {
        let mut table = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(flight) = table.get(exchange) {
            return Claim::Joined(Arc::clone(flight));
        }
        let flight = Arc::new(InFlight::new());
        table.insert(exchange.to_string(), Arc::clone(&flight));
        Claim::Leader(flight)
    }

    fn update(&self, exchange: &str) -> bool {
        info!("[{}] Updating symbols...", exchange);
        match self.fetcher.fetch(exchange) {
            Ok(details) => {
                let symbols = details.active_symbols();
                let count = symbols.len();
                self.store.set(exchange, SymbolSnapshot::fresh(symbols));
                info!("[{}] Updated with {} symbols", exchange, count);
                true
            }
            Err(e) => {
                warn!("[{}] Failed to update: {}", exchange, e);
                false
            }
        }
    }
}

/// Releases the leader's lock on every exit path.
struct Release<'a> {
    coordinator: &'a RefreshCoordinator,
    exchange: &'a str,
    flight: Arc<InFlight>,
    succeeded: bool,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        {
            let mut table = self
                .coordinator
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if table
                .get(self.exchange)
                .is_some_and(|f| Arc::ptr_eq(f, &self.flight))
            {
                table.remove(self.exchange);
            }
        }
        self.flight.settle(self.succeeded);
    }
}
