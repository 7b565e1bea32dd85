//! Authoritative in-memory cache: exchange key -> latest symbol snapshot.
//!
//! Snapshots are immutable and shared as `Arc<SymbolSnapshot>`. Replacing an
//! entry swaps the whole `Arc` under a short write lock, so a reader holds
//! either the old snapshot or the new one, never a mix of both. The set of keys
//! present in the store is the registration set.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use symbol_common::SymbolSnapshot;

/// Exchange snapshots keyed by exchange name.
#[derive(Default)]
pub struct CacheStore {
    entries: RwLock<BTreeMap<String, Arc<SymbolSnapshot>>>,
}

impl CacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot for `exchange`, or `None` if it is not registered.
    pub fn get(&self, exchange: &str) -> Option<Arc<SymbolSnapshot>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(exchange).cloned()
    }

    /// Replaces the snapshot for `exchange`.
    pub fn set(&self, exchange: &str, snapshot: SymbolSnapshot) {
        let snapshot = Arc::new(snapshot);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(exchange.to_string(), snapshot);
    }

    /// Registers `exchange` with an empty snapshot. Returns `false` when it was
    /// already registered, leaving the existing snapshot untouched.
    pub fn register(&self, exchange: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(exchange) {
            return false;
        }
        entries.insert(exchange.to_string(), Arc::new(SymbolSnapshot::empty()));
        true
    }

    /// Removes `exchange` from the store.
    pub fn remove(&self, exchange: &str) -> Option<Arc<SymbolSnapshot>> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(exchange)
    }

    /// Whether `exchange` is registered.
    pub fn contains(&self, exchange: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(exchange)
    }

    /// Registered exchanges in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.keys().cloned().collect()
    }

    /// Number of registered exchanges.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    /// Whether no exchange is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbol_common::SymbolRecord;

    #[test]
    fn register_is_idempotent() {
        let store = CacheStore::new();
        assert!(store.register("bitmex"));
        store.set("bitmex", SymbolSnapshot::fresh(vec![SymbolRecord::new("XBTUSD", "perpetual")]));
        assert!(!store.register("bitmex"));
        assert_eq!(store.get("bitmex").unwrap().symbols.len(), 1);
    }

    #[test]
    fn unregistered_key_is_absent() {
        let store = CacheStore::new();
        assert!(store.get("omega").is_none());
        assert!(!store.contains("omega"));
        assert!(store.is_empty());
    }

    #[test]
    fn set_swaps_whole_snapshot() {
        let store = CacheStore::new();
        store.register("deribit");
        let before = store.get("deribit").unwrap();

        store.set("deribit", SymbolSnapshot::fresh(vec![SymbolRecord::new("BTC-PERPETUAL", "perpetual")]));

        // A reader holding the old Arc still sees the old, complete snapshot.
        assert!(before.symbols.is_empty());
        assert!(before.last_updated.is_none());
        let after = store.get("deribit").unwrap();
        assert!(after.is_populated());
        assert_eq!(after.symbols[0].symbol_id, "BTC-PERPETUAL");
    }

    #[test]
    fn keys_are_sorted_and_remove_deregisters() {
        let store = CacheStore::new();
        for key in ["okex", "binance", "kraken"] {
            store.register(key);
        }
        assert_eq!(store.keys(), vec!["binance", "kraken", "okex"]);
        assert!(store.remove("kraken").is_some());
        assert_eq!(store.len(), 2);
        assert!(!store.contains("kraken"));
    }
}
