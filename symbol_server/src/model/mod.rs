//! In-memory state owned by the symbol server.
//!
//! - `cache_store` — exchange snapshots, the single source of truth for readers.
//! - `in_flight` — the per-exchange refresh token waiters block on.

pub mod cache_store;
pub mod in_flight;
