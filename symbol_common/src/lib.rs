//!
//! Common types and utilities shared by the symbol server and client.
//!
//! This crate aggregates:
//! - `error` — unified error type `SymbolError` used across the workspace.
//! - `result` — handy `Result<T, SymbolError>` alias.
//! - `symbol` — symbol records, cache snapshots and the IPC response payload.
//! - `exchanges` — exchange key validation, list parsing and the default list.
//! - `endpoint` — per-exchange socket naming and the one-shot read helper.
#![warn(missing_docs)]
pub mod endpoint;
pub mod error;
pub mod exchanges;
pub mod result;
pub mod symbol;

pub use error::SymbolError;
pub use result::Result;
pub use symbol::{Response, SymbolRecord, SymbolSnapshot};
