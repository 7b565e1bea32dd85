//! Result type alias shared across the workspace.
//!
//! This module defines a convenient alias that defaults the error type to the
//! common `SymbolError`, so functions can simply return `Result<T>`.
use crate::error::SymbolError;

/// Workspace-wide `Result` alias with `SymbolError` as the default error.
pub type Result<T, E = SymbolError> = std::result::Result<T, E>;
