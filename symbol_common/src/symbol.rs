//! Symbol records, cached snapshots and the IPC response payload.
//!
//! A `SymbolSnapshot` is what the server caches per exchange and what a client
//! receives after connecting to that exchange's endpoint. The JSON field names
//! (`lastUpdated`, `symbol_id`, `type`) are part of the wire contract.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SymbolError;

/// A single tradable instrument listed by an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    /// Instrument identifier as reported by the provider.
    pub symbol_id: String,
    /// Instrument kind (`spot`, `perpetual`, `future`, `option`, ...).
    #[serde(rename = "type")]
    pub kind: String,
}

impl SymbolRecord {
    /// Creates a record from an identifier and a kind.
    pub fn new(symbol_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            symbol_id: symbol_id.into(),
            kind: kind.into(),
        }
    }
}

/// Cached view of one exchange: when it was last refreshed and what it lists.
///
/// `last_updated == None` means the exchange is registered but has never been
/// refreshed successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    /// ISO-8601 UTC timestamp of the last successful refresh.
    #[serde(rename = "lastUpdated")]
    pub last_updated: Option<String>,
    /// Active symbols, in provider order.
    pub symbols: Vec<SymbolRecord>,
}

impl SymbolSnapshot {
    /// Snapshot of a registered exchange that was never refreshed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot stamped with the current time.
    pub fn fresh(symbols: Vec<SymbolRecord>) -> Self {
        Self::at(Utc::now(), symbols)
    }

    /// Snapshot stamped with `updated`, formatted as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
    pub fn at(updated: DateTime<Utc>, symbols: Vec<SymbolRecord>) -> Self {
        Self {
            last_updated: Some(updated.to_rfc3339_opts(SecondsFormat::Millis, true)),
            symbols,
        }
    }

    /// Whether the snapshot ever received provider data.
    pub fn is_populated(&self) -> bool {
        self.last_updated.is_some()
    }
}

/// The single JSON object written to a client before the connection closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Structured error payload, e.g. `{"error":"Exchange not available"}`.
    Error {
        /// Human-readable error message.
        error: String,
    },
    /// Successful read of the cached snapshot.
    Snapshot(SymbolSnapshot),
}

impl Response {
    /// Builds an error payload from any `SymbolError`.
    pub fn from_error(err: &SymbolError) -> Self {
        Response::Error {
            error: err.to_string(),
        }
    }

    /// Encode the response to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, SymbolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a response received from an endpoint.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, SymbolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_uses_wire_field_names() {
        let json = serde_json::to_string(&SymbolRecord::new("BTC-X", "future")).unwrap();
        assert_eq!(json, r#"{"symbol_id":"BTC-X","type":"future"}"#);
    }

    #[test]
    fn empty_snapshot_serializes_null_timestamp() {
        let json = serde_json::to_string(&SymbolSnapshot::empty()).unwrap();
        assert_eq!(json, r#"{"lastUpdated":null,"symbols":[]}"#);
    }

    #[test]
    fn timestamp_matches_iso_millis_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let snapshot = SymbolSnapshot::at(at, vec![]);
        assert_eq!(snapshot.last_updated.as_deref(), Some("2024-05-01T12:30:00.000Z"));
        assert!(snapshot.is_populated());
    }

    #[test]
    fn error_payload_parses_as_error_variant() {
        let parsed = Response::from_json_slice(br#"{"error":"Exchange not available"}"#).unwrap();
        assert_eq!(
            parsed,
            Response::Error {
                error: "Exchange not available".into()
            }
        );
    }

    #[test]
    fn snapshot_payload_parses_as_snapshot_variant() {
        let raw = br#"{"lastUpdated":"2024-05-01T12:30:00.000Z","symbols":[{"symbol_id":"ETHUSD","type":"perpetual"}]}"#;
        match Response::from_json_slice(raw).unwrap() {
            Response::Snapshot(s) => {
                assert_eq!(s.symbols, vec![SymbolRecord::new("ETHUSD", "perpetual")]);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
