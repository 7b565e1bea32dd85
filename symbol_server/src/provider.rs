//! Metadata provider interface and the HTTP implementation used in production.
//!
//! A provider answers one question: which symbols does an exchange list right
//! now. Latency and failures are untrusted; `fetcher` wraps every call with a
//! timeout and bounded retries.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use symbol_common::{SymbolError, SymbolRecord};

/// Default base URL of the exchange metadata API.
pub const DEFAULT_PROVIDER_URL: &str = "https://api.tardis.dev/v1";

/// Raw symbol entry as returned by the provider.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSymbol {
    /// Instrument identifier.
    pub id: String,
    /// Instrument kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// First date with data, if reported.
    #[serde(default)]
    pub available_since: Option<String>,
    /// Last date with data; set only for delisted/expired instruments.
    #[serde(default)]
    pub available_to: Option<String>,
}

impl AvailableSymbol {
    /// Convenience constructor for a still-listed symbol.
    pub fn active(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            available_since: None,
            available_to: None,
        }
    }

    /// Convenience constructor for a symbol whose availability ended at `to`.
    pub fn expired(id: impl Into<String>, kind: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            available_to: Some(to.into()),
            ..Self::active(id, kind)
        }
    }

    /// Whether the instrument has a defined end of availability.
    pub fn is_expired(&self) -> bool {
        self.available_to.as_deref().is_some_and(|to| !to.is_empty())
    }
}

/// Provider response for one exchange.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeDetails {
    /// Every symbol the provider knows about, expired ones included.
    #[serde(default)]
    pub available_symbols: Vec<AvailableSymbol>,
}

impl ExchangeDetails {
    /// Wraps a raw symbol list.
    pub fn new(available_symbols: Vec<AvailableSymbol>) -> Self {
        Self { available_symbols }
    }

    /// Drops expired instruments and maps the rest into wire records,
    /// preserving provider order.
    pub fn active_symbols(&self) -> Vec<SymbolRecord> {
        self.available_symbols
            .iter()
            .filter(|s| !s.is_expired())
            .map(|s| SymbolRecord::new(s.id.clone(), s.kind.clone()))
            .collect()
    }
}

/// Source of exchange metadata.
pub trait MetadataProvider: Send + Sync + 'static {
    /// Fetches the details of `exchange` or fails.
    fn fetch_details(&self, exchange: &str) -> Result<ExchangeDetails, SymbolError>;
}

impl<F> MetadataProvider for F
where
    F: Fn(&str) -> Result<ExchangeDetails, SymbolError> + Send + Sync + 'static,
{
    fn fetch_details(&self, exchange: &str) -> Result<ExchangeDetails, SymbolError> {
        self(exchange)
    }
}

/// HTTP provider backed by the Tardis exchange details endpoint.
pub struct TardisProvider {
    client: Client,
    base_url: String,
}

impl TardisProvider {
    /// Creates a provider for `base_url`. `request_timeout` is a transport-level
    /// ceiling; the fetcher applies the per-attempt timeout on top of it.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, SymbolError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SymbolError::Provider(format!("HTTP client init failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn details_url(&self, exchange: &str) -> String {
        format!("{}/exchanges/{}", self.base_url, exchange)
    }
}

impl MetadataProvider for TardisProvider {
    fn fetch_details(&self, exchange: &str) -> Result<ExchangeDetails, SymbolError> {
        let url = self.details_url(exchange);
        debug!("[{}] GET {}", exchange, url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| SymbolError::Provider(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SymbolError::Provider(format!(
                "{} responded with HTTP {}",
                url, status
            )));
        }

        response
            .json::<ExchangeDetails>()
            .map_err(|e| SymbolError::Provider(format!("invalid body from {}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_are_dropped_wherever_they_appear() {
        let details = ExchangeDetails::new(vec![
            AvailableSymbol::expired("OLD-A", "future", "2020-01-01"),
            AvailableSymbol::active("BTC-X", "future"),
            AvailableSymbol::expired("OLD-B", "option", "2021-06-30"),
            AvailableSymbol::active("ETHUSD", "perpetual"),
            AvailableSymbol::expired("OLD-C", "spot", "2022-03-01"),
        ]);
        assert_eq!(
            details.active_symbols(),
            vec![
                SymbolRecord::new("BTC-X", "future"),
                SymbolRecord::new("ETHUSD", "perpetual"),
            ]
        );
    }

    #[test]
    fn empty_available_to_counts_as_open_ended() {
        let details = ExchangeDetails::new(vec![AvailableSymbol::expired("XBTUSD", "perpetual", "")]);
        assert_eq!(details.active_symbols().len(), 1);
    }

    #[test]
    fn parses_provider_body() {
        let body = r#"{
            "id": "bitmex",
            "name": "BitMEX",
            "availableSymbols": [
                {"id": "XBTUSD", "type": "perpetual", "availableSince": "2019-03-30T00:00:00.000Z"},
                {"id": "XBTZ19", "type": "future", "availableSince": "2019-03-30T00:00:00.000Z", "availableTo": "2019-12-27T00:00:00.000Z"}
            ]
        }"#;
        let details: ExchangeDetails = serde_json::from_str(body).unwrap();
        assert_eq!(details.available_symbols.len(), 2);
        assert!(details.available_symbols[1].is_expired());
        assert_eq!(details.active_symbols(), vec![SymbolRecord::new("XBTUSD", "perpetual")]);
    }

    #[test]
    fn closures_are_providers() {
        let provider = |exchange: &str| -> Result<ExchangeDetails, SymbolError> {
            Ok(ExchangeDetails::new(vec![AvailableSymbol::active(exchange, "spot")]))
        };
        let details = provider.fetch_details("kraken").unwrap();
        assert_eq!(details.available_symbols[0].id, "kraken");
    }

    #[test]
    fn details_url_trims_trailing_slash() {
        let provider = TardisProvider::new("https://api.example.test/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(provider.details_url("deribit"), "https://api.example.test/v1/exchanges/deribit");
    }
}
