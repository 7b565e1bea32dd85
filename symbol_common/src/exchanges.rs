//! Exchange keys: validation, list parsing and the built-in default list.

use std::io::BufRead;

use crate::error::SymbolError;

/// Exchanges served when no exchange list file is supplied.
pub const DEFAULT_EXCHANGES: &[&str] = &[
    "bitmex",
    "deribit",
    "binance-futures",
    "binance-delivery",
    "binance-options",
    "binance-european-options",
    "binance",
    "ftx",
    "okex-futures",
    "okex-options",
    "okex-swap",
    "okex",
    "okex-spreads",
    "huobi-dm",
    "huobi-dm-swap",
    "huobi-dm-linear-swap",
    "huobi",
    "bitfinex-derivatives",
    "bitfinex",
    "coinbase",
    "coinbase-international",
    "cryptofacilities",
    "kraken",
    "bitstamp",
    "gemini",
    "poloniex",
    "bybit",
    "bybit-spot",
    "bybit-options",
    "phemex",
    "delta",
    "ftx-us",
    "binance-us",
    "gate-io-futures",
    "gate-io",
    "okcoin",
    "bitflyer",
    "hitbtc",
    "coinflex",
    "binance-jersey",
    "binance-dex",
    "upbit",
    "ascendex",
    "dydx",
    "dydx-v4",
    "serum",
    "mango",
    "huobi-dm-options",
    "star-atlas",
    "crypto-com",
    "crypto-com-derivatives",
    "kucoin",
    "kucoin-futures",
    "bitnomial",
    "woo-x",
    "blockchain-com",
    "bitget",
    "bitget-futures",
    "hyperliquid",
];

/// Checks that `key` can name an endpoint file inside the socket directory.
pub fn validate_key(key: &str) -> Result<(), SymbolError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains('/')
        || key.contains('\0');
    if bad {
        return Err(SymbolError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Trait providing list parsing for exchange keys.
pub trait ExchangeListParser {
    /// Parses exchange keys from a buffered reader.
    ///
    /// Keys may be separated by new lines, commas or whitespace. Blank lines and
    /// lines starting with `#` are skipped, and duplicates are dropped while
    /// keeping first-seen order. Returns an error if any key is invalid.
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Vec<String>, SymbolError>;
}

/// Marker type carrying the exchange list parser.
pub struct ExchangeList;

impl ExchangeListParser for ExchangeList {
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Vec<String>, SymbolError> {
        let mut exchanges: Vec<String> = Vec::new();

        for line_result in reader.lines() {
            let line = line_result.map_err(SymbolError::Io)?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }

            for key in trimmed_line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
            {
                validate_key(key)?;
                if !exchanges.iter().any(|e| e == key) {
                    exchanges.push(key.to_string());
                }
            }
        }
        Ok(exchanges)
    }
}

/// The default exchange list as owned keys.
pub fn default_exchanges() -> Vec<String> {
    DEFAULT_EXCHANGES.iter().map(|e| e.to_string()).collect()
}
