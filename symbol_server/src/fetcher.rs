//! Provider calls with a per-attempt timeout and bounded linear backoff.
//!
//! Each attempt runs the provider on its own worker thread and races it against
//! `recv_timeout`. When the timeout wins, the worker keeps running but its
//! result lands in a channel nobody reads any more and is discarded.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, bounded};
use log::{debug, warn};
use symbol_common::SymbolError;

use crate::provider::{ExchangeDetails, MetadataProvider};

/// Retry policy applied around every provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deadline for a single provider call.
    pub timeout: Duration,
    /// Total number of attempts, at least one.
    pub max_retries: u32,
    /// Backoff unit; the wait after attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Fetch-with-retry wrapper around a `MetadataProvider`.
pub struct Fetcher {
    provider: Arc<dyn MetadataProvider>,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Wraps `provider` with `policy`.
    pub fn new(provider: Arc<dyn MetadataProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Fetches `exchange`, retrying on provider failure or timeout until the
    /// attempt budget is spent.
    pub fn fetch(&self, exchange: &str) -> Result<ExchangeDetails, SymbolError> {
        let max_retries = self.policy.max_retries.max(1);
        let mut attempt = 1;

        loop {
            debug!("[{}] Fetching (attempt {}/{})", exchange, attempt, max_retries);
            let err = match self.attempt(exchange) {
                Ok(details) => return Ok(details),
                Err(e) => e,
            };

            if attempt >= max_retries {
                return Err(SymbolError::FetchExhausted {
                    exchange: exchange.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.base_delay * attempt;
            warn!(
                "[{}] Attempt {} failed: {}. Retrying in {:?}",
                exchange, attempt, err, delay
            );
            thread::sleep(delay);
            attempt += 1;
        }
    }

    fn attempt(&self, exchange: &str) -> Result<ExchangeDetails, SymbolError> {
        let (tx, rx) = bounded(1);
        let provider = Arc::clone(&self.provider);
        let key = exchange.to_string();

        thread::Builder::new()
            .name(format!("fetch-{}", exchange))
            .spawn(move || {
                // The receiver is gone once the deadline passed; dropping the result is intended.
                let _ = tx.send(provider.fetch_details(&key));
            })?;

        match rx.recv_timeout(self.policy.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SymbolError::Timeout {
                exchange: exchange.to_string(),
                after_ms: self.policy.timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(SymbolError::ChannelRecv(format!(
                "provider worker for {} exited without a result",
                exchange
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AvailableSymbol;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(200),
            max_retries,
            base_delay: Duration::from_millis(5),
        }
    }

    /// Provider failing the first `failures` calls, then succeeding.
    fn flaky(failures: usize, calls: Arc<AtomicUsize>) -> Arc<dyn MetadataProvider> {
        Arc::new(move |_: &str| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                Err(SymbolError::Provider(format!("boom #{}", n + 1)))
            } else {
                Ok(ExchangeDetails::new(vec![AvailableSymbol::active("BTC-X", "future")]))
            }
        })
    }

    #[test]
    fn succeeds_when_budget_covers_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Two failures then success: needs three attempts.
        let fetcher = Fetcher::new(flaky(2, calls.clone()), policy(3));
        let details = fetcher.fetch("alpha").unwrap();
        assert_eq!(details.available_symbols.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exhausts_when_budget_is_one_short() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Fetcher::new(flaky(3, calls.clone()), policy(3));
        match fetcher.fetch("alpha") {
            Err(SymbolError::FetchExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, SymbolError::Provider(_)));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn slow_provider_times_out_and_backs_off_linearly() {
        let provider: Arc<dyn MetadataProvider> = Arc::new(|_: &str| {
            thread::sleep(Duration::from_millis(300));
            Ok(ExchangeDetails::default())
        });
        let fetcher = Fetcher::new(
            provider,
            RetryPolicy {
                timeout: Duration::from_millis(30),
                max_retries: 3,
                base_delay: Duration::from_millis(20),
            },
        );

        let started = Instant::now();
        let err = fetcher.fetch("beta").unwrap_err();
        let elapsed = started.elapsed();

        match err {
            SymbolError::FetchExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, SymbolError::Timeout { after_ms: 30, .. }));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        // 3 timeouts (90ms) + backoff 20ms + 40ms.
        assert!(elapsed >= Duration::from_millis(150), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(600), "late result was awaited: {:?}", elapsed);
    }

    #[test]
    fn zero_retries_still_makes_one_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Fetcher::new(flaky(0, calls.clone()), policy(0));
        assert!(fetcher.fetch("alpha").is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
