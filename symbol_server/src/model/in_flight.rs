//! Per-exchange in-flight refresh token.
//!
//! An `InFlight` is created by the thread that leads a refresh and shared with
//! every thread that wants to wait for it. Settling records the outcome once and
//! wakes all waiters at the same time.

use std::sync::{Condvar, Mutex, PoisonError};

/// Outcome slot plus a broadcast condition for one in-flight refresh.
#[derive(Default)]
pub struct InFlight {
    outcome: Mutex<Option<bool>>,
    settled: Condvar,
}

impl InFlight {
    /// Creates an unsettled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `succeeded` and wakes every waiter. Only the first call counts.
    pub fn settle(&self, succeeded: bool) {
        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if outcome.is_none() {
            *outcome = Some(succeeded);
        }
        self.settled.notify_all();
    }

    /// Blocks until the refresh settles and returns whether it succeeded.
    pub fn wait(&self) -> bool {
        let outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = self
            .settled
            .wait_while(outcome, |o| o.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        outcome.unwrap_or(false)
    }

    /// Outcome if already settled.
    pub fn outcome(&self) -> Option<bool> {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn all_waiters_see_the_outcome() {
        let flight = Arc::new(InFlight::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let flight = Arc::clone(&flight);
                thread::spawn(move || flight.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        flight.settle(true);

        for w in waiters {
            assert!(w.join().unwrap());
        }
    }

    #[test]
    fn first_settle_wins() {
        let flight = InFlight::new();
        assert_eq!(flight.outcome(), None);
        flight.settle(false);
        flight.settle(true);
        assert_eq!(flight.outcome(), Some(false));
        assert!(!flight.wait());
    }
}
