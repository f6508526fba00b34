//! Rolling-mean sanity guard for reference prices.
//!
//! Keeps every observed reference price for the trailing 24 hours and
//! rejects a candidate that strays more than `tolerance` (relative) from
//! the window mean. The candidate is recorded whether or not it passes,
//! so a genuine regime change eventually drags the mean along with it.
//!
//! A breach is never clamped: the caller aborts the cycle.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use midspread_core::Price;
use rust_decimal::Decimal;
use tracing::{debug, error, warn};

use crate::error::{QuoteError, QuoteResult};

/// Trailing window length in hours.
pub const GUARD_WINDOW_HOURS: i64 = 24;

/// Result of a passing guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Price lies within the band around `mean`.
    Accepted { mean: Decimal },
    /// Window was empty; the price became the new seed unchecked.
    Seeded,
}

/// Trailing-window price guard.
#[derive(Debug, Clone)]
pub struct PriceGuard {
    tolerance: Decimal,
    horizon: Duration,
    /// Time-ordered samples, oldest at the front.
    window: VecDeque<(DateTime<Utc>, Decimal)>,
    /// Sum of `window` prices.
    sum: Decimal,
}

impl PriceGuard {
    pub fn new(tolerance: Decimal) -> Self {
        Self::with_horizon(tolerance, Duration::hours(GUARD_WINDOW_HOURS))
    }

    pub fn with_horizon(tolerance: Decimal, horizon: Duration) -> Self {
        Self {
            tolerance,
            horizon,
            window: VecDeque::new(),
            sum: Decimal::ZERO,
        }
    }

    /// Record a trusted price without checking it (startup seeding).
    pub fn seed(&mut self, price: Price, at: DateTime<Utc>) {
        debug!(price = %price, "Seeding price guard");
        self.push(price.inner(), at);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    /// Mean of the current window, if any samples remain.
    pub fn mean(&self) -> Option<Decimal> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.sum / Decimal::from(self.window.len()))
    }

    /// Evaluate `price` observed at `now`.
    ///
    /// Prunes samples older than the horizon, compares against the mean of
    /// what is left, then appends `price` regardless of the verdict.
    ///
    /// # Errors
    /// `PriceOutOfRange` when `price` falls outside
    /// `[mean * (1 - tolerance), mean * (1 + tolerance)]`.
    pub fn check(&mut self, price: Price, now: DateTime<Utc>) -> QuoteResult<GuardOutcome> {
        self.prune(now);

        let Some(mean) = self.mean() else {
            warn!(price = %price, "Price guard window empty, accepting price as new seed");
            self.push(price.inner(), now);
            return Ok(GuardOutcome::Seeded);
        };

        let lower = mean * (Decimal::ONE - self.tolerance);
        let upper = mean * (Decimal::ONE + self.tolerance);
        let candidate = price.inner();
        self.push(candidate, now);

        if candidate < lower || candidate > upper {
            error!(
                price = %candidate,
                mean = %mean,
                lower = %lower,
                upper = %upper,
                samples = self.window.len(),
                "Price guard breached"
            );
            return Err(QuoteError::PriceOutOfRange {
                price: candidate,
                mean,
                lower,
                upper,
            });
        }

        debug!(
            price = %candidate,
            mean = %mean,
            samples = self.window.len(),
            "Price guard passed"
        );
        Ok(GuardOutcome::Accepted { mean })
    }

    fn push(&mut self, price: Decimal, at: DateTime<Utc>) {
        self.window.push_back((at, price));
        self.sum += price;
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.horizon;
        while let Some(&(ts, price)) = self.window.front() {
            if ts >= cutoff {
                break;
            }
            self.window.pop_front();
            self.sum -= price;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn seeded_guard(mean: Decimal, now: DateTime<Utc>) -> PriceGuard {
        let mut guard = PriceGuard::new(dec!(0.05));
        guard.seed(Price::new(mean), now - Duration::minutes(5));
        guard
    }

    #[test]
    fn test_breach_is_rejected_and_recorded() {
        let now = Utc::now();
        let mut guard = seeded_guard(dec!(100), now);

        let result = guard.check(Price::new(dec!(110)), now);
        assert!(matches!(result, Err(QuoteError::PriceOutOfRange { .. })));
        assert_eq!(guard.len(), 2);
        assert_eq!(guard.mean(), Some(dec!(105)));
    }

    #[test]
    fn test_within_band_is_accepted_and_recorded() {
        let now = Utc::now();
        let mut guard = seeded_guard(dec!(100), now);

        let outcome = guard.check(Price::new(dec!(103)), now).unwrap();
        assert_eq!(outcome, GuardOutcome::Accepted { mean: dec!(100) });
        assert_eq!(guard.len(), 2);
        assert_eq!(guard.mean(), Some(dec!(101.5)));
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        let now = Utc::now();
        let mut guard = seeded_guard(dec!(100), now);
        assert!(guard.check(Price::new(dec!(105)), now).is_ok());

        let mut guard = seeded_guard(dec!(100), now);
        assert!(guard.check(Price::new(dec!(95)), now).is_ok());
    }

    #[test]
    fn test_old_samples_are_pruned() {
        let now = Utc::now();
        let mut guard = PriceGuard::new(dec!(0.05));
        guard.seed(Price::new(dec!(50)), now - Duration::hours(30));
        guard.seed(Price::new(dec!(100)), now - Duration::hours(1));

        // 50 has aged out, so 103 is compared against 100 alone
        let outcome = guard.check(Price::new(dec!(103)), now).unwrap();
        assert_eq!(outcome, GuardOutcome::Accepted { mean: dec!(100) });
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_empty_window_seeds() {
        let now = Utc::now();
        let mut guard = PriceGuard::new(dec!(0.05));
        assert_eq!(guard.mean(), None);

        let outcome = guard.check(Price::new(dec!(100)), now).unwrap();
        assert_eq!(outcome, GuardOutcome::Seeded);
        assert_eq!(guard.mean(), Some(dec!(100)));

        assert!(guard.check(Price::new(dec!(120)), now).is_err());
    }

    #[test]
    fn test_fully_aged_window_reseeds() {
        let now = Utc::now();
        let mut guard = PriceGuard::with_horizon(dec!(0.05), Duration::minutes(10));
        guard.seed(Price::new(dec!(100)), now - Duration::minutes(30));

        let outcome = guard.check(Price::new(dec!(200)), now).unwrap();
        assert_eq!(outcome, GuardOutcome::Seeded);
        assert_eq!(guard.len(), 1);
    }
}
