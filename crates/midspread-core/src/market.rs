//! Traded pair identity and price grid.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::Price;
use crate::error::{CoreError, Result};

/// Reference settlement unit for cross-rate conversion.
pub const SETTLEMENT_UNIT: &str = "XBT";

/// True for the settlement unit under either of its exchange names
/// (`XBT`, `XXBT`).
pub fn is_settlement_asset(asset: &str) -> bool {
    asset == SETTLEMENT_UNIT || asset.strip_prefix('X') == Some(SETTLEMENT_UNIT)
}

/// A two-asset market, e.g. `XXBT` / `ZEUR`.
///
/// `base` is the asset whose volume is quoted (market 1) and `quote`
/// is the asset prices are expressed in (market 2).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketPair {
    pub base: String,
    pub quote: String,
}

impl MarketPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Like [`MarketPair::new`] but rejects blank asset symbols.
    pub fn try_new(base: &str, quote: &str) -> Result<Self> {
        let (base, quote) = (base.trim(), quote.trim());
        if base.is_empty() || quote.is_empty() {
            return Err(CoreError::InvalidMarket(format!("'{base}'/'{quote}'")));
        }
        Ok(Self::new(base, quote))
    }

    /// Exchange pair symbol (`XXBTZEUR`).
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for MarketPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}

/// Minimum price increment and the rounding precision derived from it.
///
/// Precision is the number of leading fractional zeros of the increment
/// plus one (`0.01` → 2, `0.005` → 3, `0.1` → 1); increments of one or
/// more round to whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSize {
    increment: Decimal,
    digits: u32,
}

impl TickSize {
    pub fn from_increment(increment: Decimal) -> Result<Self> {
        if increment <= Decimal::ZERO {
            return Err(CoreError::InvalidTickSize(increment.to_string()));
        }

        let mut digits = 0;
        if increment < Decimal::ONE {
            digits = 1;
            let mut scaled = increment;
            while scaled * Decimal::TEN < Decimal::ONE {
                scaled *= Decimal::TEN;
                digits += 1;
            }
        }

        Ok(Self { increment, digits })
    }

    #[inline]
    pub fn increment(&self) -> Decimal {
        self.increment
    }

    #[inline]
    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Round a price onto the quoting precision.
    #[inline]
    pub fn round(&self, price: Price) -> Price {
        price.round_dp(self.digits)
    }

    /// One increment above `price`.
    #[inline]
    pub fn step_up(&self, price: Price) -> Price {
        Price::new(price.inner() + self.increment)
    }

    /// One increment below `price`.
    #[inline]
    pub fn step_down(&self, price: Price) -> Price {
        Price::new(price.inner() - self.increment)
    }
}
