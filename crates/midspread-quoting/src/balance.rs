//! Inventory balance ratio.

use std::fmt;

use midspread_core::{Balances, MarketPair, Price};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{QuoteError, QuoteResult};

/// Symbol under which the account balance endpoint reports `asset`.
///
/// Pair symbols use the short `XBT` while balances are keyed `XXBT`.
pub fn account_symbol(asset: &str) -> &str {
    match asset {
        "XBT" => "XXBT",
        other => other,
    }
}

/// `R = (base holdings * price) / quote holdings`.
///
/// `R > 1` means the account holds more value in the base asset than in
/// the quote asset; `R < 1` the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub struct BalanceRatio(Decimal);

impl BalanceRatio {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn to_f64(&self) -> Option<f64> {
        self.0.to_f64()
    }
}

impl fmt::Display for BalanceRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the balance ratio for `pair` valued at `price`.
///
/// # Errors
/// - `MissingBalance` if either asset is absent from `balances`
/// - `InvalidBalanceRatio` if the quote holding is zero or any input is negative
pub fn balance_ratio(
    balances: &Balances,
    pair: &MarketPair,
    price: Price,
) -> QuoteResult<BalanceRatio> {
    let base_symbol = account_symbol(&pair.base);
    let quote_symbol = account_symbol(&pair.quote);

    let base = balances
        .get(base_symbol)
        .ok_or_else(|| QuoteError::MissingBalance(base_symbol.to_string()))?;
    let quote = balances
        .get(quote_symbol)
        .ok_or_else(|| QuoteError::MissingBalance(quote_symbol.to_string()))?;

    if quote.is_zero() {
        return Err(QuoteError::InvalidBalanceRatio(format!(
            "{quote_symbol} holding is zero"
        )));
    }
    if base.inner().is_sign_negative() || quote.inner().is_sign_negative() || !price.is_positive()
    {
        return Err(QuoteError::InvalidBalanceRatio(format!(
            "negative input: {base_symbol}={base} {quote_symbol}={quote} price={price}"
        )));
    }

    Ok(BalanceRatio(base.notional(price) / quote.inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use midspread_core::Size;
    use rust_decimal_macros::dec;

    fn balances(entries: &[(&str, Decimal)]) -> Balances {
        entries
            .iter()
            .map(|(s, v)| (s.to_string(), Size::new(*v)))
            .collect()
    }

    #[test]
    fn test_ratio() {
        let pair = MarketPair::new("XETH", "ZEUR");
        let b = balances(&[("XETH", dec!(2)), ("ZEUR", dec!(400))]);
        let r = balance_ratio(&b, &pair, Price::new(dec!(300))).unwrap();
        assert_eq!(r.value(), dec!(1.5));
    }

    #[test]
    fn test_xbt_alias() {
        let pair = MarketPair::new("XBT", "ZEUR");
        let b = balances(&[("XXBT", dec!(1)), ("ZEUR", dec!(100))]);
        let r = balance_ratio(&b, &pair, Price::new(dec!(100))).unwrap();
        assert_eq!(r.value(), dec!(1));
    }

    #[test]
    fn test_missing_holding() {
        let pair = MarketPair::new("XETH", "ZEUR");
        let b = balances(&[("XETH", dec!(2))]);
        assert!(matches!(
            balance_ratio(&b, &pair, Price::new(dec!(300))),
            Err(QuoteError::MissingBalance(s)) if s == "ZEUR"
        ));
    }

    #[test]
    fn test_zero_quote_is_undefined() {
        let pair = MarketPair::new("XETH", "ZEUR");
        let b = balances(&[("XETH", dec!(2)), ("ZEUR", dec!(0))]);
        assert!(matches!(
            balance_ratio(&b, &pair, Price::new(dec!(300))),
            Err(QuoteError::InvalidBalanceRatio(_))
        ));
    }
}
