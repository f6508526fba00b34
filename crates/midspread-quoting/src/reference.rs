//! Reference (mid) price derived from a live order book.

use chrono::{DateTime, Utc};
use midspread_core::{OrderBook, Price};
use serde::{Deserialize, Serialize};

use crate::error::{QuoteError, QuoteResult};

/// Mid price captured for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePrice {
    pub value: Price,
    pub timestamp: DateTime<Utc>,
}

impl ReferencePrice {
    /// Build from a book snapshot taken at `timestamp`.
    pub fn from_book(book: &OrderBook, timestamp: DateTime<Utc>) -> QuoteResult<Self> {
        Ok(Self {
            value: mid_price(book)?,
            timestamp,
        })
    }
}

/// `0.5 * (best bid + best ask)`.
///
/// # Errors
/// `EmptyBook` if either side has no levels.
pub fn mid_price(book: &OrderBook) -> QuoteResult<Price> {
    let best_bid = book.best_bid().ok_or(QuoteError::EmptyBook("bids"))?;
    let best_ask = book.best_ask().ok_or(QuoteError::EmptyBook("asks"))?;
    Ok(best_bid.midpoint(best_ask))
}
