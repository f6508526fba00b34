//! Market and account snapshots read from the exchange.
//!
//! Everything here is captured once per cycle and never mutated; the
//! exchange remains the only authoritative store for open orders.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::decimal::{Price, Size};
use crate::order::{OrderId, OrderSide};

/// One price level (or one resting order) of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub volume: Size,
}

impl BookLevel {
    pub fn new(price: Price, volume: Size) -> Self {
        Self { price, volume }
    }
}

/// Order book snapshot.
///
/// Levels are kept as received; best prices are computed rather than
/// assumed from ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
}

impl OrderBook {
    pub fn new(asks: Vec<BookLevel>, bids: Vec<BookLevel>) -> Self {
        Self { asks, bids }
    }

    /// Highest bid price.
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.iter().map(|l| l.price).max()
    }

    /// Lowest ask price.
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.iter().map(|l| l.price).min()
    }

    /// Levels resting on `side` (bids for buy, asks for sell).
    pub fn levels(&self, side: OrderSide) -> &[BookLevel] {
        match side {
            OrderSide::Buy => &self.bids,
            OrderSide::Sell => &self.asks,
        }
    }

    /// Best price on the side an order of `side` would trade against.
    pub fn best_opposing(&self, side: OrderSide) -> Option<Price> {
        match side {
            OrderSide::Buy => self.best_ask(),
            OrderSide::Sell => self.best_bid(),
        }
    }
}

/// A resting order owned by this account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: OrderId,
    pub side: OrderSide,
    pub price: Price,
    pub volume: Size,
}

/// Account holdings keyed by exchange asset symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balances(HashMap<String, Size>);

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<Size> {
        self.0.get(symbol).copied()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, volume: Size) {
        self.0.insert(symbol.into(), volume);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Size)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Size)> for Balances {
    fn from_iter<I: IntoIterator<Item = (String, Size)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
