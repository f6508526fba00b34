//! Core domain types for the midspread quoting engine.
//!
//! - `Price`, `Size`: precision-safe numeric types
//! - `MarketPair`, `TickSize`: pair identity and price grid
//! - `OrderBook`, `OpenOrder`, `Balances`: per-cycle exchange snapshots
//! - `OrderSide`, `OrderType`, `OrderId`: order vocabulary

pub mod book;
pub mod decimal;
pub mod error;
pub mod market;
pub mod order;

pub use book::{Balances, BookLevel, OpenOrder, OrderBook};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use market::{is_settlement_asset, MarketPair, TickSize, SETTLEMENT_UNIT};
pub use order::{OrderId, OrderSide, OrderType};
