//! Exchange access for the midspread quoting engine.
//!
//! - `ExchangeClient`: the capability surface of an authenticated session
//! - `ConnectionPool`: round-robin over equivalent sessions with per-call timeouts
//! - `OrderLifecycleManager`: band cancellation and post-only submission
//! - `KrakenPublicClient` / `PaperExchange`: public data and a simulated account

pub mod client;
pub mod error;
pub mod kraken;
pub mod lifecycle;
pub mod paper;
pub mod pool;

pub use client::{
    BoxFuture, DynExchangeClient, ExchangeClient, MockCall, MockExchange, OrderRequest,
};
pub use error::{ExecError, ExecResult};
pub use kraken::{KrakenPublicClient, MarketData, DEFAULT_PUBLIC_URL};
pub use lifecycle::{CancelSummary, OrderLifecycleManager, OrderTiming, PostOutcome};
pub use paper::PaperExchange;
pub use pool::ConnectionPool;
