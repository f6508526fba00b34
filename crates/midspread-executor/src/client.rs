//! Exchange client trait.
//!
//! The engine only ever talks to an already-authenticated client through
//! this trait, which keeps session setup out of the quoting path and lets
//! tests and the paper venue stand in for the real exchange.

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use midspread_core::{Balances, OpenOrder, OrderBook, OrderId, OrderSide, OrderType, Price, Size};
use parking_lot::Mutex;

use crate::error::{ExecError, ExecResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A limit order ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Exchange pair symbol.
    pub pair: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub volume: Size,
    pub price: Price,
    /// Absolute expiry; the exchange drops the order after this instant.
    pub expire_at: DateTime<Utc>,
    /// Reject instead of taking liquidity.
    pub post_only: bool,
}

/// Capability surface of a pre-authenticated exchange session.
pub trait ExchangeClient: Send + Sync {
    fn get_order_book<'a>(&'a self, pair: &'a str, depth: u32)
        -> BoxFuture<'a, ExecResult<OrderBook>>;

    fn get_account_balance(&self) -> BoxFuture<'_, ExecResult<Balances>>;

    fn get_open_orders(&self) -> BoxFuture<'_, ExecResult<Vec<OpenOrder>>>;

    fn add_order(&self, request: OrderRequest) -> BoxFuture<'_, ExecResult<OrderId>>;

    fn cancel_order<'a>(&'a self, id: &'a OrderId) -> BoxFuture<'a, ExecResult<()>>;

    fn get_server_time(&self) -> BoxFuture<'_, ExecResult<DateTime<Utc>>>;
}

/// Arc wrapper for ExchangeClient trait objects.
pub type DynExchangeClient = Arc<dyn ExchangeClient>;

/// Mock calls that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    OrderBook,
    Balance,
    OpenOrders,
    AddOrder,
    CancelOrder,
    ServerTime,
}

/// In-memory exchange for tests.
///
/// Posted orders become open orders and cancelled ones disappear, so
/// consecutive cycles see each other's effects.
#[derive(Debug)]
pub struct MockExchange {
    default_book: Mutex<OrderBook>,
    pair_books: Mutex<HashMap<String, OrderBook>>,
    balances: Mutex<Balances>,
    open_orders: Mutex<Vec<OpenOrder>>,
    server_time: Mutex<DateTime<Utc>>,
    failing: Mutex<HashSet<MockCall>>,
    failing_cancels: Mutex<HashSet<OrderId>>,
    delay: Mutex<Option<Duration>>,
    /// Recorded (pair, depth) book requests.
    book_requests: Mutex<Vec<(String, u32)>>,
    added: Mutex<Vec<OrderRequest>>,
    cancelled: Mutex<Vec<OrderId>>,
    /// Every call in order, for sequencing assertions.
    calls: Mutex<Vec<MockCall>>,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            default_book: Mutex::new(OrderBook::default()),
            pair_books: Mutex::new(HashMap::new()),
            balances: Mutex::new(Balances::new()),
            open_orders: Mutex::new(Vec::new()),
            server_time: Mutex::new(Utc::now()),
            failing: Mutex::new(HashSet::new()),
            failing_cancels: Mutex::new(HashSet::new()),
            delay: Mutex::new(None),
            book_requests: Mutex::new(Vec::new()),
            added: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Book returned for any pair without its own book.
    pub fn set_book(&self, book: OrderBook) {
        *self.default_book.lock() = book;
    }

    pub fn set_pair_book(&self, pair: impl Into<String>, book: OrderBook) {
        self.pair_books.lock().insert(pair.into(), book);
    }

    pub fn set_balances(&self, balances: Balances) {
        *self.balances.lock() = balances;
    }

    pub fn set_open_orders(&self, orders: Vec<OpenOrder>) {
        *self.open_orders.lock() = orders;
    }

    pub fn set_server_time(&self, time: DateTime<Utc>) {
        *self.server_time.lock() = time;
    }

    pub fn set_failing(&self, call: MockCall, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(call);
        } else {
            set.remove(&call);
        }
    }

    pub fn fail_cancel_of(&self, id: OrderId) {
        self.failing_cancels.lock().insert(id);
    }

    /// Delay every call, for timeout tests.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn book_requests(&self) -> Vec<(String, u32)> {
        self.book_requests.lock().clone()
    }

    pub fn added_orders(&self) -> Vec<OrderRequest> {
        self.added.lock().clone()
    }

    pub fn cancelled_orders(&self) -> Vec<OrderId> {
        self.cancelled.lock().clone()
    }

    pub fn open_orders(&self) -> Vec<OpenOrder> {
        self.open_orders.lock().clone()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn clear_records(&self) {
        self.book_requests.lock().clear();
        self.added.lock().clear();
        self.cancelled.lock().clear();
        self.calls.lock().clear();
    }

    async fn enter(&self, call: MockCall) -> ExecResult<()> {
        self.calls.lock().push(call);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(&call) {
            return Err(ExecError::Api(format!("mock failure: {call:?}")));
        }
        Ok(())
    }
}

impl ExchangeClient for MockExchange {
    fn get_order_book<'a>(
        &'a self,
        pair: &'a str,
        depth: u32,
    ) -> BoxFuture<'a, ExecResult<OrderBook>> {
        Box::pin(async move {
            self.book_requests.lock().push((pair.to_string(), depth));
            self.enter(MockCall::OrderBook).await?;
            let book = self
                .pair_books
                .lock()
                .get(pair)
                .cloned()
                .unwrap_or_else(|| self.default_book.lock().clone());
            Ok(book)
        })
    }

    fn get_account_balance(&self) -> BoxFuture<'_, ExecResult<Balances>> {
        Box::pin(async move {
            self.enter(MockCall::Balance).await?;
            Ok(self.balances.lock().clone())
        })
    }

    fn get_open_orders(&self) -> BoxFuture<'_, ExecResult<Vec<OpenOrder>>> {
        Box::pin(async move {
            self.enter(MockCall::OpenOrders).await?;
            Ok(self.open_orders.lock().clone())
        })
    }

    fn add_order(&self, request: OrderRequest) -> BoxFuture<'_, ExecResult<OrderId>> {
        Box::pin(async move {
            self.enter(MockCall::AddOrder).await?;
            let id = OrderId::generate();
            self.open_orders.lock().push(OpenOrder {
                id: id.clone(),
                side: request.side,
                price: request.price,
                volume: request.volume,
            });
            self.added.lock().push(request);
            Ok(id)
        })
    }

    fn cancel_order<'a>(&'a self, id: &'a OrderId) -> BoxFuture<'a, ExecResult<()>> {
        Box::pin(async move {
            self.enter(MockCall::CancelOrder).await?;
            if self.failing_cancels.lock().contains(id) {
                return Err(ExecError::CancelFailed(format!("mock refused {id}")));
            }
            self.open_orders.lock().retain(|o| &o.id != id);
            self.cancelled.lock().push(id.clone());
            Ok(())
        })
    }

    fn get_server_time(&self) -> BoxFuture<'_, ExecResult<DateTime<Utc>>> {
        Box::pin(async move {
            self.enter(MockCall::ServerTime).await?;
            Ok(*self.server_time.lock())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> OrderRequest {
        OrderRequest {
            pair: "XETHZEUR".to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::Limit,
            volume: Size::new(dec!(1)),
            price: Price::new(dec!(100)),
            expire_at: Utc::now(),
            post_only: true,
        }
    }

    #[tokio::test]
    async fn test_mock_posted_orders_become_open() {
        let mock = MockExchange::new();
        let id = mock.add_order(request()).await.unwrap();

        let open = mock.get_open_orders().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, id);

        mock.cancel_order(&id).await.unwrap();
        assert!(mock.get_open_orders().await.unwrap().is_empty());
        assert_eq!(mock.cancelled_orders(), vec![id]);
    }

    #[tokio::test]
    async fn test_mock_forced_failures() {
        let mock = MockExchange::new();
        mock.set_failing(MockCall::AddOrder, true);
        assert!(mock.add_order(request()).await.is_err());
        assert!(mock.added_orders().is_empty());

        let id = OrderId::from_string("OABC");
        mock.fail_cancel_of(id.clone());
        assert!(matches!(
            mock.cancel_order(&id).await,
            Err(ExecError::CancelFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_pair_books() {
        let mock = MockExchange::new();
        let book = OrderBook::new(vec![], vec![]);
        mock.set_pair_book("XETHXXBT", book.clone());

        assert_eq!(mock.get_order_book("XETHXXBT", 10).await.unwrap(), book);
        assert_eq!(mock.book_requests(), vec![("XETHXXBT".to_string(), 10)]);
    }
}
