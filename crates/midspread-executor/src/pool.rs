//! Round-robin pool of equivalent exchange connections.
//!
//! Every outbound call takes the next connection in rotation and is
//! bounded by the configured per-call timeout. There are no retries at
//! this level; a failed or timed-out call surfaces to the caller.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use midspread_core::{Balances, OpenOrder, OrderBook, OrderId};
use tracing::{trace, warn};

use crate::client::{DynExchangeClient, OrderRequest};
use crate::error::{ExecError, ExecResult};

pub struct ConnectionPool {
    clients: Vec<DynExchangeClient>,
    cursor: AtomicUsize,
    call_timeout: Duration,
}

impl ConnectionPool {
    /// # Errors
    /// `EmptyPool` if `clients` is empty.
    pub fn new(clients: Vec<DynExchangeClient>, call_timeout: Duration) -> ExecResult<Self> {
        if clients.is_empty() {
            return Err(ExecError::EmptyPool);
        }
        Ok(Self {
            clients,
            cursor: AtomicUsize::new(0),
            call_timeout,
        })
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    fn next(&self) -> &DynExchangeClient {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        trace!(connection = index, "Selected connection");
        &self.clients[index]
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = ExecResult<T>>,
    ) -> ExecResult<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.call_timeout.as_millis() as u64;
                warn!(op, timeout_ms, "Exchange call timed out");
                Err(ExecError::Timeout { op, timeout_ms })
            }
        }
    }

    pub async fn get_order_book(&self, pair: &str, depth: u32) -> ExecResult<OrderBook> {
        let client = self.next();
        self.bounded("get_order_book", client.get_order_book(pair, depth))
            .await
    }

    pub async fn get_account_balance(&self) -> ExecResult<Balances> {
        let client = self.next();
        self.bounded("get_account_balance", client.get_account_balance())
            .await
    }

    pub async fn get_open_orders(&self) -> ExecResult<Vec<OpenOrder>> {
        let client = self.next();
        self.bounded("get_open_orders", client.get_open_orders())
            .await
    }

    pub async fn add_order(&self, request: OrderRequest) -> ExecResult<OrderId> {
        let client = self.next();
        self.bounded("add_order", client.add_order(request)).await
    }

    pub async fn cancel_order(&self, id: &OrderId) -> ExecResult<()> {
        let client = self.next();
        self.bounded("cancel_order", client.cancel_order(id)).await
    }

    pub async fn get_server_time(&self) -> ExecResult<DateTime<Utc>> {
        let client = self.next();
        self.bounded("get_server_time", client.get_server_time())
            .await
    }
}
