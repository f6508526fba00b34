//! Cancel/replace of resting orders, one volume band at a time.
//!
//! Cancels are fire-and-forget: the new order is posted without waiting
//! for the exchange to confirm the cancellations, so for a short window
//! both the old and the new order may rest at once.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use midspread_core::{OpenOrder, OrderId, OrderSide, OrderType, Price, Size, TickSize};
use midspread_quoting::VolumeBand;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::client::OrderRequest;
use crate::error::{ExecError, ExecResult};
use crate::pool::ConnectionPool;

/// Longest expiry accepted, one year.
const MAX_EXPIRY_SECS: i64 = 365 * 24 * 3600;

/// Order timing offsets in seconds, relative to exchange server time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTiming {
    pub start_offset_secs: u64,
    pub expire_offset_secs: u64,
}

impl OrderTiming {
    /// Start and expiry for a tier whose volume is `factor` times the
    /// smallest dispatched tier.
    pub fn window(
        &self,
        server_time: DateTime<Utc>,
        factor: Decimal,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = server_time + Duration::seconds(self.start_offset_secs as i64);
        let scaled = (Decimal::from(self.expire_offset_secs) * factor)
            .round()
            .to_i64()
            .unwrap_or(MAX_EXPIRY_SECS)
            .clamp(0, MAX_EXPIRY_SECS);
        (start, server_time + Duration::seconds(scaled))
    }
}

/// Outcome of cancelling one band.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelSummary {
    pub cancelled: Vec<OrderId>,
    pub failed: Vec<OrderId>,
}

/// Outcome of one post attempt that got as far as submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    Posted { id: OrderId, price: Price },
    /// Submission failed; the tier is skipped for this cycle.
    Failed { price: Price, reason: String },
}

pub struct OrderLifecycleManager {
    pool: Arc<ConnectionPool>,
    pair: String,
    tick: TickSize,
    timing: OrderTiming,
}

impl OrderLifecycleManager {
    pub fn new(
        pool: Arc<ConnectionPool>,
        pair: impl Into<String>,
        tick: TickSize,
        timing: OrderTiming,
    ) -> Self {
        Self {
            pool,
            pair: pair.into(),
            tick,
            timing,
        }
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// This account's open orders on `side`.
    ///
    /// # Errors
    /// Any venue failure; the caller treats it as cycle-fatal.
    pub async fn open_orders(&self, side: OrderSide) -> ExecResult<Vec<OpenOrder>> {
        let orders = self.pool.get_open_orders().await?;
        let same_side: Vec<_> = orders.into_iter().filter(|o| o.side == side).collect();
        debug!(side = %side, count = same_side.len(), "Fetched open orders");
        Ok(same_side)
    }

    /// Cancel every order in `orders` whose volume falls in `band`.
    ///
    /// Best effort: a failed cancel is logged and the batch continues.
    pub async fn cancel_band(&self, orders: &[OpenOrder], band: &VolumeBand) -> CancelSummary {
        let mut summary = CancelSummary::default();

        for order in orders.iter().filter(|o| band.contains(o.volume)) {
            match self.pool.cancel_order(&order.id).await {
                Ok(()) => {
                    info!(
                        order_id = %order.id,
                        side = %order.side,
                        price = %order.price,
                        volume = %order.volume,
                        "Cancelled resting order"
                    );
                    summary.cancelled.push(order.id.clone());
                }
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "Cancel failed, continuing");
                    summary.failed.push(order.id.clone());
                }
            }
        }

        summary
    }

    /// Post a post-only limit order for one tier.
    ///
    /// Re-checks `price` against a fresh top-of-book and nudges it one
    /// increment away from the opposing best if it would cross.
    ///
    /// # Errors
    /// Book fetch failures, and `ServerTimeUnavailable` when the expiry
    /// cannot be anchored. A failed submission is not an error: it is
    /// reported as [`PostOutcome::Failed`].
    pub async fn post(
        &self,
        side: OrderSide,
        price: Price,
        volume: Size,
        expiry_factor: Decimal,
    ) -> ExecResult<PostOutcome> {
        let top = self.pool.get_order_book(&self.pair, 1).await?;
        let mut price = price;
        match (side, top.best_opposing(side)) {
            (OrderSide::Buy, Some(best_ask)) if price >= best_ask => {
                debug!(price = %price, best_ask = %best_ask, "Bid would cross, nudging");
                price = self.tick.step_down(best_ask);
            }
            (OrderSide::Sell, Some(best_bid)) if price <= best_bid => {
                debug!(price = %price, best_bid = %best_bid, "Ask would cross, nudging");
                price = self.tick.step_up(best_bid);
            }
            _ => {}
        }
        let price = self.tick.round(price);

        let server_time = self
            .pool
            .get_server_time()
            .await
            .map_err(|e| ExecError::ServerTimeUnavailable(e.to_string()))?;
        let (start_at, expire_at) = self.timing.window(server_time, expiry_factor);

        let request = OrderRequest {
            pair: self.pair.clone(),
            side,
            order_type: OrderType::Limit,
            volume,
            price,
            expire_at,
            post_only: true,
        };

        match self.pool.add_order(request).await {
            Ok(id) => {
                info!(
                    order_id = %id,
                    side = %side,
                    price = %price,
                    volume = %volume,
                    start_at = %start_at,
                    expire_at = %expire_at,
                    "Posted order"
                );
                Ok(PostOutcome::Posted { id, price })
            }
            Err(e) => {
                let reason = match e {
                    ExecError::OrderRejected(r) => r,
                    other => other.to_string(),
                };
                warn!(side = %side, price = %price, volume = %volume, reason = %reason, "Post failed, skipping tier");
                Ok(PostOutcome::Failed { price, reason })
            }
        }
    }
}
