//! Paper venue: live public market data, simulated account.
//!
//! Orders never fill. They rest until cancelled or until server time
//! passes their expiry, which is enough to exercise the full quoting
//! loop against a real book without an authenticated session.

use chrono::{DateTime, Utc};
use midspread_core::{Balances, OpenOrder, OrderBook, OrderId, OrderSide};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::client::{BoxFuture, ExchangeClient, OrderRequest};
use crate::error::{ExecError, ExecResult};
use crate::kraken::MarketData;

#[derive(Debug, Clone)]
struct PaperOrder {
    open: OpenOrder,
    expire_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PaperState {
    balances: Balances,
    orders: Vec<PaperOrder>,
}

pub struct PaperExchange<M> {
    market: M,
    state: Mutex<PaperState>,
}

impl<M: MarketData> PaperExchange<M> {
    pub fn new(market: M, balances: Balances) -> Self {
        Self {
            market,
            state: Mutex::new(PaperState {
                balances,
                orders: Vec::new(),
            }),
        }
    }

    /// Number of resting simulated orders, expired or not.
    pub fn resting_count(&self) -> usize {
        self.state.lock().orders.len()
    }

    fn prune_expired(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        let before = state.orders.len();
        state.orders.retain(|o| o.expire_at > now);
        let expired = before - state.orders.len();
        if expired > 0 {
            debug!(expired, "Pruned expired paper orders");
        }
    }
}

fn crosses(request: &OrderRequest, book: &OrderBook) -> bool {
    match (request.side, book.best_opposing(request.side)) {
        (OrderSide::Buy, Some(best_ask)) => request.price >= best_ask,
        (OrderSide::Sell, Some(best_bid)) => request.price <= best_bid,
        _ => false,
    }
}

impl<M: MarketData> ExchangeClient for PaperExchange<M> {
    fn get_order_book<'a>(
        &'a self,
        pair: &'a str,
        depth: u32,
    ) -> BoxFuture<'a, ExecResult<OrderBook>> {
        self.market.order_book(pair, depth)
    }

    fn get_account_balance(&self) -> BoxFuture<'_, ExecResult<Balances>> {
        Box::pin(async move { Ok(self.state.lock().balances.clone()) })
    }

    fn get_open_orders(&self) -> BoxFuture<'_, ExecResult<Vec<OpenOrder>>> {
        Box::pin(async move {
            let now = self.market.server_time().await?;
            self.prune_expired(now);
            let orders = self
                .state
                .lock()
                .orders
                .iter()
                .map(|o| o.open.clone())
                .collect();
            Ok(orders)
        })
    }

    fn add_order(&self, request: OrderRequest) -> BoxFuture<'_, ExecResult<OrderId>> {
        Box::pin(async move {
            if !request.price.is_positive() || !request.volume.is_positive() {
                return Err(ExecError::OrderRejected(format!(
                    "invalid order: price={} volume={}",
                    request.price, request.volume
                )));
            }

            if request.post_only {
                let top = self.market.order_book(&request.pair, 1).await?;
                if crosses(&request, &top) {
                    return Err(ExecError::OrderRejected(
                        "post-only order would take liquidity".to_string(),
                    ));
                }
            }

            let id = OrderId::generate();
            info!(
                order_id = %id,
                pair = %request.pair,
                side = %request.side,
                price = %request.price,
                volume = %request.volume,
                "Paper order accepted"
            );
            self.state.lock().orders.push(PaperOrder {
                open: OpenOrder {
                    id: id.clone(),
                    side: request.side,
                    price: request.price,
                    volume: request.volume,
                },
                expire_at: request.expire_at,
            });
            Ok(id)
        })
    }

    fn cancel_order<'a>(&'a self, id: &'a OrderId) -> BoxFuture<'a, ExecResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            let before = state.orders.len();
            state.orders.retain(|o| &o.open.id != id);
            if state.orders.len() == before {
                return Err(ExecError::CancelFailed(format!("unknown order {id}")));
            }
            Ok(())
        })
    }

    fn get_server_time(&self) -> BoxFuture<'_, ExecResult<DateTime<Utc>>> {
        self.market.server_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use midspread_core::{BookLevel, OrderType, Price, Size};
    use rust_decimal_macros::dec;

    struct FixedMarket {
        book: OrderBook,
        now: DateTime<Utc>,
    }

    impl MarketData for FixedMarket {
        fn order_book<'a>(&'a self, _pair: &'a str, _depth: u32) -> BoxFuture<'a, ExecResult<OrderBook>> {
            Box::pin(async move { Ok(self.book.clone()) })
        }

        fn server_time(&self) -> BoxFuture<'_, ExecResult<DateTime<Utc>>> {
            Box::pin(async move { Ok(self.now) })
        }
    }

    fn paper(now: DateTime<Utc>) -> PaperExchange<FixedMarket> {
        let book = OrderBook::new(
            vec![BookLevel::new(Price::new(dec!(101)), Size::new(dec!(1)))],
            vec![BookLevel::new(Price::new(dec!(99)), Size::new(dec!(1)))],
        );
        let balances = [("XETH".to_string(), Size::new(dec!(10)))].into_iter().collect();
        PaperExchange::new(FixedMarket { book, now }, balances)
    }

    fn order(side: OrderSide, price: rust_decimal::Decimal, expire_at: DateTime<Utc>) -> OrderRequest {
        OrderRequest {
            pair: "XETHZEUR".to_string(),
            side,
            order_type: OrderType::Limit,
            volume: Size::new(dec!(1)),
            price: Price::new(price),
            expire_at,
            post_only: true,
        }
    }

    #[tokio::test]
    async fn test_post_only_rejects_crossing() {
        let now = Utc::now();
        let venue = paper(now);
        let later = now + Duration::minutes(1);

        assert!(matches!(
            venue.add_order(order(OrderSide::Buy, dec!(101), later)).await,
            Err(ExecError::OrderRejected(_))
        ));
        assert!(venue.add_order(order(OrderSide::Buy, dec!(100), later)).await.is_ok());
        assert_eq!(venue.resting_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_orders_disappear() {
        let now = Utc::now();
        let venue = paper(now);
        venue
            .add_order(order(OrderSide::Sell, dec!(102), now - Duration::seconds(1)))
            .await
            .unwrap();
        venue
            .add_order(order(OrderSide::Sell, dec!(103), now + Duration::seconds(60)))
            .await
            .unwrap();

        let open = venue.get_open_orders().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].price, Price::new(dec!(103)));
    }

    #[tokio::test]
    async fn test_cancel_unknown_fails() {
        let venue = paper(Utc::now());
        let id = OrderId::from_string("missing");
        assert!(matches!(
            venue.cancel_order(&id).await,
            Err(ExecError::CancelFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_balances_are_reported() {
        let venue = paper(Utc::now());
        let balances = venue.get_account_balance().await.unwrap();
        assert_eq!(balances.get("XETH"), Some(Size::new(dec!(10))));
    }
}
