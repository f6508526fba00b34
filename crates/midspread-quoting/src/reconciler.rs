//! Adjust a composed tier price against the live book.

use midspread_core::{OrderBook, OrderSide, Price, Size, TickSize};
use rust_decimal::Decimal;
use tracing::debug;

/// Reconcile `proposed` for a tier of `tier_volume` on `side`.
///
/// 1. Levels smaller than `dust * tier_volume` are noise and ignored.
/// 2. Only levels at or ahead of `proposed` compete (bids priced at or
///    above it, asks priced at or below it).
/// 3. With no competitors the proposed price stands.
/// 4. Otherwise the price moves one increment past the nearest competitor.
/// 5. The result never crosses the opposing best price.
pub fn reconcile(
    side: OrderSide,
    proposed: Price,
    tier_volume: Size,
    dust: Decimal,
    book: &OrderBook,
    tick: &TickSize,
) -> Price {
    let min_volume = tier_volume.inner() * dust;
    let competing = book
        .levels(side)
        .iter()
        .filter(|l| l.volume.inner() >= min_volume)
        .map(|l| l.price)
        .filter(|p| match side {
            OrderSide::Buy => *p >= proposed,
            OrderSide::Sell => *p <= proposed,
        });

    let mut price = match side {
        OrderSide::Buy => competing.min().map(|p| tick.step_up(p)),
        OrderSide::Sell => competing.max().map(|p| tick.step_down(p)),
    }
    .unwrap_or(proposed);

    if price != proposed {
        debug!(side = %side, proposed = %proposed, adjusted = %price, "Stepped past competing order");
    }

    if let Some(opposing) = book.best_opposing(side) {
        let crosses = match side {
            OrderSide::Buy => price >= opposing,
            OrderSide::Sell => price <= opposing,
        };
        if crosses {
            let guarded = match side {
                OrderSide::Buy => tick.step_down(opposing),
                OrderSide::Sell => tick.step_up(opposing),
            };
            debug!(
                side = %side,
                price = %price,
                opposing = %opposing,
                guarded = %guarded,
                "Cross guard applied"
            );
            price = guarded;
        }
    }

    tick.round(price)
}
