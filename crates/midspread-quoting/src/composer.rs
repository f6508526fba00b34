//! Raw tier price from reference price, displacement and lean.

use midspread_core::{OrderSide, Price, TickSize};
use rust_decimal::Decimal;
use tracing::trace;

use crate::error::{QuoteError, QuoteResult};
use crate::lean::{LeanSign, LeanState};

/// Compose the quote price for one tier on `side`.
///
/// ```text
/// offset = displacement + (lean >= 0 ? l : 0) + local_lean
/// ask    = reference * (1 + offset)
/// bid    = reference * (1 - offset)
/// ```
///
/// The result is rounded to the market's quoting precision.
///
/// # Errors
/// - `InvalidLean` if the lean flag is not a number
/// - `NonPositivePrice` if the offset pushes a bid to zero or below
/// - `PriceOverflow` if the offset is too large to represent
pub fn compose_price(
    side: OrderSide,
    reference: Price,
    displacement: Decimal,
    lean: &LeanState,
    local_lean: Decimal,
    tick: &TickSize,
) -> QuoteResult<Price> {
    let width = match LeanSign::classify(lean.lean)? {
        LeanSign::Wide => lean.tier_width,
        LeanSign::Narrow => Decimal::ZERO,
    };
    let overflow = || {
        QuoteError::PriceOverflow(format!(
            "reference={reference} displacement={displacement} width={width} local={local_lean}"
        ))
    };
    let offset = displacement
        .checked_add(width)
        .and_then(|o| o.checked_add(local_lean))
        .ok_or_else(overflow)?;

    let factor = match side {
        OrderSide::Sell => Decimal::ONE.checked_add(offset),
        OrderSide::Buy => Decimal::ONE.checked_sub(offset),
    }
    .ok_or_else(overflow)?;
    let raw = reference
        .inner()
        .checked_mul(factor)
        .ok_or_else(overflow)?;
    let price = tick.round(Price::new(raw));

    trace!(
        side = %side,
        reference = %reference,
        offset = %offset,
        price = %price,
        "Composed tier price"
    );

    if !price.is_positive() {
        return Err(QuoteError::NonPositivePrice(price.inner()));
    }
    Ok(price)
}
