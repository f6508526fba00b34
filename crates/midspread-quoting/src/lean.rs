//! Inventory-driven price lean.
//!
//! Two independent defensive curves, one per side:
//!
//! - bid: `R > 1` → `local_defense * 1bp * (e^(R-1) - 1)`, else 0
//! - ask: `R < 1` → `local_defense * 1bp * (e^(1/R-1) - 1)`, else 0
//!
//! Holding too much base asset widens the bid (buy less); holding too much
//! quote asset widens the ask (sell less). The aggressive counterparts,
//! which would tighten the opposite side, are zero.

use midspread_core::OrderSide;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::balance::BalanceRatio;
use crate::error::{QuoteError, QuoteResult};

/// One basis point as a fraction.
pub const BASIS_POINT: Decimal = dec!(0.0001);

/// Lean parameters delivered by the external feed.
///
/// Field names follow the feed format: `{"lean": .., "l": .., "displacement": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeanState {
    /// Sign flag; only its sign matters.
    pub lean: f64,
    /// Static tier width added on top of displacement when `lean >= 0`.
    #[serde(rename = "l")]
    pub tier_width: Decimal,
    /// Displacement used for statically configured stacks.
    pub displacement: Decimal,
}

impl LeanState {
    /// Reject values that would let a composed bid exceed its ask.
    pub fn validate(&self) -> QuoteResult<()> {
        LeanSign::classify(self.lean)?;
        if self.tier_width.is_sign_negative() {
            return Err(QuoteError::InvalidLean(format!(
                "tier width {} is negative",
                self.tier_width
            )));
        }
        if self.displacement.is_sign_negative() {
            return Err(QuoteError::InvalidLean(format!(
                "displacement {} is negative",
                self.displacement
            )));
        }
        Ok(())
    }
}

/// Interpretation of the feed's lean flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeanSign {
    /// `lean >= 0`: tier width applies.
    Wide,
    /// `lean < 0`: tier width is dropped.
    Narrow,
}

impl LeanSign {
    /// # Errors
    /// `InvalidLean` if `lean` is NaN or infinite.
    pub fn classify(lean: f64) -> QuoteResult<Self> {
        if !lean.is_finite() {
            return Err(QuoteError::InvalidLean(format!("lean is not a number: {lean}")));
        }
        Ok(if lean >= 0.0 { Self::Wide } else { Self::Narrow })
    }
}

/// Bid-side defensive lean.
pub fn bid_local_lean(ratio: BalanceRatio, local_defense: Decimal) -> QuoteResult<Decimal> {
    let r = positive_ratio(ratio)?;
    if r > 1.0 {
        defense_curve(r - 1.0, local_defense)
    } else {
        Ok(Decimal::ZERO)
    }
}

/// Ask-side defensive lean.
pub fn ask_local_lean(ratio: BalanceRatio, local_defense: Decimal) -> QuoteResult<Decimal> {
    let r = positive_ratio(ratio)?;
    if r < 1.0 {
        defense_curve(1.0 / r - 1.0, local_defense)
    } else {
        Ok(Decimal::ZERO)
    }
}

/// Dispatch to the curve for `side`.
pub fn local_lean(
    side: OrderSide,
    ratio: BalanceRatio,
    local_defense: Decimal,
) -> QuoteResult<Decimal> {
    match side {
        OrderSide::Buy => bid_local_lean(ratio, local_defense),
        OrderSide::Sell => ask_local_lean(ratio, local_defense),
    }
}

fn positive_ratio(ratio: BalanceRatio) -> QuoteResult<f64> {
    match ratio.to_f64() {
        Some(r) if r > 0.0 && r.is_finite() => Ok(r),
        _ => Err(QuoteError::InvalidBalanceRatio(format!(
            "ratio must be positive, got {ratio}"
        ))),
    }
}

/// `local_defense * 1bp * (e^x - 1)`; precision loss from f64 is acceptable here.
fn defense_curve(x: f64, local_defense: Decimal) -> QuoteResult<Decimal> {
    let curve = x.exp_m1();
    let curve = Decimal::from_f64_retain(curve)
        .ok_or_else(|| QuoteError::InvalidBalanceRatio(format!("lean curve overflow at x={x}")))?
        .round_dp(12);
    local_defense
        .checked_mul(BASIS_POINT)
        .and_then(|scale| scale.checked_mul(curve))
        .ok_or_else(|| QuoteError::InvalidBalanceRatio(format!("lean curve overflow at x={x}")))
}
