//! Pricing logic for the midspread quoting engine.
//!
//! Everything in this crate is synchronous and side-effect free apart from
//! logging and the guard's own window:
//! - reference mid price and the rolling price guard
//! - balance ratio and the per-side defensive lean
//! - volume stacks, distribution files and volume bands
//! - tier price composition and book reconciliation

pub mod balance;
pub mod composer;
pub mod error;
pub mod lean;
pub mod price_guard;
pub mod reconciler;
pub mod reference;
pub mod volume_stack;

pub use balance::{account_symbol, balance_ratio, BalanceRatio};
pub use composer::compose_price;
pub use error::{QuoteError, QuoteResult};
pub use lean::{ask_local_lean, bid_local_lean, local_lean, LeanSign, LeanState, BASIS_POINT};
pub use price_guard::{GuardOutcome, PriceGuard, GUARD_WINDOW_HOURS};
pub use reconciler::reconcile;
pub use reference::{mid_price, ReferencePrice};
pub use volume_stack::{
    cross_pair, min_volume, volume_bands, CrossLeg, CrossPair, StackMode, VolumeBand,
    VolumeDistribution, VolumeStack, VolumeTier, BAND_EPSILON, VOLUME_TOLERANCE,
};
