//! Quoting error types.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("Order book has no {0}")]
    EmptyBook(&'static str),

    #[error("Price {price} outside guard range [{lower}, {upper}] (mean {mean})")]
    PriceOutOfRange {
        price: Decimal,
        mean: Decimal,
        lower: Decimal,
        upper: Decimal,
    },

    #[error("Missing balance for {0}")]
    MissingBalance(String),

    #[error("Invalid balance ratio: {0}")]
    InvalidBalanceRatio(String),

    #[error("Invalid lean: {0}")]
    InvalidLean(String),

    #[error("Unknown market for cross-rate lookup: {0}")]
    UnknownMarket(String),

    #[error("Stack volume {actual} does not match configured total {expected}")]
    StackVolumeMismatch { expected: Decimal, actual: Decimal },

    #[error("Invalid volume distribution: {0}")]
    InvalidDistribution(String),

    #[error("Composed price is not positive: {0}")]
    NonPositivePrice(Decimal),

    #[error("Price arithmetic overflowed: {0}")]
    PriceOverflow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QuoteError {
    /// Errors that come from static configuration or the distribution file
    /// and will not go away by retrying the cycle.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::UnknownMarket(_)
                | Self::StackVolumeMismatch { .. }
                | Self::InvalidDistribution(_)
                | Self::Io(_)
                | Self::Json(_)
        )
    }
}

pub type QuoteResult<T> = Result<T, QuoteError>;
