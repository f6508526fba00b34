//! Application error types.

use std::fmt;

use midspread_executor::ExecError;
use midspread_quoting::QuoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] midspread_core::CoreError),

    #[error("Quoting error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Exchange error: {0}")]
    Exec(#[from] ExecError),

    #[error("Lean feed error: {0}")]
    LeanFeed(String),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] midspread_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the supervisor reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Static configuration is unusable; abort.
    Config,
    /// Book, balances, server time or feed data unusable this cycle; restart.
    MarketData,
    /// Reference price outside the guard band; restart, never clamp.
    PriceSanity,
    /// Network or API failure on a required call; restart.
    VenueCall,
}

impl FailureKind {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::MarketData => "market_data",
            Self::PriceSanity => "price_sanity",
            Self::VenueCall => "venue_call",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Config(_) | Self::Core(_) | Self::Telemetry(_) | Self::Io(_) => {
                FailureKind::Config
            }
            Self::Quote(QuoteError::PriceOutOfRange { .. }) => FailureKind::PriceSanity,
            Self::Quote(e) if e.is_config() => FailureKind::Config,
            Self::Quote(_) | Self::LeanFeed(_) => FailureKind::MarketData,
            Self::Exec(ExecError::ServerTimeUnavailable(_)) => FailureKind::MarketData,
            Self::Exec(_) => FailureKind::VenueCall,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
