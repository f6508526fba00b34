//! Midspread market maker.
//!
//! Two-sided midspread quoting for a single Kraken pair:
//! - Tiered volume stack, static or loaded from a distribution file
//! - Inventory-driven defensive lean on top of the external lean feed
//! - Book-aware price reconciliation and post-only, expiring orders
//! - Supervisor that restarts failed cycles from INIT

pub mod app;
pub mod config;
pub mod controller;
pub mod error;
pub mod lean_feed;

pub use app::{Application, SupervisorStats};
pub use config::AppConfig;
pub use controller::{
    CycleContext, CycleReport, CycleState, DispatchCounter, DispatchMode, QuoteController,
    QuoteSettings,
};
pub use error::{AppError, AppResult, FailureKind};
pub use lean_feed::{FileLeanFeed, FixedLeanFeed, LeanSource, ReloadSchedule};
