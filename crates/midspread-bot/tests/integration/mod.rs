//! Integration tests for midspread-bot.
//!
//! These tests drive the quote controller and the supervisor against an
//! in-memory exchange:
//! - Cycle ordering and dispatch modes
//! - Band cancellation across cycles
//! - Failure triage and restarts

pub mod common;
