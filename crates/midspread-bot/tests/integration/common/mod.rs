//! Common test utilities.

pub mod fixtures;
