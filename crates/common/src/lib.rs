//! Altimeter Common Utilities
//!
//! Shared infrastructure for all Altimeter crates:
//! - Error types and result aliases
//! - Media clock, presentation timestamps, and per-frame budgets
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
