//! Altimeter Orientation Tracker
//!
//! Classifies the device's physical orientation from a 3-axis gravity
//! vector. Two interchangeable strategies are available:
//!
//! - **System-like** (default): mimics the platform's rotation behavior,
//!   with a tilt-dependent dead band that suppresses flicker near the
//!   portrait/landscape boundary.
//! - **Largest-axis**: the dominant gravity axis decides.
//!
//! The [`OrientationTracker`] samples a [`GravitySource`] periodically and
//! publishes changes on a watch channel.

pub mod source;
pub mod strategy;
pub mod tracker;

pub use source::{GravitySource, ScriptedGravity};
pub use strategy::Strategy;
pub use tracker::OrientationTracker;
