//! Altimeter Orchestrator
//!
//! [`CameraController`] is the single entry point for the presentation
//! layer. It owns the capture session, the recorder, the watermark slot,
//! and the orientation tracker, and exposes:
//!
//! - commands (session, device, zoom, focus, mode, photo, recording)
//! - observable [`CameraState`] on a watch channel
//! - [`CameraEvent`]s on a broadcast channel

pub mod controller;
pub mod library;
pub mod state;

pub use controller::CameraController;
pub use library::PhotoLibrary;
pub use state::{CameraEvent, CameraState};
