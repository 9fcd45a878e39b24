//! Altimeter media model.
//!
//! Data structures shared by the capture, compositing, and recording
//! crates without coupling them to a concrete capture backend:
//!
//! - [`device`]: capture device snapshots and their capabilities
//! - [`frame`]: pixel/audio buffers and timestamped frames
//! - [`orientation`]: physical device orientation and output rotation tags
//! - [`photo`]: still capture settings and results

pub mod device;
pub mod frame;
pub mod orientation;
pub mod photo;

pub use device::*;
pub use frame::*;
pub use orientation::*;
pub use photo::*;

use serde::{Deserialize, Serialize};

/// What the capture session is set up to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    #[default]
    Photo,
    Video,
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Photo => write!(f, "photo"),
            CaptureMode::Video => write!(f, "video"),
        }
    }
}
