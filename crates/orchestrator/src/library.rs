//! Photo library sink.

use altimeter_common::error::AltimeterResult;
use altimeter_media_model::{Coordinate, Photo};

/// Stores captured photos outside the capture core.
pub trait PhotoLibrary: Send + Sync {
    /// Save `photo`, tagged with `coordinate` when known.
    fn save_image(&self, photo: &Photo, coordinate: Option<Coordinate>) -> AltimeterResult<()>;
}
