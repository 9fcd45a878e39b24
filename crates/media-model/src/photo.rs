//! Still capture settings and results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::device::FrameSize;
use crate::orientation::VideoOrientation;

/// Encoded still formats, most efficient first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoCodec {
    Hevc,
    Jpeg,
}

impl PhotoCodec {
    /// Lower is more efficient.
    pub fn efficiency_rank(&self) -> u8 {
        match self {
            PhotoCodec::Hevc => 0,
            PhotoCodec::Jpeg => 1,
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            PhotoCodec::Hevc => "heic",
            PhotoCodec::Jpeg => "jpg",
        }
    }

    /// Most efficient codec among `available`, falling back to JPEG.
    pub fn most_efficient(available: &[PhotoCodec]) -> PhotoCodec {
        available
            .iter()
            .copied()
            .min_by_key(PhotoCodec::efficiency_rank)
            .unwrap_or(PhotoCodec::Jpeg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashMode {
    Auto,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPrioritization {
    Speed,
    Balanced,
    Quality,
}

/// Per-shot settings for a one-shot still capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSettings {
    pub codec: PhotoCodec,
    pub flash: FlashMode,
    pub high_resolution: bool,
    pub quality: QualityPrioritization,
    pub orientation: VideoOrientation,
    pub mirrored: bool,
}

impl PhotoSettings {
    /// Settings for a shot: best codec available, auto flash when the
    /// device has one, full resolution.
    pub fn for_capture(
        available_codecs: &[PhotoCodec],
        flash_available: bool,
        orientation: VideoOrientation,
        mirrored: bool,
    ) -> Self {
        Self {
            codec: PhotoCodec::most_efficient(available_codecs),
            flash: if flash_available {
                FlashMode::Auto
            } else {
                FlashMode::Off
            },
            high_resolution: true,
            quality: QualityPrioritization::Balanced,
            orientation,
            mirrored,
        }
    }
}

/// An encoded still image.
#[derive(Clone, PartialEq)]
pub struct Photo {
    pub data: Arc<[u8]>,
    pub codec: PhotoCodec,
    pub size: FrameSize,
    pub orientation: VideoOrientation,
    pub mirrored: bool,
}

impl std::fmt::Debug for Photo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Photo")
            .field("codec", &self.codec)
            .field("size", &self.size)
            .field("orientation", &self.orientation)
            .field("mirrored", &self.mirrored)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Geographic coordinate attached to saved photos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}
