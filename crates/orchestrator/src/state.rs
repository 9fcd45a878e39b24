//! Observable camera state and recording events.

use std::path::PathBuf;

use altimeter_media_model::{DeviceOrientation, FrameSize, PixelBuffer, Photo};

/// Everything the presentation layer renders, published as one value.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    /// Most recent unwatermarked video frame.
    pub preview_frame: Option<PixelBuffer>,
    pub photo: Option<Photo>,
    pub is_recording: bool,
    /// Device resolution with the long side following the orientation.
    pub video_size: FrameSize,
    /// Short side over long side of the device resolution.
    pub aspect_ratio: f64,
    pub device_orientation: DeviceOrientation,
    pub authorization_denied: bool,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            preview_frame: None,
            photo: None,
            is_recording: false,
            video_size: FrameSize::ZERO,
            aspect_ratio: 0.0,
            device_orientation: DeviceOrientation::Unknown,
            authorization_denied: false,
        }
    }
}

impl CameraState {
    /// Recompute the size fields from the unrotated device resolution.
    pub(crate) fn apply_resolution(&mut self, resolution: FrameSize) {
        self.video_size = resolution.oriented(self.device_orientation.is_landscape());
        self.aspect_ratio = resolution.aspect_ratio();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    DidStartRecording,
    /// Sent only when the movie was finalized successfully.
    DidStopRecording(Option<PathBuf>),
}
