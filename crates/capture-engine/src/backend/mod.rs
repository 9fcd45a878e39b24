//! Capture backend contract.
//!
//! A backend owns the hardware device graph. The session manager describes
//! the graph it wants as a [`GraphConfiguration`] and commits it in one
//! step; backends apply a commit completely or not at all.

use std::collections::BTreeSet;
use std::sync::Arc;

use altimeter_common::error::AltimeterResult;
use altimeter_media_model::{
    CaptureMode, Device, DeviceId, Frame, FrameSize, Photo, PhotoCodec, PhotoSettings,
    VideoOrientation,
};

pub mod synthetic;

pub use synthetic::{SyntheticBackend, SyntheticInspector};

/// Callback invoked on a backend delivery thread for every captured frame.
pub type FrameHandler = Arc<dyn Fn(Frame) + Send + Sync>;

/// Completion for a still capture.
pub type PhotoCallback = Box<dyn FnOnce(AltimeterResult<Photo>) + Send>;

/// Outputs that can be attached to the device graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CaptureOutput {
    /// Live preview frames.
    Preview,
    /// One-shot still capture.
    Photo,
    /// Raw video frames for recording.
    VideoData,
    /// Raw audio frames for recording.
    AudioData,
}

/// Resolution preset of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPreset {
    /// Full sensor resolution for stills.
    Photo,
    /// Fixed-size video.
    Video(FrameSize),
}

impl SessionPreset {
    /// Frame size a device with the given native resolution delivers under
    /// this preset. Devices that cannot reach a video preset run at their
    /// native size.
    pub fn resolve(&self, native: FrameSize) -> FrameSize {
        match self {
            SessionPreset::Photo => native,
            SessionPreset::Video(size) => {
                let fits = size.width.max(size.height) <= native.width.max(native.height)
                    && size.width.min(size.height) <= native.width.min(native.height);
                if fits && !size.is_empty() {
                    *size
                } else {
                    native
                }
            }
        }
    }
}

/// Metadata written on every output connection.
///
/// Orientation is a tag for players and encoders; pixel data is never
/// rotated by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionMetadata {
    pub orientation: VideoOrientation,
    pub mirrored: bool,
}

/// Complete description of a device graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfiguration {
    pub video_input: Option<Device>,
    pub audio_input: Option<Device>,
    pub outputs: BTreeSet<CaptureOutput>,
    pub preset: SessionPreset,
    pub connection: ConnectionMetadata,
}

impl GraphConfiguration {
    /// Graph for a capture mode around the given camera.
    ///
    /// Photo mode: preview and photo outputs, photo preset. Video mode adds
    /// the microphone and the raw video and audio outputs in place of the
    /// photo output.
    pub fn for_mode(
        mode: CaptureMode,
        camera: Device,
        microphone: Option<Device>,
        video_preset: FrameSize,
        connection: ConnectionMetadata,
    ) -> Self {
        let (audio_input, outputs, preset) = match mode {
            CaptureMode::Photo => (
                None,
                BTreeSet::from([CaptureOutput::Preview, CaptureOutput::Photo]),
                SessionPreset::Photo,
            ),
            CaptureMode::Video => (
                microphone,
                BTreeSet::from([
                    CaptureOutput::Preview,
                    CaptureOutput::VideoData,
                    CaptureOutput::AudioData,
                ]),
                SessionPreset::Video(video_preset),
            ),
        };
        Self {
            video_input: Some(camera),
            audio_input,
            outputs,
            preset,
            connection,
        }
    }

    pub fn has_output(&self, output: CaptureOutput) -> bool {
        self.outputs.contains(&output)
    }

    /// Frame size delivered by the video input, if there is one.
    pub fn frame_size(&self) -> FrameSize {
        self.video_input
            .as_ref()
            .map(|d| self.preset.resolve(d.resolution))
            .unwrap_or(FrameSize::ZERO)
    }
}

/// A point in normalized device coordinates, `(0,0)` top-left to `(1,1)`
/// bottom-right of the unrotated sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    /// A point clamped into the unit square. NaN coordinates become 0.5.
    pub fn new(x: f64, y: f64) -> Self {
        let norm = |v: f64| if v.is_nan() { 0.5 } else { v.clamp(0.0, 1.0) };
        Self {
            x: norm(x),
            y: norm(y),
        }
    }

    pub const CENTER: NormalizedPoint = NormalizedPoint { x: 0.5, y: 0.5 };
}

/// Exclusive configuration access to one device.
///
/// Changes take effect immediately; the lock is released when the value is
/// dropped.
pub trait DeviceConfiguration {
    fn set_zoom_factor(&mut self, factor: f64) -> AltimeterResult<()>;

    /// Set the focus point and run a single auto-focus pass.
    fn focus_once_at(&mut self, point: NormalizedPoint) -> AltimeterResult<()>;

    /// Set the exposure point and run a single auto-exposure pass.
    fn expose_once_at(&mut self, point: NormalizedPoint) -> AltimeterResult<()>;
}

/// Platform capture graph.
///
/// All methods except the frame handler itself are called from the session
/// manager's configuration thread, one at a time.
pub trait CaptureBackend: Send {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Replace the device graph. On error the previous graph stays in place.
    fn commit(&mut self, graph: &GraphConfiguration) -> AltimeterResult<()>;

    /// Start delivering frames for the committed graph.
    fn start_running(&mut self) -> AltimeterResult<()>;

    fn stop_running(&mut self);

    fn is_running(&self) -> bool;

    /// Lock a device of the committed graph for configuration.
    fn lock_for_configuration<'a>(
        &'a mut self,
        device: &DeviceId,
    ) -> AltimeterResult<Box<dyn DeviceConfiguration + 'a>>;

    /// Update orientation and mirroring on all output connections.
    fn update_connection(&mut self, metadata: ConnectionMetadata) -> AltimeterResult<()>;

    /// Still codecs the photo output can produce.
    fn available_photo_codecs(&self) -> Vec<PhotoCodec>;

    /// Take one still. `completion` runs on a backend thread.
    fn capture_photo(&mut self, settings: PhotoSettings, completion: PhotoCallback);

    /// Install the callback that receives frames on the delivery threads.
    fn set_frame_handler(&mut self, handler: Option<FrameHandler>);
}
