//! Container writer contract.
//!
//! A writer owns one output file with one video and one audio track. It is
//! created per recording and consumed by [`MediaWriter::finish`].

use std::path::{Path, PathBuf};

use altimeter_common::clock::MediaTime;
use altimeter_common::config::RecordingDefaults;
use altimeter_common::error::AltimeterResult;
use altimeter_media_model::{AudioBuffer, FrameSize, PixelBuffer, PixelFormat, VideoOrientation};
use serde::{Deserialize, Serialize};

/// Geometry of the recorded video track.
///
/// Orientation and mirroring are written as metadata; frames are stored
/// as captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTrack {
    pub size: FrameSize,
    pub orientation: VideoOrientation,
    pub mirrored: bool,
}

impl VideoTrack {
    pub fn new(size: FrameSize) -> Self {
        Self {
            size,
            orientation: VideoOrientation::default(),
            mirrored: false,
        }
    }

    pub fn oriented(mut self, orientation: VideoOrientation, mirrored: bool) -> Self {
        self.orientation = orientation;
        self.mirrored = mirrored;
        self
    }
}

impl From<FrameSize> for VideoTrack {
    fn from(size: FrameSize) -> Self {
        Self::new(size)
    }
}

/// Track parameters for a new writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterSettings {
    pub frame_size: FrameSize,
    pub orientation: VideoOrientation,
    pub mirrored: bool,
    pub pixel_format: PixelFormat,
    pub frame_rate: u32,
    pub video_codec: String,
    pub audio_sample_rate: u32,
    pub audio_channels: u32,
    pub audio_bitrate: u32,
    pub video_queue_bytes: u64,
    pub audio_queue_bytes: u64,
}

impl WriterSettings {
    pub fn new(defaults: &RecordingDefaults, track: impl Into<VideoTrack>) -> Self {
        let track = track.into();
        Self {
            frame_size: track.size,
            orientation: track.orientation,
            mirrored: track.mirrored,
            pixel_format: PixelFormat::Bgra8,
            frame_rate: defaults.frame_rate.max(1),
            video_codec: defaults.video_codec.clone(),
            audio_sample_rate: defaults.audio_sample_rate,
            audio_channels: defaults.audio_channels,
            audio_bitrate: defaults.audio_bitrate,
            video_queue_bytes: defaults.video_queue_bytes,
            audio_queue_bytes: defaults.audio_queue_bytes,
        }
    }

    /// Whether a video buffer matches the track's size and layout.
    pub fn accepts(&self, buffer: &PixelBuffer) -> bool {
        buffer.size() == self.frame_size && buffer.format() == self.pixel_format
    }

    /// Duration of one video frame in nanoseconds.
    pub fn frame_duration_ns(&self) -> u64 {
        1_000_000_000 / self.frame_rate.max(1) as u64
    }
}

/// One movie file being written.
///
/// Appends never fail: a writer that hits an error keeps it and reports it
/// from [`finish`](MediaWriter::finish). Callers check readiness before
/// every append and drop the sample when a track is not ready.
pub trait MediaWriter: Send {
    /// Map `anchor` to time zero on the output timeline. Called once,
    /// with the first video timestamp of the recording.
    fn start_session_at(&mut self, anchor: MediaTime);

    fn is_video_ready(&self) -> bool;

    /// Append a frame at its capture timestamp.
    fn append_video(&mut self, pts: MediaTime, buffer: &PixelBuffer);

    fn is_audio_ready(&self) -> bool;

    fn append_audio(&mut self, pts: MediaTime, buffer: &AudioBuffer);

    /// Mark both tracks finished and complete the file.
    fn finish(self: Box<Self>) -> AltimeterResult<PathBuf>;
}

/// Creates a fresh writer for each recording.
pub trait WriterFactory: Send + Sync {
    fn create(&self, path: &Path, settings: &WriterSettings)
        -> AltimeterResult<Box<dyn MediaWriter>>;
}
