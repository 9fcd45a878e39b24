//! Frames delivered by the capture backend.
//!
//! Pixel and sample payloads are reference counted so a frame can be handed
//! to the preview, the recorder, and the compositor without copying.

use std::sync::Arc;

use altimeter_common::clock::MediaTime;
use altimeter_common::error::{AltimeterError, AltimeterResult};
use serde::{Deserialize, Serialize};

use crate::device::FrameSize;

/// Memory layout of a pixel buffer. Both layouts are 8-bit, 4 channel,
/// packed, without row padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(&self) -> usize {
        4
    }

    /// GStreamer raw video format name.
    pub const fn caps_name(&self) -> &'static str {
        match self {
            PixelFormat::Rgba8 => "RGBA",
            PixelFormat::Bgra8 => "BGRA",
        }
    }
}

/// An in-memory bitmap.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Arc<[u8]>,
}

impl PixelBuffer {
    /// Wrap packed pixel data. Fails if the length does not match the size.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<Arc<[u8]>>,
    ) -> AltimeterResult<Self> {
        let data = data.into();
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(AltimeterError::capture(format!(
                "Pixel buffer {width}x{height} {format:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A buffer filled with one color, given in the buffer's own channel order.
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * 4);
        for _ in 0..count {
            data.extend_from_slice(&pixel);
        }
        Self {
            width,
            height,
            format,
            data: data.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether two buffers share the same backing storage.
    pub fn shares_storage_with(&self, other: &PixelBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Pixel at `(x, y)` in the buffer's channel order.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PixelBuffer({}x{} {:?}, {} bytes)",
            self.width,
            self.height,
            self.format,
            self.data.len()
        )
    }
}

/// Interleaved signed 16-bit PCM.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Arc<[i16]>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16, samples: impl Into<Arc<[i16]>>) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples: samples.into(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of sample frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> MediaTime {
        if self.sample_rate == 0 {
            return MediaTime::ZERO;
        }
        MediaTime::from_nanos(self.frame_count() as u64 * 1_000_000_000 / self.sample_rate as u64)
    }

    /// Little-endian byte representation.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for sample in self.samples.iter() {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AudioBuffer({} Hz x{}, {} frames)",
            self.sample_rate,
            self.channels,
            self.frame_count()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    Video(PixelBuffer),
    Audio(AudioBuffer),
}

/// One timestamped sample as delivered by a capture output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub pts: MediaTime,
    pub payload: FramePayload,
}

impl Frame {
    pub fn video(pts: MediaTime, buffer: PixelBuffer) -> Self {
        Self {
            pts,
            payload: FramePayload::Video(buffer),
        }
    }

    pub fn audio(pts: MediaTime, buffer: AudioBuffer) -> Self {
        Self {
            pts,
            payload: FramePayload::Audio(buffer),
        }
    }

    pub fn kind(&self) -> FrameKind {
        match self.payload {
            FramePayload::Video(_) => FrameKind::Video,
            FramePayload::Audio(_) => FrameKind::Audio,
        }
    }

    pub fn pixel_buffer(&self) -> Option<&PixelBuffer> {
        match &self.payload {
            FramePayload::Video(buffer) => Some(buffer),
            FramePayload::Audio(_) => None,
        }
    }

    pub fn audio_buffer(&self) -> Option<&AudioBuffer> {
        match &self.payload {
            FramePayload::Audio(buffer) => Some(buffer),
            FramePayload::Video(_) => None,
        }
    }
}
