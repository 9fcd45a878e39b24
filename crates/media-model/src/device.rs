//! Capture device snapshots.

use serde::{Deserialize, Serialize};

/// Stable device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of media a device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Video,
    Audio,
}

/// Physical mounting position of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePosition {
    Back,
    Front,
    /// External or desktop devices, and all microphones.
    #[default]
    Unspecified,
}

impl DevicePosition {
    /// Switching order: back cameras first, then front, then everything else.
    pub fn switch_rank(&self) -> u8 {
        match self {
            DevicePosition::Back => 0,
            DevicePosition::Front => 1,
            DevicePosition::Unspecified => 2,
        }
    }

    /// Front cameras are mirrored so the preview behaves like a mirror.
    pub fn is_mirrored(&self) -> bool {
        matches!(self, DevicePosition::Front)
    }
}

/// Pixel dimensions of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const ZERO: FrameSize = FrameSize {
        width: 0,
        height: 0,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Short side over long side, in `(0, 1]`. Zero for an empty size.
    pub fn aspect_ratio(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let long = self.width.max(self.height) as f64;
        let short = self.width.min(self.height) as f64;
        short / long
    }

    /// Size with the long side horizontal (`landscape = true`) or vertical.
    pub fn oriented(&self, landscape: bool) -> FrameSize {
        let long = self.width.max(self.height);
        let short = self.width.min(self.height);
        if landscape {
            FrameSize::new(long, short)
        } else {
            FrameSize::new(short, long)
        }
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// What a device can do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Largest zoom factor of the active format. Minimum is always 1.0.
    pub max_zoom_factor: f64,

    /// Whether the device has a usable flash.
    pub has_flash: bool,

    /// Whether a focus point of interest can be set.
    pub focus_point_of_interest: bool,

    /// Whether an exposure point of interest can be set.
    pub exposure_point_of_interest: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_zoom_factor: 1.0,
            has_flash: false,
            focus_point_of_interest: false,
            exposure_point_of_interest: false,
        }
    }
}

impl DeviceCapabilities {
    /// Clamp a requested zoom factor to `[1.0, max_zoom_factor]`.
    ///
    /// A NaN request resolves to 1.0.
    pub fn clamp_zoom(&self, requested: f64) -> f64 {
        let max = self.max_zoom_factor.max(1.0);
        if requested.is_nan() {
            return 1.0;
        }
        requested.clamp(1.0, max)
    }
}

/// Immutable snapshot of a capture device at discovery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,

    /// Human-readable name.
    pub name: String,

    pub media_type: MediaType,

    pub position: DevicePosition,

    /// Resolution of the active format.
    pub resolution: FrameSize,

    pub capabilities: DeviceCapabilities,

    /// Device is attached.
    pub connected: bool,

    /// Device is attached but temporarily unusable (e.g. lens cover closed).
    pub suspended: bool,
}

impl Device {
    /// A connected video device with default capabilities.
    pub fn camera(
        id: impl Into<String>,
        name: impl Into<String>,
        position: DevicePosition,
        resolution: FrameSize,
    ) -> Self {
        Self {
            id: DeviceId::new(id),
            name: name.into(),
            media_type: MediaType::Video,
            position,
            resolution,
            capabilities: DeviceCapabilities::default(),
            connected: true,
            suspended: false,
        }
    }

    /// A connected audio input device.
    pub fn microphone(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(id),
            name: name.into(),
            media_type: MediaType::Audio,
            position: DevicePosition::Unspecified,
            resolution: FrameSize::ZERO,
            capabilities: DeviceCapabilities::default(),
            connected: true,
            suspended: false,
        }
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Whether the device can be selected right now.
    pub fn is_available(&self) -> bool {
        self.connected && !self.suspended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn aspect_ratio_is_short_over_long() {
        assert!((FrameSize::new(1920, 1080).aspect_ratio() - 0.5625).abs() < 1e-9);
        assert!((FrameSize::new(1080, 1920).aspect_ratio() - 0.5625).abs() < 1e-9);
        assert_eq!(FrameSize::ZERO.aspect_ratio(), 0.0);
    }

    #[test]
    fn oriented_size_swaps_axes() {
        let size = FrameSize::new(1920, 1080);
        assert_eq!(size.oriented(false), FrameSize::new(1080, 1920));
        assert_eq!(size.oriented(true), FrameSize::new(1920, 1080));
    }

    #[test]
    fn only_front_cameras_are_mirrored() {
        assert!(DevicePosition::Front.is_mirrored());
        assert!(!DevicePosition::Back.is_mirrored());
        assert!(!DevicePosition::Unspecified.is_mirrored());
    }

    #[test]
    fn suspended_devices_are_unavailable() {
        let mut device = Device::camera("c", "Cam", DevicePosition::Back, FrameSize::new(4, 4));
        assert!(device.is_available());
        device.suspended = true;
        assert!(!device.is_available());
    }

    proptest! {
        #[test]
        fn zoom_is_clamped_to_device_range(requested in -10.0f64..50.0, max in 1.0f64..16.0) {
            let caps = DeviceCapabilities { max_zoom_factor: max, ..DeviceCapabilities::default() };
            let applied = caps.clamp_zoom(requested);
            prop_assert_eq!(applied, requested.clamp(1.0, max));
        }
    }
}
