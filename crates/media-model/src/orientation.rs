//! Device orientation and output rotation tags.

use serde::{Deserialize, Serialize};

/// Physical orientation of the device, derived from gravity.
///
/// Landscape left means the device is rotated so the top of the screen
/// points left (home side on the right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
    #[default]
    Unknown,
}

impl DeviceOrientation {
    pub fn is_landscape(&self) -> bool {
        matches!(
            self,
            DeviceOrientation::LandscapeLeft | DeviceOrientation::LandscapeRight
        )
    }

    pub fn is_portrait(&self) -> bool {
        matches!(
            self,
            DeviceOrientation::Portrait | DeviceOrientation::PortraitUpsideDown
        )
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, DeviceOrientation::FaceUp | DeviceOrientation::FaceDown)
    }

    /// Rotation tag for captured media, if this orientation has one.
    ///
    /// The device's landscape sides are mirrored relative to the sensor,
    /// so landscape left maps to the landscape-right video orientation and
    /// vice versa. Flat and unknown orientations carry no tag.
    pub fn video_orientation(&self) -> Option<VideoOrientation> {
        match self {
            DeviceOrientation::Portrait => Some(VideoOrientation::Portrait),
            DeviceOrientation::PortraitUpsideDown => Some(VideoOrientation::PortraitUpsideDown),
            DeviceOrientation::LandscapeLeft => Some(VideoOrientation::LandscapeRight),
            DeviceOrientation::LandscapeRight => Some(VideoOrientation::LandscapeLeft),
            DeviceOrientation::FaceUp | DeviceOrientation::FaceDown | DeviceOrientation::Unknown => {
                None
            }
        }
    }
}

impl std::fmt::Display for DeviceOrientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceOrientation::Portrait => "portrait",
            DeviceOrientation::PortraitUpsideDown => "portrait-upside-down",
            DeviceOrientation::LandscapeLeft => "landscape-left",
            DeviceOrientation::LandscapeRight => "landscape-right",
            DeviceOrientation::FaceUp => "face-up",
            DeviceOrientation::FaceDown => "face-down",
            DeviceOrientation::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Rotation metadata written on output connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl VideoOrientation {
    /// Clockwise rotation a player applies to display the frame upright.
    pub fn rotation_degrees(&self) -> u32 {
        match self {
            VideoOrientation::LandscapeRight => 0,
            VideoOrientation::Portrait => 90,
            VideoOrientation::LandscapeLeft => 180,
            VideoOrientation::PortraitUpsideDown => 270,
        }
    }
}

/// Gravity vector in units of g, in the device's reference frame.
///
/// `x` points right, `y` points to the top of the screen, `z` points out
/// of the screen. Upright portrait reads roughly `(0, -1, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GravityVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl GravityVector {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}
