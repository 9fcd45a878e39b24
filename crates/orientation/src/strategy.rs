//! Orientation classification from a gravity sample.

use altimeter_common::config::OrientationStrategyName;
use altimeter_media_model::{DeviceOrientation, GravityVector};

/// Above this |z| the device is considered lying flat.
const FLAT_Z: f64 = 0.88;

/// Base rotation angle (radians) an axis must clear before an upright
/// orientation change is reported.
const BASE_THRESHOLD: f64 = 1.07;

/// Extra angle required per unit of |z|; tilted devices need a larger turn.
const TILT_THRESHOLD: f64 = 0.1;

/// How a gravity sample is turned into an orientation.
///
/// `None` from [`Strategy::classify`] means "no update": the previously
/// reported orientation stays in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Mimics the platform's own rotation behavior, with a dead band
    /// between portrait and landscape.
    #[default]
    SystemLike,

    /// The dominant axis always wins. Never returns `None`.
    LargestAxis,
}

impl Strategy {
    pub fn classify(&self, gravity: GravityVector) -> Option<DeviceOrientation> {
        match self {
            Strategy::SystemLike => classify_system_like(gravity),
            Strategy::LargestAxis => Some(classify_largest_axis(gravity)),
        }
    }

    /// Rotation threshold in radians for a sample with the given z.
    pub fn threshold_for(z: f64) -> f64 {
        BASE_THRESHOLD + TILT_THRESHOLD * z.abs()
    }
}

impl From<OrientationStrategyName> for Strategy {
    fn from(name: OrientationStrategyName) -> Self {
        match name {
            OrientationStrategyName::SystemLike => Strategy::SystemLike,
            OrientationStrategyName::LargestAxis => Strategy::LargestAxis,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::SystemLike => write!(f, "system-like"),
            Strategy::LargestAxis => write!(f, "largest-axis"),
        }
    }
}

fn classify_largest_axis(g: GravityVector) -> DeviceOrientation {
    if g.z.abs() > g.x.abs() && g.z.abs() > g.y.abs() {
        return if g.z > 0.0 {
            DeviceOrientation::FaceDown
        } else {
            DeviceOrientation::FaceUp
        };
    }
    if g.x.abs() > g.y.abs() {
        return if g.x > 0.0 {
            DeviceOrientation::LandscapeRight
        } else {
            DeviceOrientation::LandscapeLeft
        };
    }
    if g.y > 0.0 {
        DeviceOrientation::PortraitUpsideDown
    } else {
        DeviceOrientation::Portrait
    }
}

fn classify_system_like(g: GravityVector) -> Option<DeviceOrientation> {
    if g.z.abs() > FLAT_Z {
        return Some(if g.z > 0.0 {
            DeviceOrientation::FaceDown
        } else {
            DeviceOrientation::FaceUp
        });
    }

    let x = g.x.abs();
    let y = g.y.abs();
    let threshold = Strategy::threshold_for(g.z);

    if x > y && x.atan2(y) > threshold {
        return Some(if g.x > 0.0 {
            DeviceOrientation::LandscapeRight
        } else {
            DeviceOrientation::LandscapeLeft
        });
    }
    if y > x && y.atan2(x) > threshold {
        return Some(if g.y > 0.0 {
            DeviceOrientation::PortraitUpsideDown
        } else {
            DeviceOrientation::Portrait
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use super::Strategy;
    #[allow(unused_imports)]
    use proptest::strategy::Strategy as _;

    fn g(x: f64, y: f64, z: f64) -> GravityVector {
        GravityVector::new(x, y, z)
    }

    #[test]
    fn upright_samples() {
        let s = Strategy::SystemLike;
        assert_eq!(s.classify(g(0.0, -1.0, 0.0)), Some(DeviceOrientation::Portrait));
        assert_eq!(
            s.classify(g(0.0, 1.0, 0.0)),
            Some(DeviceOrientation::PortraitUpsideDown)
        );
        assert_eq!(
            s.classify(g(-1.0, 0.0, 0.0)),
            Some(DeviceOrientation::LandscapeLeft)
        );
        assert_eq!(
            s.classify(g(1.0, 0.0, 0.0)),
            Some(DeviceOrientation::LandscapeRight)
        );
    }

    #[test]
    fn flat_samples() {
        for s in [Strategy::SystemLike, Strategy::LargestAxis] {
            assert_eq!(s.classify(g(0.0, 0.0, -1.0)), Some(DeviceOrientation::FaceUp));
            assert_eq!(s.classify(g(0.0, 0.0, 1.0)), Some(DeviceOrientation::FaceDown));
        }
    }

    #[test]
    fn diagonal_is_a_dead_band_for_system_like() {
        let diagonal = g(-0.7, -0.7, 0.0);
        assert_eq!(Strategy::SystemLike.classify(diagonal), None);
    }

    #[test]
    fn largest_axis_ties_fall_through_to_portrait() {
        assert_eq!(
            Strategy::LargestAxis.classify(g(-0.5, -0.5, 0.5)),
            Some(DeviceOrientation::Portrait)
        );
    }

    #[test]
    fn tilt_raises_threshold() {
        assert!(Strategy::threshold_for(0.5) > Strategy::threshold_for(0.0));
        assert!((Strategy::threshold_for(-0.5) - 1.12).abs() < 1e-12);
    }

    proptest! {
        /// Samples whose in-plane angle lies between the two thresholds never
        /// produce an update.
        #[test]
        fn system_like_is_silent_inside_the_dead_band(
            t in 0.001f64..0.999,
            z in -0.8f64..0.8,
            sx in prop::bool::ANY,
            sy in prop::bool::ANY,
        ) {
            let threshold = Strategy::threshold_for(z);
            let lower = std::f64::consts::FRAC_PI_2 - threshold;
            let angle = lower + t * (threshold - lower);

            let planar = (1.0 - z * z).sqrt();
            let x = planar * angle.sin() * if sx { 1.0 } else { -1.0 };
            let y = planar * angle.cos() * if sy { 1.0 } else { -1.0 };
            prop_assert_eq!(Strategy::SystemLike.classify(g(x, y, z)), None);
        }

        #[test]
        fn largest_axis_always_reports(x in -1.0f64..1.0, y in -1.0f64..1.0, z in -1.0f64..1.0) {
            prop_assert!(Strategy::LargestAxis.classify(g(x, y, z)).is_some());
        }
    }
}
