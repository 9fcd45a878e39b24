//! Classify a gravity sample.

use altimeter_common::config::OrientationStrategyName;
use altimeter_media_model::GravityVector;
use altimeter_orientation::Strategy;

pub fn run(x: f64, y: f64, z: f64, strategy: OrientationStrategyName) -> anyhow::Result<()> {
    let gravity = GravityVector::new(x, y, z);
    let strategy = Strategy::from(strategy);

    println!("Gravity: ({x:.3}, {y:.3}, {z:.3}) g");
    println!("Strategy: {strategy:?}");
    match strategy.classify(gravity) {
        Some(orientation) => {
            println!("Orientation: {orientation}");
            match orientation.video_orientation() {
                Some(video) => println!(
                    "Video rotation: {:?} ({} degrees)",
                    video,
                    video.rotation_degrees()
                ),
                None => println!("Video rotation: unchanged"),
            }
        }
        None => println!(
            "Orientation: no update (rotation below {:.3} rad threshold)",
            Strategy::threshold_for(z)
        ),
    }
    Ok(())
}
