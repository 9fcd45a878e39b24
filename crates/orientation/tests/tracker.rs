use std::time::Duration;

use altimeter_media_model::{DeviceOrientation, GravityVector};
use altimeter_orientation::{OrientationTracker, ScriptedGravity, Strategy};

const INTERVAL: Duration = Duration::from_millis(2);

/// Unit gravity in the screen plane, `degrees` away from upright portrait
/// towards the device's right side.
fn tilted(degrees: f64) -> GravityVector {
    let rad = degrees.to_radians();
    GravityVector::new(rad.sin(), -rad.cos(), 0.0)
}

async fn wait_for(tracker: &OrientationTracker, expected: DeviceOrientation) {
    let mut rx = tracker.subscribe();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|o| *o == expected))
        .await
        .expect("orientation was not published in time")
        .expect("tracker dropped");
}

#[tokio::test]
async fn publishes_classified_orientation() {
    let tracker = OrientationTracker::new();
    assert_eq!(tracker.orientation(), DeviceOrientation::Unknown);

    let source = ScriptedGravity::constant(GravityVector::new(-1.0, 0.0, 0.0));
    assert!(tracker
        .start(Box::new(source), Strategy::SystemLike, INTERVAL)
        .unwrap());

    wait_for(&tracker, DeviceOrientation::LandscapeLeft).await;
    tracker.stop();
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
    let tracker = OrientationTracker::new();
    let first = ScriptedGravity::constant(GravityVector::new(0.0, -1.0, 0.0));
    let second = ScriptedGravity::constant(GravityVector::new(0.0, 0.0, 1.0));

    assert!(tracker
        .start(Box::new(first), Strategy::SystemLike, INTERVAL)
        .unwrap());
    assert!(!tracker
        .start(Box::new(second), Strategy::SystemLike, INTERVAL)
        .unwrap());

    wait_for(&tracker, DeviceOrientation::Portrait).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(tracker.orientation(), DeviceOrientation::Portrait);
    tracker.stop();
}

#[tokio::test]
async fn stop_resets_to_unknown() {
    let tracker = OrientationTracker::new();
    let source = ScriptedGravity::constant(GravityVector::new(0.0, 0.0, -1.0));
    tracker
        .start(Box::new(source), Strategy::LargestAxis, INTERVAL)
        .unwrap();
    wait_for(&tracker, DeviceOrientation::FaceUp).await;

    tracker.stop();
    assert!(!tracker.is_running());
    assert_eq!(tracker.orientation(), DeviceOrientation::Unknown);

    // A stopped tracker can be started again.
    let source = ScriptedGravity::constant(GravityVector::new(0.0, 1.0, 0.0));
    assert!(tracker
        .start(Box::new(source), Strategy::LargestAxis, INTERVAL)
        .unwrap());
    wait_for(&tracker, DeviceOrientation::PortraitUpsideDown).await;
    tracker.stop();
}

#[tokio::test]
async fn straddling_samples_do_not_oscillate() {
    // Either side of the 45 degree diagonal.
    let tracker = OrientationTracker::new();
    let script =
        ScriptedGravity::new([tilted(0.0), tilted(44.0), tilted(46.0), tilted(44.0)]).looping();
    tracker
        .start(Box::new(script), Strategy::SystemLike, INTERVAL)
        .unwrap();
    wait_for(&tracker, DeviceOrientation::Portrait).await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(tracker.orientation(), DeviceOrientation::Portrait);
    assert_eq!(tracker.update_count(), 1);
    tracker.stop();

    // Either side of the landscape threshold (about 61 degrees).
    let tracker = OrientationTracker::new();
    let script = ScriptedGravity::new([tilted(60.0), tilted(63.0)]).looping();
    tracker
        .start(Box::new(script), Strategy::SystemLike, INTERVAL)
        .unwrap();
    wait_for(&tracker, DeviceOrientation::LandscapeRight).await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(tracker.orientation(), DeviceOrientation::LandscapeRight);
    assert_eq!(tracker.update_count(), 1);
    tracker.stop();
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let tracker = OrientationTracker::new();
    let source = ScriptedGravity::constant(GravityVector::new(0.0, -1.0, 0.0));
    assert!(tracker
        .start(Box::new(source), Strategy::SystemLike, Duration::ZERO)
        .is_err());
    assert!(!tracker.is_running());
}
