use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use altimeter_capture_engine::{
    CaptureOutput, CaptureSessionManager, DeviceRegistry, DeviceSelection, NormalizedPoint,
    SessionSettings, SessionState, StaticDeviceRegistry, StaticPermissionBroker, SyntheticBackend,
    SyntheticInspector,
};
use altimeter_common::error::{AltimeterError, PermissionKind};
use altimeter_media_model::{
    CaptureMode, Device, DeviceCapabilities, DeviceOrientation, DevicePosition, FlashMode, Frame,
    FrameKind, FrameSize, MediaType, PhotoCodec, VideoOrientation,
};
use parking_lot::Mutex;

fn back() -> Device {
    Device::camera("back", "Back Camera", DevicePosition::Back, FrameSize::new(64, 48))
        .with_capabilities(DeviceCapabilities {
            max_zoom_factor: 5.0,
            has_flash: true,
            focus_point_of_interest: true,
            exposure_point_of_interest: true,
        })
}

fn front() -> Device {
    Device::camera("front", "Front Camera", DevicePosition::Front, FrameSize::new(48, 36))
}

fn mic() -> Device {
    Device::microphone("mic", "Built-in Microphone")
}

/// Registry whose devices can change while the session holds it.
#[derive(Clone)]
struct SharedRegistry(Arc<Mutex<StaticDeviceRegistry>>);

impl SharedRegistry {
    fn new(registry: StaticDeviceRegistry) -> Self {
        Self(Arc::new(Mutex::new(registry)))
    }

    fn suspend(&self, index: usize) {
        if let Some(device) = self.0.lock().device_mut(index) {
            device.suspended = true;
        }
    }
}

impl DeviceRegistry for SharedRegistry {
    fn list_devices(&self, media: MediaType, position: Option<DevicePosition>) -> Vec<Device> {
        self.0.lock().list_devices(media, position)
    }

    fn default_device(&self, media: MediaType) -> Option<Device> {
        self.0.lock().default_device(media)
    }
}

struct Harness {
    session: CaptureSessionManager,
    inspector: SyntheticInspector,
    permissions: Arc<StaticPermissionBroker>,
}

fn harness_with(
    registry: impl DeviceRegistry + 'static,
    permissions: StaticPermissionBroker,
) -> Harness {
    let backend = SyntheticBackend::new(30);
    let inspector = backend.inspector();
    let permissions = Arc::new(permissions);
    let session = CaptureSessionManager::new(
        Box::new(backend),
        Arc::new(registry),
        permissions.clone(),
        SessionSettings {
            video_preset: FrameSize::new(32, 24),
        },
    )
    .unwrap();
    Harness {
        session,
        inspector,
        permissions,
    }
}

fn harness() -> Harness {
    harness_with(
        StaticDeviceRegistry::new(vec![front(), back(), mic()]),
        StaticPermissionBroker::granted(),
    )
}

fn selected_id(h: &Harness) -> Option<String> {
    h.session
        .status()
        .selection
        .device()
        .map(|d| d.id.to_string())
}

#[tokio::test]
async fn denied_camera_leaves_session_unconfigured() {
    let h = harness_with(
        StaticDeviceRegistry::new(vec![back()]),
        StaticPermissionBroker::denied(),
    );

    let err = h.session.start().await.unwrap_err();
    assert!(matches!(
        err,
        AltimeterError::PermissionDenied {
            media: PermissionKind::Camera
        }
    ));

    let status = h.session.status();
    assert!(status.authorization_denied);
    assert_eq!(status.state, SessionState::Unconfigured);
    assert_eq!(status.selection, DeviceSelection::NoDevice);
    assert_eq!(h.inspector.commit_count(), 0);
}

#[tokio::test]
async fn start_configures_photo_graph_with_back_camera() {
    let h = harness();
    h.session.start().await.unwrap();

    let status = h.session.status();
    assert_eq!(status.state, SessionState::Running);
    assert_eq!(selected_id(&h).as_deref(), Some("back"));
    assert_eq!(status.video_size, FrameSize::new(64, 48));

    let graph = h.inspector.last_commit().unwrap();
    assert!(graph.has_output(CaptureOutput::Photo));
    assert!(graph.has_output(CaptureOutput::Preview));
    assert!(graph.audio_input.is_none());
    assert!(!graph.connection.mirrored);
    assert!(h.inspector.is_running());
    assert_eq!(h.permissions.camera_requests(), 1);
    assert_eq!(h.permissions.microphone_requests(), 0);
}

#[tokio::test]
async fn video_mode_asks_for_microphone_first_but_does_not_need_it() {
    let h = harness_with(
        StaticDeviceRegistry::new(vec![back(), mic()]),
        StaticPermissionBroker::new(true, false),
    );
    h.session.set_mode(CaptureMode::Video).await.unwrap();
    assert_eq!(h.inspector.commit_count(), 0);

    h.session.start().await.unwrap();
    assert_eq!(h.permissions.microphone_requests(), 1);

    let graph = h.inspector.last_commit().unwrap();
    assert_eq!(graph.audio_input.as_ref().map(|d| d.id.to_string()).as_deref(), Some("mic"));
    assert!(graph.has_output(CaptureOutput::VideoData));
    assert_eq!(h.session.status().video_size, FrameSize::new(32, 24));
}

#[tokio::test]
async fn mode_round_trip_keeps_device_selection() {
    let h = harness();
    h.session.start().await.unwrap();
    h.session.switch_device().await.unwrap();
    let before = h.session.status().selection;

    h.session.set_mode(CaptureMode::Video).await.unwrap();
    let video = h.inspector.last_commit().unwrap();
    assert!(!video.has_output(CaptureOutput::Photo));
    assert!(video.has_output(CaptureOutput::AudioData));
    assert!(video.audio_input.is_some());
    assert_eq!(h.session.status().selection, before);

    h.session.set_mode(CaptureMode::Photo).await.unwrap();
    let photo = h.inspector.last_commit().unwrap();
    assert!(photo.has_output(CaptureOutput::Photo));
    assert!(photo.audio_input.is_none());

    let status = h.session.status();
    assert_eq!(status.selection, before);
    assert_eq!(status.mode, CaptureMode::Photo);
    assert_eq!(status.state, SessionState::Running);
}

#[tokio::test]
async fn switch_cycles_back_then_front_and_mirrors_front() {
    let h = harness();
    h.session.start().await.unwrap();
    assert_eq!(selected_id(&h).as_deref(), Some("back"));

    let next = h.session.switch_device().await.unwrap();
    assert_eq!(next.id.as_str(), "front");
    assert!(h.inspector.connection().mirrored);
    assert_eq!(h.session.status().video_size, FrameSize::new(48, 36));

    let next = h.session.switch_device().await.unwrap();
    assert_eq!(next.id.as_str(), "back");
    assert!(!h.inspector.connection().mirrored);
}

#[tokio::test]
async fn switch_falls_back_to_default_when_selection_is_gone() {
    let registry = SharedRegistry::new(
        StaticDeviceRegistry::new(vec![back(), front(), mic()]).with_default_video(1),
    );
    let h = harness_with(registry.clone(), StaticPermissionBroker::granted());
    h.session.start().await.unwrap();
    assert_eq!(selected_id(&h).as_deref(), Some("back"));

    registry.suspend(0);
    let next = h.session.switch_device().await.unwrap();
    assert_eq!(next.id.as_str(), "front");
    assert_eq!(selected_id(&h).as_deref(), Some("front"));
}

#[tokio::test]
async fn switch_without_cameras_is_reported() {
    let h = harness_with(
        StaticDeviceRegistry::new(vec![mic()]),
        StaticPermissionBroker::granted(),
    );
    assert!(matches!(
        h.session.start().await,
        Err(AltimeterError::DeviceUnavailable { .. })
    ));
    assert_eq!(h.session.status().state, SessionState::Unconfigured);
    assert!(h.session.switch_device().await.is_err());
}

#[tokio::test]
async fn zoom_is_clamped_and_applied_under_lock() {
    let h = harness();
    h.session.start().await.unwrap();
    let id = back().id;

    for (requested, expected) in [(0.25, 1.0), (2.5, 2.5), (40.0, 5.0), (f64::NAN, 1.0)] {
        let applied = h.session.set_zoom(requested).await.unwrap();
        assert_eq!(applied, expected);
        assert_eq!(h.inspector.zoom_factor(&id), Some(expected));
    }
    assert_eq!(h.inspector.lock_releases(), 4);
    assert_eq!(h.session.status().zoom_factor, 1.0);
}

#[tokio::test]
async fn zoom_failure_is_reported_but_not_fatal() {
    let h = harness();
    h.session.start().await.unwrap();
    h.session.set_zoom(2.0).await.unwrap();

    h.inspector.fail_locks(true);
    assert!(h.session.set_zoom(3.0).await.is_err());
    let status = h.session.status();
    assert_eq!(status.zoom_factor, 2.0);
    assert_eq!(status.state, SessionState::Running);

    h.inspector.fail_locks(false);
    assert_eq!(h.session.set_zoom(3.0).await.unwrap(), 3.0);
}

#[tokio::test]
async fn focus_point_is_one_shot_and_skipped_when_unsupported() {
    let h = harness();
    h.session.start().await.unwrap();

    let point = NormalizedPoint::new(0.25, 0.75);
    assert!(h.session.set_focus_point(point).await.unwrap());
    assert_eq!(h.inspector.focus_requests(), vec![point]);
    assert_eq!(h.inspector.exposure_requests(), vec![point]);

    h.session.switch_device().await.unwrap();
    assert!(!h.session.set_focus_point(point).await.unwrap());
    assert_eq!(h.inspector.focus_requests().len(), 1);
}

#[tokio::test]
async fn failed_mode_switch_keeps_last_committed_graph() {
    let h = harness();
    h.session.start().await.unwrap();
    let before = h.inspector.last_commit();

    h.inspector.fail_next_commit();
    assert!(h.session.set_mode(CaptureMode::Video).await.is_err());

    let status = h.session.status();
    assert_eq!(status.mode, CaptureMode::Photo);
    assert_eq!(status.state, SessionState::Running);
    assert_eq!(h.inspector.last_commit(), before);
}

#[tokio::test]
async fn failed_first_commit_leaves_session_unconfigured() {
    let h = harness();
    h.inspector.fail_next_commit();
    assert!(h.session.start().await.is_err());
    assert_eq!(h.session.status().state, SessionState::Unconfigured);

    h.session.start().await.unwrap();
    assert_eq!(h.session.status().state, SessionState::Running);
}

#[tokio::test]
async fn orientation_tags_connections_without_flat_updates() {
    let h = harness();
    assert_eq!(h.session.status().connection, None);
    h.session.start().await.unwrap();

    h.session
        .set_orientation(DeviceOrientation::LandscapeLeft)
        .await
        .unwrap();
    assert_eq!(
        h.inspector.connection().orientation,
        VideoOrientation::LandscapeRight
    );

    h.session
        .set_orientation(DeviceOrientation::FaceUp)
        .await
        .unwrap();
    assert_eq!(
        h.inspector.connection().orientation,
        VideoOrientation::LandscapeRight
    );
    assert_eq!(h.session.status().orientation, DeviceOrientation::FaceUp);

    h.session.switch_device().await.unwrap();
    assert_eq!(
        h.inspector.connection().orientation,
        VideoOrientation::LandscapeRight
    );
    let published = h.session.status().connection.unwrap();
    assert_eq!(published, h.inspector.connection());
    assert!(published.mirrored);
}

#[tokio::test]
async fn photo_uses_best_codec_flash_and_orientation() {
    let h = harness();
    h.session.start().await.unwrap();
    h.session
        .set_orientation(DeviceOrientation::PortraitUpsideDown)
        .await
        .unwrap();

    let photo = h.session.take_photo().await.unwrap();
    assert_eq!(photo.codec, PhotoCodec::Jpeg);
    assert_eq!(photo.size, FrameSize::new(64, 48));
    assert_eq!(photo.orientation, VideoOrientation::PortraitUpsideDown);
    assert_eq!(&photo.data[..2], &[0xFF, 0xD8]);

    let settings = h.inspector.photo_settings();
    assert_eq!(settings.len(), 1);
    assert!(settings[0].high_resolution);
    assert_eq!(settings[0].flash, FlashMode::Auto);
}

#[tokio::test]
async fn photo_errors_are_delivered_to_the_caller() {
    let h = harness();
    assert!(h.session.take_photo().await.is_err());

    h.session.start().await.unwrap();
    h.inspector.fail_photos(true);
    assert!(h.session.take_photo().await.is_err());

    h.session.set_mode(CaptureMode::Video).await.unwrap();
    h.inspector.fail_photos(false);
    assert!(h.session.take_photo().await.is_err());
}

#[tokio::test]
async fn frames_reach_the_handler_and_stop_resumes_without_reconfiguring() {
    let h = harness();
    let video = Arc::new(AtomicU64::new(0));
    let counter = video.clone();
    h.session
        .set_frame_handler(Some(Arc::new(move |frame: Frame| {
            if frame.kind() == FrameKind::Video {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        })))
        .await
        .unwrap();

    h.session.start().await.unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while video.load(Ordering::Relaxed) < 2 {
        assert!(tokio::time::Instant::now() < deadline, "no frames delivered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    h.session.stop().await.unwrap();
    assert_eq!(h.session.status().state, SessionState::Stopped);
    assert!(!h.inspector.is_running());
    assert!(h.inspector.frames_delivered(FrameKind::Video) >= 2);

    h.session.start().await.unwrap();
    assert_eq!(h.inspector.commit_count(), 1);
    assert_eq!(h.session.status().state, SessionState::Running);
    h.session.shutdown();
}

proptest::proptest! {
    #![proptest_config(proptest::prelude::ProptestConfig::with_cases(16))]

    #[test]
    fn applied_zoom_is_always_clamped(requests in proptest::collection::vec(-10.0f64..50.0, 1..16)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let h = harness();
            h.session.start().await.unwrap();
            for requested in requests {
                let applied = h.session.set_zoom(requested).await.unwrap();
                proptest::prop_assert_eq!(applied, requested.clamp(1.0, 5.0));
            }
            h.session.shutdown();
            Ok::<(), proptest::test_runner::TestCaseError>(())
        })?;
    }
}
