use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use altimeter_capture_engine::{
    CaptureSessionManager, SessionSettings, StaticDeviceRegistry, StaticPermissionBroker,
    SyntheticBackend, SyntheticInspector,
};
use altimeter_common::clock::MediaTime;
use altimeter_common::config::AppConfig;
use altimeter_common::error::{AltimeterError, AltimeterResult};
use altimeter_compositor::WatermarkItem;
use altimeter_media_model::{
    AudioBuffer, CaptureMode, Coordinate, Device, DeviceCapabilities, DevicePosition,
    FrameSize, GravityVector, PixelBuffer, Photo, VideoOrientation,
};
use altimeter_orchestrator::{CameraController, CameraEvent, CameraState, PhotoLibrary};
use altimeter_orientation::ScriptedGravity;
use altimeter_recorder::{image_orientation, MediaWriter, WriterFactory, WriterSettings};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::TryRecvError;

const PRESET: FrameSize = FrameSize::new(32, 24);
const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Journal {
    anchor: Option<MediaTime>,
    video: Vec<(MediaTime, PixelBuffer)>,
    audio: usize,
}

#[derive(Default)]
struct MemoryWriters {
    journal: Arc<Mutex<Journal>>,
    fail_finish: Arc<AtomicBool>,
    created: Mutex<Vec<WriterSettings>>,
}

struct MemoryWriter {
    path: PathBuf,
    journal: Arc<Mutex<Journal>>,
    fail_finish: bool,
}

impl WriterFactory for MemoryWriters {
    fn create(
        &self,
        path: &Path,
        settings: &WriterSettings,
    ) -> AltimeterResult<Box<dyn MediaWriter>> {
        self.created.lock().push(settings.clone());
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            journal: Arc::clone(&self.journal),
            fail_finish: self.fail_finish.load(Ordering::SeqCst),
        }))
    }
}

impl MediaWriter for MemoryWriter {
    fn start_session_at(&mut self, anchor: MediaTime) {
        self.journal.lock().anchor = Some(anchor);
    }

    fn is_video_ready(&self) -> bool {
        true
    }

    fn append_video(&mut self, pts: MediaTime, buffer: &PixelBuffer) {
        self.journal.lock().video.push((pts, buffer.clone()));
    }

    fn is_audio_ready(&self) -> bool {
        true
    }

    fn append_audio(&mut self, _pts: MediaTime, _buffer: &AudioBuffer) {
        self.journal.lock().audio += 1;
    }

    fn finish(self: Box<Self>) -> AltimeterResult<PathBuf> {
        if self.fail_finish {
            return Err(AltimeterError::writer("storage exhausted"));
        }
        std::fs::write(&self.path, b"moov")?;
        Ok(self.path)
    }
}

#[derive(Default)]
struct MemoryLibrary {
    saved: Mutex<Vec<(usize, Option<Coordinate>)>>,
}

impl PhotoLibrary for MemoryLibrary {
    fn save_image(&self, photo: &Photo, coordinate: Option<Coordinate>) -> AltimeterResult<()> {
        self.saved.lock().push((photo.data.len(), coordinate));
        Ok(())
    }
}

struct Harness {
    controller: CameraController,
    inspector: SyntheticInspector,
    writers: Arc<MemoryWriters>,
    _dir: tempfile::TempDir,
}

fn harness_with(permissions: StaticPermissionBroker) -> Harness {
    let back = Device::camera("back", "Back Camera", DevicePosition::Back, FrameSize::new(64, 48))
        .with_capabilities(DeviceCapabilities {
            max_zoom_factor: 4.0,
            has_flash: true,
            focus_point_of_interest: true,
            exposure_point_of_interest: true,
        });
    let front = Device::camera("front", "Front Camera", DevicePosition::Front, FrameSize::new(48, 36));
    let mic = Device::microphone("mic", "Built-in Microphone");

    let backend = SyntheticBackend::new(30);
    let inspector = backend.inspector();
    let session = CaptureSessionManager::new(
        Box::new(backend),
        Arc::new(StaticDeviceRegistry::new(vec![back, front, mic])),
        Arc::new(permissions),
        SessionSettings {
            video_preset: PRESET,
        },
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    // An absolute file name replaces the temporary directory.
    config.recording.output_file_name = dir.path().join("output.mov").display().to_string();
    config.orientation.sample_interval_ms = 10;

    let writers = Arc::new(MemoryWriters::default());
    let controller = CameraController::new(session, writers.clone(), &config);
    Harness {
        controller,
        inspector,
        writers,
        _dir: dir,
    }
}

fn harness() -> Harness {
    harness_with(StaticPermissionBroker::granted())
}

async fn wait_for_state(
    controller: &CameraController,
    predicate: impl FnMut(&CameraState) -> bool,
) -> CameraState {
    let mut rx = controller.subscribe_state();
    let state = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("state never matched")
        .expect("state channel closed");
    state.clone()
}

async fn wait_for_recorded_frames(h: &Harness, count: usize) {
    tokio::time::timeout(WAIT, async {
        while h.writers.journal.lock().video.len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("recorder never received frames");
}

#[tokio::test]
async fn denied_permission_is_reflected_in_state() {
    let h = harness_with(StaticPermissionBroker::denied());
    let err = h.controller.start_session().await.unwrap_err();
    assert!(matches!(err, AltimeterError::PermissionDenied { .. }));

    let state = h.controller.state();
    assert!(state.authorization_denied);
    assert_eq!(state.video_size, FrameSize::ZERO);
    assert_eq!(h.inspector.commit_count(), 0);
}

#[tokio::test]
async fn running_session_publishes_preview_and_sizes() {
    let h = harness();
    h.controller.start_session().await.unwrap();

    let state = wait_for_state(&h.controller, |s| s.preview_frame.is_some()).await;
    // Portrait until the tracker says otherwise.
    assert_eq!(state.video_size, FrameSize::new(48, 64));
    assert!((state.aspect_ratio - 0.75).abs() < 1e-9);
    assert!(!state.is_recording);
}

#[tokio::test]
async fn recording_round_trip_emits_events() {
    let h = harness();
    let mut events = h.controller.subscribe_events();
    h.controller.set_mode(CaptureMode::Video).await.unwrap();
    h.controller.start_session().await.unwrap();

    let mark = Arc::new(RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255])));
    h.controller
        .set_watermarks(vec![WatermarkItem::image(mark, 1.0, 0, 0)]);

    assert!(h.controller.start_recording().unwrap());
    assert_eq!(events.recv().await.unwrap(), CameraEvent::DidStartRecording);
    assert!(h.controller.state().is_recording);

    wait_for_recorded_frames(&h, 3).await;
    let path = h.controller.stop_recording().await.expect("recording failed");

    assert_eq!(path, h.controller.output_path());
    assert!(path.exists());
    assert_eq!(
        events.recv().await.unwrap(),
        CameraEvent::DidStopRecording(Some(path.clone()))
    );
    assert!(!h.controller.state().is_recording);

    let journal = h.writers.journal.lock();
    let (first_pts, first) = &journal.video[0];
    assert_eq!(journal.anchor, Some(*first_pts));
    assert_eq!(first.size(), PRESET);
    assert_eq!(first.pixel(1, 1), Some([255, 255, 255, 255]));
    assert!(h.controller.recorder_stats().video_appended >= 3);
}

#[tokio::test]
async fn second_start_recording_is_ignored() {
    let h = harness();
    h.controller.set_mode(CaptureMode::Video).await.unwrap();
    h.controller.start_session().await.unwrap();

    assert!(h.controller.start_recording().unwrap());
    assert!(!h.controller.start_recording().unwrap());
    assert!(h.controller.stop_recording().await.is_some());
}

#[tokio::test]
async fn failed_finalize_reports_none_without_event() {
    let h = harness();
    h.writers.fail_finish.store(true, Ordering::SeqCst);
    h.controller.set_mode(CaptureMode::Video).await.unwrap();
    h.controller.start_session().await.unwrap();

    let mut events = h.controller.subscribe_events();
    h.controller.start_recording().unwrap();
    assert_eq!(events.recv().await.unwrap(), CameraEvent::DidStartRecording);

    assert_eq!(h.controller.stop_recording().await, None);
    assert!(!h.controller.state().is_recording);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn stop_recording_while_idle_returns_none() {
    let h = harness();
    let mut events = h.controller.subscribe_events();
    assert_eq!(h.controller.stop_recording().await, None);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn recording_requires_a_running_video_session() {
    let h = harness();
    let err = h.controller.start_recording().unwrap_err();
    assert!(matches!(err, AltimeterError::InvalidState { .. }));

    h.controller.start_session().await.unwrap();
    let err = h.controller.start_recording().unwrap_err();
    assert!(matches!(err, AltimeterError::InvalidState { .. }));
}

#[tokio::test]
async fn mode_is_locked_while_recording() {
    let h = harness();
    h.controller.set_mode(CaptureMode::Video).await.unwrap();
    h.controller.start_session().await.unwrap();
    h.controller.start_recording().unwrap();

    let err = h.controller.set_mode(CaptureMode::Photo).await.unwrap_err();
    assert!(matches!(err, AltimeterError::InvalidState { .. }));
    assert_eq!(h.controller.session().status().mode, CaptureMode::Video);
    h.controller.stop_recording().await;
}

#[tokio::test]
async fn orientation_changes_flip_video_size() {
    let h = harness();
    h.controller.start_session().await.unwrap();

    let landscape = ScriptedGravity::constant(GravityVector::new(-1.0, 0.0, 0.0));
    assert!(h
        .controller
        .start_orientation_tracking(Box::new(landscape))
        .unwrap());

    let state = wait_for_state(&h.controller, |s| s.device_orientation.is_landscape()).await;
    assert_eq!(state.video_size, FrameSize::new(64, 48));
    assert_ne!(
        h.inspector.connection().orientation,
        VideoOrientation::Portrait
    );

    h.controller.stop_orientation_tracking();
    let state = h.controller.state();
    assert!(!state.device_orientation.is_landscape());
    assert_eq!(state.video_size, FrameSize::new(48, 64));
}

#[tokio::test]
async fn landscape_recording_is_tagged_landscape() {
    let h = harness();
    h.controller.set_mode(CaptureMode::Video).await.unwrap();
    h.controller.start_session().await.unwrap();

    let landscape = ScriptedGravity::constant(GravityVector::new(-1.0, 0.0, 0.0));
    h.controller
        .start_orientation_tracking(Box::new(landscape))
        .unwrap();
    wait_for_state(&h.controller, |s| s.device_orientation.is_landscape()).await;
    h.controller.stop_orientation_tracking();

    assert!(h.controller.start_recording().unwrap());
    let settings = h.writers.created.lock().last().cloned().unwrap();
    assert_eq!(settings.orientation, VideoOrientation::LandscapeRight);
    assert_eq!(settings.orientation, h.inspector.connection().orientation);
    assert!(!settings.mirrored);
    assert_eq!(image_orientation(&settings), "rotate-0");
    h.controller.stop_recording().await;
}

#[tokio::test]
async fn portrait_recording_keeps_the_portrait_tag() {
    let h = harness();
    h.controller.set_mode(CaptureMode::Video).await.unwrap();
    h.controller.start_session().await.unwrap();

    assert!(h.controller.start_recording().unwrap());
    let settings = h.writers.created.lock().last().cloned().unwrap();
    assert_eq!(settings.orientation, VideoOrientation::Portrait);
    assert_eq!(image_orientation(&settings), "rotate-90");
    h.controller.stop_recording().await;
}

#[tokio::test]
async fn orientation_is_frozen_while_recording() {
    let h = harness();
    h.controller.set_mode(CaptureMode::Video).await.unwrap();
    h.controller.start_session().await.unwrap();
    h.controller.start_recording().unwrap();

    let landscape = ScriptedGravity::constant(GravityVector::new(1.0, 0.0, 0.0));
    h.controller
        .start_orientation_tracking(Box::new(landscape))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!h.controller.state().device_orientation.is_landscape());
    h.controller.stop_recording().await;
}

#[tokio::test]
async fn photos_are_published_and_saved() {
    let h = harness();
    let library = MemoryLibrary::default();
    assert!(!h.controller.save_photo(&library, None).unwrap());

    h.controller.start_session().await.unwrap();
    let photo = h.controller.take_photo().await.unwrap();
    assert_eq!(h.controller.state().photo.as_ref(), Some(&photo));

    let here = Coordinate {
        latitude: 46.52,
        longitude: 6.63,
    };
    assert!(h.controller.save_photo(&library, Some(here)).unwrap());
    assert_eq!(*library.saved.lock(), vec![(photo.data.len(), Some(here))]);
}

#[tokio::test]
async fn zoom_and_focus_pass_through() {
    let h = harness();
    h.controller.start_session().await.unwrap();
    assert_eq!(h.controller.set_zoom(10.0).await.unwrap(), 4.0);
    assert!(h
        .controller
        .set_focus_point(altimeter_capture_engine::NormalizedPoint::new(0.2, 0.8))
        .await
        .unwrap());

    let next = h.controller.switch_device().await.unwrap();
    assert_eq!(next.id.as_str(), "front");
    assert_eq!(h.controller.state().video_size, FrameSize::new(36, 48));
}
