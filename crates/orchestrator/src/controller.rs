//! Camera controller.
//!
//! Routes captured frames to the preview and the recorder, follows the
//! orientation tracker, and publishes [`CameraState`] and [`CameraEvent`]s
//! for the presentation layer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use altimeter_capture_engine::{CaptureSessionManager, FrameHandler, NormalizedPoint, SessionState};
use altimeter_common::config::{AppConfig, OrientationConfig};
use altimeter_common::error::{AltimeterError, AltimeterResult};
use altimeter_compositor::{WatermarkItem, WatermarkSlot};
use altimeter_media_model::{
    CaptureMode, Coordinate, Device, DeviceOrientation, Frame, FramePayload, Photo,
};
use altimeter_orientation::{GravitySource, OrientationTracker, Strategy};
use altimeter_recorder::{Recorder, RecorderStats, VideoTrack, WriterFactory};
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;

use crate::library::PhotoLibrary;
use crate::state::{CameraEvent, CameraState};

const EVENT_CAPACITY: usize = 16;

pub struct CameraController {
    session: Arc<CaptureSessionManager>,
    recorder: Arc<Recorder>,
    watermarks: WatermarkSlot,
    tracker: Arc<OrientationTracker>,
    state: Arc<watch::Sender<CameraState>>,
    events: broadcast::Sender<CameraEvent>,
    output_path: PathBuf,
    orientation: OrientationConfig,
    frames_wired: AtomicBool,
    follower: Mutex<Option<JoinHandle<()>>>,
}

impl CameraController {
    pub fn new(
        session: CaptureSessionManager,
        writers: Arc<dyn WriterFactory>,
        config: &AppConfig,
    ) -> Self {
        let watermarks = WatermarkSlot::new();
        let recorder = Recorder::new(writers, config.recording.clone(), watermarks.clone());
        let (state, _) = watch::channel(CameraState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session: Arc::new(session),
            recorder: Arc::new(recorder),
            watermarks,
            tracker: Arc::new(OrientationTracker::new()),
            state: Arc::new(state),
            events,
            output_path: config.recording.output_path(),
            orientation: config.orientation.clone(),
            frames_wired: AtomicBool::new(false),
            follower: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &CaptureSessionManager {
        &self.session
    }

    pub fn state(&self) -> CameraState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CameraState> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CameraEvent> {
        self.events.subscribe()
    }

    /// Path every recording is written to.
    pub fn output_path(&self) -> &std::path::Path {
        &self.output_path
    }

    pub fn recorder_stats(&self) -> RecorderStats {
        self.recorder.stats()
    }

    pub fn watermarks(&self) -> &WatermarkSlot {
        &self.watermarks
    }

    /// Replace the overlays composited onto recorded frames.
    pub fn set_watermarks(&self, items: Vec<WatermarkItem>) {
        tracing::debug!(items = items.len(), "Watermarks updated");
        self.watermarks.set(items);
    }

    pub fn clear_watermarks(&self) {
        self.watermarks.clear();
    }

    /// Wire frame delivery and start the capture session.
    ///
    /// A denied camera permission is reflected in
    /// [`CameraState::authorization_denied`] and returned as an error.
    pub async fn start_session(&self) -> AltimeterResult<()> {
        if !self.frames_wired.swap(true, Ordering::SeqCst) {
            if let Err(e) = self
                .session
                .set_frame_handler(Some(self.frame_handler()))
                .await
            {
                self.frames_wired.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }
        let result = self.session.start().await;
        self.sync_session();
        result
    }

    pub async fn stop_session(&self) -> AltimeterResult<()> {
        self.session.stop().await?;
        self.sync_session();
        Ok(())
    }

    pub async fn switch_device(&self) -> AltimeterResult<Device> {
        let device = self.session.switch_device().await?;
        self.sync_session();
        Ok(device)
    }

    /// Change capture mode. Refused while a recording is in progress.
    pub async fn set_mode(&self, mode: CaptureMode) -> AltimeterResult<()> {
        if self.recorder.is_recording() {
            return Err(AltimeterError::invalid_state(
                "capture mode cannot change while recording",
            ));
        }
        self.session.set_mode(mode).await?;
        self.sync_session();
        Ok(())
    }

    pub async fn set_zoom(&self, factor: f64) -> AltimeterResult<f64> {
        self.session.set_zoom(factor).await
    }

    pub async fn set_focus_point(&self, point: NormalizedPoint) -> AltimeterResult<bool> {
        self.session.set_focus_point(point).await
    }

    /// Capture a still and publish it as the latest photo.
    pub async fn take_photo(&self) -> AltimeterResult<Photo> {
        let photo = self.session.take_photo().await?;
        self.state.send_modify(|state| state.photo = Some(photo.clone()));
        Ok(photo)
    }

    /// Hand the latest photo to `library`. Returns `Ok(false)` when no
    /// photo has been taken yet.
    pub fn save_photo(
        &self,
        library: &dyn PhotoLibrary,
        coordinate: Option<Coordinate>,
    ) -> AltimeterResult<bool> {
        let Some(photo) = self.state.borrow().photo.clone() else {
            return Ok(false);
        };
        library.save_image(&photo, coordinate)?;
        Ok(true)
    }

    /// Start recording the running video session to [`output_path`].
    ///
    /// Returns `Ok(false)` if a recording is already in progress.
    ///
    /// [`output_path`]: CameraController::output_path
    pub fn start_recording(&self) -> AltimeterResult<bool> {
        let status = self.session.status();
        if status.mode != CaptureMode::Video {
            return Err(AltimeterError::invalid_state(
                "recording requires video mode",
            ));
        }
        if status.state != SessionState::Running {
            return Err(AltimeterError::invalid_state(
                "recording requires a running session",
            ));
        }

        let track = match status.connection {
            Some(connection) => VideoTrack::new(status.video_size)
                .oriented(connection.orientation, connection.mirrored),
            None => VideoTrack::new(status.video_size),
        };
        let started = self.recorder.start_recording(&self.output_path, track)?;
        if started {
            self.state.send_modify(|state| state.is_recording = true);
            let _ = self.events.send(CameraEvent::DidStartRecording);
        }
        Ok(started)
    }

    /// Finish the recording and wait for the movie to be finalized.
    ///
    /// `None` means nothing was recording or finalizing failed; only a
    /// successful result is announced as [`CameraEvent::DidStopRecording`].
    pub async fn stop_recording(&self) -> Option<PathBuf> {
        let (tx, rx) = oneshot::channel();
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        self.recorder.stop_recording(move |result| {
            state.send_modify(|state| state.is_recording = false);
            if let Some(path) = &result {
                let _ = events.send(CameraEvent::DidStopRecording(Some(path.clone())));
            }
            let _ = tx.send(result);
        });
        rx.await.ok().flatten()
    }

    /// Start orientation sampling and let the session follow it.
    ///
    /// Orientation changes are ignored while recording so a movie keeps the
    /// orientation it started with. Returns `Ok(false)` if already running.
    pub fn start_orientation_tracking(
        &self,
        source: Box<dyn GravitySource>,
    ) -> AltimeterResult<bool> {
        let strategy = Strategy::from(self.orientation.strategy);
        let interval = Duration::from_millis(self.orientation.sample_interval_ms);
        if !self.tracker.start(source, strategy, interval)? {
            return Ok(false);
        }

        let mut updates = self.tracker.subscribe();
        let session = Arc::clone(&self.session);
        let recorder = Arc::clone(&self.recorder);
        let state = Arc::clone(&self.state);
        let follower = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let orientation = *updates.borrow_and_update();
                if recorder.is_recording() {
                    tracing::debug!(%orientation, "Ignoring orientation change while recording");
                    continue;
                }
                if let Err(e) = session.set_orientation(orientation).await {
                    tracing::warn!(error = %e, %orientation, "Failed to apply orientation");
                }
                let resolution = session.status().video_size;
                state.send_modify(|state| {
                    state.device_orientation = orientation;
                    state.apply_resolution(resolution);
                });
            }
        });
        if let Some(previous) = self.follower.lock().replace(follower) {
            previous.abort();
        }
        Ok(true)
    }

    pub fn stop_orientation_tracking(&self) {
        if let Some(follower) = self.follower.lock().take() {
            follower.abort();
        }
        self.tracker.stop();
        let resolution = self.session.status().video_size;
        self.state.send_modify(|state| {
            state.device_orientation = DeviceOrientation::Unknown;
            state.apply_resolution(resolution);
        });
    }

    fn frame_handler(&self) -> FrameHandler {
        let recorder = Arc::clone(&self.recorder);
        let state = Arc::clone(&self.state);
        Arc::new(move |frame: Frame| match frame.payload {
            FramePayload::Video(buffer) => {
                recorder.write_video(frame.pts, &buffer);
                state.send_modify(|state| state.preview_frame = Some(buffer));
            }
            FramePayload::Audio(buffer) => recorder.write_audio(frame.pts, &buffer),
        })
    }

    fn sync_session(&self) {
        let status = self.session.status();
        self.state.send_modify(|state| {
            state.authorization_denied = status.authorization_denied;
            if status.selection.device().is_some() {
                state.apply_resolution(status.video_size);
            }
        });
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        if let Some(follower) = self.follower.lock().take() {
            follower.abort();
        }
        self.tracker.stop();
    }
}
