//! Capture session management.
//!
//! [`CaptureSessionManager`] is a handle to a session worker running on a
//! dedicated configuration thread. Every graph mutation is sent to that
//! thread as a command and executed strictly in submission order. Frame
//! delivery happens on the backend's own threads and never waits on this
//! queue.

use std::sync::Arc;
use std::thread::JoinHandle;

use altimeter_common::config::CaptureDefaults;
use altimeter_common::error::{AltimeterError, AltimeterResult, PermissionKind};
use altimeter_media_model::{
    CaptureMode, Device, DeviceOrientation, FrameSize, MediaType, Photo, PhotoSettings,
    VideoOrientation,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};

use crate::backend::{
    CaptureBackend, CaptureOutput, ConnectionMetadata, FrameHandler, GraphConfiguration,
    NormalizedPoint,
};
use crate::permissions::PermissionBroker;
use crate::registry::DeviceRegistry;

/// Session presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Frame size requested in video mode.
    pub video_preset: FrameSize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&CaptureDefaults::default())
    }
}

impl From<&CaptureDefaults> for SessionSettings {
    fn from(defaults: &CaptureDefaults) -> Self {
        Self {
            video_preset: FrameSize::new(defaults.video_width, defaults.video_height),
        }
    }
}

/// Lifecycle of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No graph has been committed yet.
    Unconfigured,
    /// A photo-mode graph is being committed.
    ConfiguringPhoto,
    /// A video-mode graph is being committed.
    ConfiguringVideo,
    /// Committed and delivering frames.
    Running,
    /// Committed but not delivering frames.
    Stopped,
}

impl SessionState {
    fn configuring(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Photo => SessionState::ConfiguringPhoto,
            CaptureMode::Video => SessionState::ConfiguringVideo,
        }
    }
}

/// The camera the session uses.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSelection {
    NoDevice,
    HasDevice(Device),
}

impl DeviceSelection {
    pub fn device(&self) -> Option<&Device> {
        match self {
            DeviceSelection::NoDevice => None,
            DeviceSelection::HasDevice(device) => Some(device),
        }
    }
}

/// Snapshot of the session published after every command.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub mode: CaptureMode,
    pub selection: DeviceSelection,
    /// Frame size of the committed video input, unrotated.
    pub video_size: FrameSize,
    pub zoom_factor: f64,
    pub orientation: DeviceOrientation,
    /// Rotation tag and mirroring of the committed video connection.
    pub connection: Option<ConnectionMetadata>,
    /// Set once camera access has been refused. Never cleared.
    pub authorization_denied: bool,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Unconfigured,
            mode: CaptureMode::Photo,
            selection: DeviceSelection::NoDevice,
            video_size: FrameSize::ZERO,
            zoom_factor: 1.0,
            orientation: DeviceOrientation::Unknown,
            connection: None,
            authorization_denied: false,
        }
    }
}

type Reply<T> = oneshot::Sender<AltimeterResult<T>>;

enum Command {
    Start { reply: Reply<()> },
    MarkAuthorizationDenied { reply: Reply<()> },
    Stop { reply: Reply<()> },
    SwitchDevice { reply: Reply<Device> },
    SetMode { mode: CaptureMode, reply: Reply<()> },
    SetZoom { factor: f64, reply: Reply<f64> },
    SetFocusPoint { point: NormalizedPoint, reply: Reply<bool> },
    SetOrientation { orientation: DeviceOrientation, reply: Reply<()> },
    TakePhoto { reply: Reply<Photo> },
    SetFrameHandler { handler: Option<FrameHandler>, reply: Reply<()> },
    Shutdown,
}

/// Handle to the capture session.
pub struct CaptureSessionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    permissions: Arc<dyn PermissionBroker>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureSessionManager {
    /// Spawn the configuration thread. The session starts unconfigured in
    /// photo mode.
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        registry: Arc<dyn DeviceRegistry>,
        permissions: Arc<dyn PermissionBroker>,
        settings: SessionSettings,
    ) -> AltimeterResult<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());

        tracing::info!(backend = %backend.name(), "Creating capture session");
        let worker = SessionWorker {
            backend,
            registry,
            settings,
            state: SessionState::Unconfigured,
            mode: CaptureMode::Photo,
            selection: DeviceSelection::NoDevice,
            committed: None,
            zoom_factor: 1.0,
            orientation: DeviceOrientation::Unknown,
            video_orientation: VideoOrientation::Portrait,
            authorization_denied: false,
            status: status_tx,
        };
        let handle = std::thread::Builder::new()
            .name("capture-config".to_string())
            .spawn(move || worker.run(rx))?;

        Ok(Self {
            commands: tx,
            status: status_rx,
            permissions,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Request access and bring the session up.
    ///
    /// In video mode microphone access is requested first; only the camera
    /// answer gates configuration. Denial sets the sticky
    /// `authorization_denied` flag and leaves the session unconfigured. An
    /// already configured session simply resumes running.
    pub async fn start(&self) -> AltimeterResult<()> {
        if self.status().mode == CaptureMode::Video {
            let granted = self.permissions.request_microphone_access().await;
            tracing::debug!(granted, "Microphone access answered");
        }
        if !self.permissions.request_camera_access().await {
            tracing::warn!("Camera access denied");
            self.request(|reply| Command::MarkAuthorizationDenied { reply })
                .await?;
            return Err(AltimeterError::permission_denied(PermissionKind::Camera));
        }
        self.request(|reply| Command::Start { reply }).await
    }

    /// Stop frame delivery. The committed graph is kept for the next start.
    pub async fn stop(&self) -> AltimeterResult<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Move to the next camera in switching order. Returns the new camera.
    pub async fn switch_device(&self) -> AltimeterResult<Device> {
        self.request(|reply| Command::SwitchDevice { reply }).await
    }

    pub async fn set_mode(&self, mode: CaptureMode) -> AltimeterResult<()> {
        self.request(|reply| Command::SetMode { mode, reply }).await
    }

    /// Apply a zoom factor clamped to the camera's range. Returns the
    /// factor actually applied.
    pub async fn set_zoom(&self, factor: f64) -> AltimeterResult<f64> {
        self.request(|reply| Command::SetZoom { factor, reply })
            .await
    }

    /// One-shot focus and exposure at a normalized point. Returns whether
    /// the camera supported either.
    pub async fn set_focus_point(&self, point: NormalizedPoint) -> AltimeterResult<bool> {
        self.request(|reply| Command::SetFocusPoint { point, reply })
            .await
    }

    /// Tag output connections with the rotation for `orientation`. Flat and
    /// unknown orientations keep the previous tag.
    pub async fn set_orientation(&self, orientation: DeviceOrientation) -> AltimeterResult<()> {
        self.request(|reply| Command::SetOrientation { orientation, reply })
            .await
    }

    pub async fn take_photo(&self) -> AltimeterResult<Photo> {
        self.request(|reply| Command::TakePhoto { reply }).await
    }

    /// Install the callback that receives every captured frame on the
    /// backend's delivery threads.
    pub async fn set_frame_handler(&self, handler: Option<FrameHandler>) -> AltimeterResult<()> {
        self.request(|reply| Command::SetFrameHandler { handler, reply })
            .await
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Stop the backend and join the configuration thread.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Capture configuration thread panicked");
            }
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> AltimeterResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| AltimeterError::invalid_state("capture session has shut down"))?;
        rx.await
            .map_err(|_| AltimeterError::invalid_state("capture session dropped the request"))?
    }
}

impl Drop for CaptureSessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct SessionWorker {
    backend: Box<dyn CaptureBackend>,
    registry: Arc<dyn DeviceRegistry>,
    settings: SessionSettings,
    state: SessionState,
    mode: CaptureMode,
    selection: DeviceSelection,
    committed: Option<GraphConfiguration>,
    zoom_factor: f64,
    orientation: DeviceOrientation,
    /// Last rotation tag derived from an upright orientation.
    video_orientation: VideoOrientation,
    authorization_denied: bool,
    status: watch::Sender<SessionStatus>,
}

impl SessionWorker {
    fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.blocking_recv() {
            match command {
                Command::Start { reply } => {
                    let result = self.start();
                    self.finish(reply, result);
                }
                Command::MarkAuthorizationDenied { reply } => {
                    self.authorization_denied = true;
                    self.finish(reply, Ok(()));
                }
                Command::Stop { reply } => {
                    self.stop();
                    self.finish(reply, Ok(()));
                }
                Command::SwitchDevice { reply } => {
                    let result = self.switch_device();
                    self.finish(reply, result);
                }
                Command::SetMode { mode, reply } => {
                    let result = self.set_mode(mode);
                    self.finish(reply, result);
                }
                Command::SetZoom { factor, reply } => {
                    let result = self.set_zoom(factor);
                    self.finish(reply, result);
                }
                Command::SetFocusPoint { point, reply } => {
                    let result = self.set_focus_point(point);
                    self.finish(reply, result);
                }
                Command::SetOrientation { orientation, reply } => {
                    let result = self.set_orientation(orientation);
                    self.finish(reply, result);
                }
                Command::TakePhoto { reply } => self.take_photo(reply),
                Command::SetFrameHandler { handler, reply } => {
                    self.backend.set_frame_handler(handler);
                    self.finish(reply, Ok(()));
                }
                Command::Shutdown => break,
            }
        }
        self.backend.set_frame_handler(None);
        self.backend.stop_running();
        tracing::info!("Capture session shut down");
    }

    fn finish<T>(&self, reply: Reply<T>, result: AltimeterResult<T>) {
        self.publish();
        let _ = reply.send(result);
    }

    fn publish(&self) {
        self.status.send_replace(SessionStatus {
            state: self.state,
            mode: self.mode,
            selection: self.selection.clone(),
            video_size: self
                .committed
                .as_ref()
                .map(GraphConfiguration::frame_size)
                .unwrap_or(FrameSize::ZERO),
            zoom_factor: self.zoom_factor,
            orientation: self.orientation,
            connection: self.committed.as_ref().map(|graph| graph.connection),
            authorization_denied: self.authorization_denied,
        });
    }

    fn connection_for(&self, camera: &Device) -> ConnectionMetadata {
        ConnectionMetadata {
            orientation: self.video_orientation,
            mirrored: camera.position.is_mirrored(),
        }
    }

    fn microphone(&self) -> Option<Device> {
        let mic = self.registry.initial_device(MediaType::Audio);
        if mic.is_none() {
            tracing::warn!("No microphone available; recording without audio input");
        }
        mic
    }

    fn graph_for(&self, mode: CaptureMode, camera: Device) -> GraphConfiguration {
        let microphone = match mode {
            CaptureMode::Video => self.microphone(),
            CaptureMode::Photo => None,
        };
        let connection = self.connection_for(&camera);
        GraphConfiguration::for_mode(
            mode,
            camera,
            microphone,
            self.settings.video_preset,
            connection,
        )
    }

    fn start(&mut self) -> AltimeterResult<()> {
        if self.committed.is_some() {
            if self.state == SessionState::Running {
                return Ok(());
            }
            self.backend.start_running()?;
            self.state = SessionState::Running;
            tracing::info!("Capture session resumed");
            return Ok(());
        }

        self.state = SessionState::configuring(self.mode);
        self.publish();

        let camera = match self.selection.device().filter(|d| d.is_available()) {
            Some(device) => Some(device.clone()),
            None => self.registry.initial_device(MediaType::Video),
        };
        let Some(camera) = camera else {
            self.state = SessionState::Unconfigured;
            return Err(AltimeterError::device_unavailable("no camera available"));
        };

        let graph = self.graph_for(self.mode, camera.clone());
        if let Err(e) = self.backend.commit(&graph) {
            tracing::warn!(error = %e, mode = %self.mode, "Session configuration aborted");
            self.state = SessionState::Unconfigured;
            return Err(e);
        }
        tracing::info!(
            device = %camera.id,
            mode = %self.mode,
            size = %graph.frame_size(),
            "Capture session configured"
        );
        self.selection = DeviceSelection::HasDevice(camera);
        self.committed = Some(graph);
        self.zoom_factor = 1.0;

        if let Err(e) = self.backend.start_running() {
            self.state = SessionState::Stopped;
            return Err(e);
        }
        self.state = SessionState::Running;
        Ok(())
    }

    fn stop(&mut self) {
        self.backend.stop_running();
        if self.committed.is_some() {
            self.state = SessionState::Stopped;
        }
        tracing::info!("Capture session stopped");
    }

    fn switch_device(&mut self) -> AltimeterResult<Device> {
        let order = self.registry.switch_order(MediaType::Video);
        let position = self
            .selection
            .device()
            .and_then(|current| order.iter().position(|d| d.id == current.id));
        let next = match position {
            Some(i) => order[(i + 1) % order.len()].clone(),
            None => {
                let fallback = self
                    .registry
                    .default_device(MediaType::Video)
                    .filter(Device::is_available)
                    .or_else(|| order.first().cloned())
                    .ok_or_else(|| AltimeterError::device_unavailable("no camera available"))?;
                tracing::warn!(
                    device = %fallback.id,
                    "Current camera is unavailable; falling back to default"
                );
                fallback
            }
        };

        if self.selection.device().map(|d| &d.id) == Some(&next.id) {
            return Ok(next);
        }

        if let Some(committed) = &self.committed {
            let mut graph = committed.clone();
            graph.video_input = Some(next.clone());
            graph.connection = self.connection_for(&next);
            self.backend.commit(&graph).map_err(|e| {
                tracing::warn!(error = %e, device = %next.id, "Device switch aborted");
                e
            })?;
            self.committed = Some(graph);
            self.zoom_factor = 1.0;
        }

        tracing::info!(device = %next.id, position = ?next.position, "Switched camera");
        self.selection = DeviceSelection::HasDevice(next.clone());
        Ok(next)
    }

    fn set_mode(&mut self, mode: CaptureMode) -> AltimeterResult<()> {
        if mode == self.mode {
            return Ok(());
        }
        let camera = match (&self.committed, self.selection.device()) {
            (Some(_), Some(camera)) => camera.clone(),
            _ => {
                self.mode = mode;
                return Ok(());
            }
        };

        let previous = self.state;
        self.state = SessionState::configuring(mode);
        self.publish();

        let graph = self.graph_for(mode, camera);
        let result = self.backend.commit(&graph);
        self.state = previous;
        if let Err(e) = result {
            tracing::warn!(error = %e, %mode, "Mode switch aborted");
            return Err(e);
        }
        self.committed = Some(graph);
        self.mode = mode;
        tracing::info!(%mode, "Capture mode changed");
        Ok(())
    }

    fn set_zoom(&mut self, factor: f64) -> AltimeterResult<f64> {
        let camera = self.configured_camera()?;
        let applied = camera.capabilities.clamp_zoom(factor);
        let result = self
            .backend
            .lock_for_configuration(&camera.id)
            .and_then(|mut lock| lock.set_zoom_factor(applied));
        if let Err(e) = result {
            tracing::warn!(error = %e, requested = factor, "Zoom change rejected");
            return Err(e);
        }
        self.zoom_factor = applied;
        tracing::debug!(device = %camera.id, zoom = applied, "Applied zoom");
        Ok(applied)
    }

    fn set_focus_point(&mut self, point: NormalizedPoint) -> AltimeterResult<bool> {
        let camera = self.configured_camera()?;
        let caps = &camera.capabilities;
        if !caps.focus_point_of_interest && !caps.exposure_point_of_interest {
            tracing::debug!(device = %camera.id, "Point of interest not supported");
            return Ok(false);
        }
        let mut lock = self.backend.lock_for_configuration(&camera.id)?;
        if caps.focus_point_of_interest {
            lock.focus_once_at(point)?;
        }
        if caps.exposure_point_of_interest {
            lock.expose_once_at(point)?;
        }
        Ok(true)
    }

    fn set_orientation(&mut self, orientation: DeviceOrientation) -> AltimeterResult<()> {
        self.orientation = orientation;
        let Some(tag) = orientation.video_orientation() else {
            return Ok(());
        };
        self.video_orientation = tag;
        let Some(camera) = self.committed.as_ref().and_then(|g| g.video_input.clone()) else {
            return Ok(());
        };
        let metadata = self.connection_for(&camera);
        self.backend.update_connection(metadata)?;
        if let Some(graph) = self.committed.as_mut() {
            graph.connection = metadata;
        }
        Ok(())
    }

    fn take_photo(&mut self, reply: Reply<Photo>) {
        let ready = match (&self.committed, self.selection.device()) {
            (Some(graph), Some(camera))
                if self.state == SessionState::Running
                    && graph.has_output(CaptureOutput::Photo) =>
            {
                Some(camera.clone())
            }
            _ => None,
        };
        let Some(camera) = ready else {
            self.finish(
                reply,
                Err(AltimeterError::invalid_state(
                    "photo capture needs a running photo-mode session",
                )),
            );
            return;
        };

        let settings = PhotoSettings::for_capture(
            &self.backend.available_photo_codecs(),
            camera.capabilities.has_flash,
            self.video_orientation,
            camera.position.is_mirrored(),
        );
        tracing::debug!(codec = ?settings.codec, flash = ?settings.flash, "Capturing photo");
        self.backend.capture_photo(
            settings,
            Box::new(move |result| {
                let _ = reply.send(result);
            }),
        );
    }

    fn configured_camera(&self) -> AltimeterResult<Device> {
        if self.committed.is_none() {
            return Err(AltimeterError::invalid_state("capture session is not configured"));
        }
        self.selection
            .device()
            .cloned()
            .ok_or_else(|| AltimeterError::device_unavailable("no camera selected"))
    }
}
