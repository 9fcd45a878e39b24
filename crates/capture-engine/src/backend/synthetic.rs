//! In-process capture backend.
//!
//! Produces a moving test pattern and a sine tone on one delivery thread
//! per media type, encodes stills as JPEG, and records every configuration
//! call so tests can inspect the graph through a [`SyntheticInspector`].
//! Failures can be injected for commits, device locks, and photos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use altimeter_common::clock::{MediaTime, RateController};
use altimeter_common::error::{AltimeterError, AltimeterResult};
use altimeter_media_model::{
    AudioBuffer, DeviceId, Frame, FrameKind, FrameSize, MediaType, Photo, PhotoCodec,
    PhotoSettings, PixelBuffer, PixelFormat,
};
use parking_lot::Mutex;

use super::{
    CaptureBackend, CaptureOutput, ConnectionMetadata, DeviceConfiguration, FrameHandler,
    GraphConfiguration, NormalizedPoint, PhotoCallback,
};

/// Sample frames per audio buffer.
const AUDIO_CHUNK_FRAMES: u32 = 1024;

const TONE_HZ: f64 = 440.0;

#[derive(Default)]
struct InspectorState {
    commits: Vec<GraphConfiguration>,
    zoom: HashMap<DeviceId, f64>,
    focus_requests: Vec<NormalizedPoint>,
    exposure_requests: Vec<NormalizedPoint>,
    lock_releases: u32,
    connection: ConnectionMetadata,
    photo_settings: Vec<PhotoSettings>,
    video_frames: u64,
    audio_frames: u64,
    running: bool,
    fail_next_commit: bool,
    fail_locks: bool,
    fail_photos: bool,
}

/// Inspection and failure-injection handle for a [`SyntheticBackend`].
#[derive(Clone)]
pub struct SyntheticInspector {
    state: Arc<Mutex<InspectorState>>,
}

impl SyntheticInspector {
    /// Every successfully committed graph, oldest first.
    pub fn commits(&self) -> Vec<GraphConfiguration> {
        self.state.lock().commits.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().commits.len()
    }

    pub fn last_commit(&self) -> Option<GraphConfiguration> {
        self.state.lock().commits.last().cloned()
    }

    /// Zoom factor last applied to a device.
    pub fn zoom_factor(&self, device: &DeviceId) -> Option<f64> {
        self.state.lock().zoom.get(device).copied()
    }

    pub fn focus_requests(&self) -> Vec<NormalizedPoint> {
        self.state.lock().focus_requests.clone()
    }

    pub fn exposure_requests(&self) -> Vec<NormalizedPoint> {
        self.state.lock().exposure_requests.clone()
    }

    /// Number of device configuration locks released so far.
    pub fn lock_releases(&self) -> u32 {
        self.state.lock().lock_releases
    }

    pub fn connection(&self) -> ConnectionMetadata {
        self.state.lock().connection
    }

    pub fn photo_settings(&self) -> Vec<PhotoSettings> {
        self.state.lock().photo_settings.clone()
    }

    pub fn frames_delivered(&self, kind: FrameKind) -> u64 {
        let state = self.state.lock();
        match kind {
            FrameKind::Video => state.video_frames,
            FrameKind::Audio => state.audio_frames,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Make the next commit fail.
    pub fn fail_next_commit(&self) {
        self.state.lock().fail_next_commit = true;
    }

    /// Make device locks fail until reset.
    pub fn fail_locks(&self, fail: bool) {
        self.state.lock().fail_locks = fail;
    }

    /// Make photo captures fail until reset.
    pub fn fail_photos(&self, fail: bool) {
        self.state.lock().fail_photos = fail;
    }
}

/// Deterministic capture backend without hardware.
pub struct SyntheticBackend {
    frame_rate: u32,
    audio_sample_rate: u32,
    audio_channels: u16,
    epoch: Instant,
    state: Arc<Mutex<InspectorState>>,
    committed: Option<GraphConfiguration>,
    handler: Arc<Mutex<Option<FrameHandler>>>,
    stop_flag: Arc<AtomicBool>,
    producers: Vec<JoinHandle<()>>,
}

impl SyntheticBackend {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            audio_sample_rate: 44_100,
            audio_channels: 2,
            epoch: Instant::now(),
            state: Arc::new(Mutex::new(InspectorState::default())),
            committed: None,
            handler: Arc::new(Mutex::new(None)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            producers: Vec::new(),
        }
    }

    pub fn with_audio_format(mut self, sample_rate: u32, channels: u16) -> Self {
        self.audio_sample_rate = sample_rate.max(1);
        self.audio_channels = channels.max(1);
        self
    }

    pub fn inspector(&self) -> SyntheticInspector {
        SyntheticInspector {
            state: Arc::clone(&self.state),
        }
    }

    fn validate(graph: &GraphConfiguration) -> AltimeterResult<()> {
        let camera = graph
            .video_input
            .as_ref()
            .ok_or_else(|| AltimeterError::configuration("graph has no video input"))?;
        if camera.media_type != MediaType::Video {
            return Err(AltimeterError::configuration(format!(
                "{} is not a video device",
                camera.id
            )));
        }
        if !camera.is_available() {
            return Err(AltimeterError::device_unavailable(format!(
                "{} is disconnected or suspended",
                camera.id
            )));
        }
        if let Some(mic) = &graph.audio_input {
            if mic.media_type != MediaType::Audio || !mic.is_available() {
                return Err(AltimeterError::configuration(format!(
                    "{} cannot be used as an audio input",
                    mic.id
                )));
            }
        }
        if graph.outputs.is_empty() {
            return Err(AltimeterError::configuration("graph has no outputs"));
        }
        if graph.frame_size().is_empty() {
            return Err(AltimeterError::configuration("video input has no resolution"));
        }
        Ok(())
    }

    fn spawn_producers(&mut self) -> AltimeterResult<()> {
        let Some(graph) = self.committed.clone() else {
            return Err(AltimeterError::invalid_state("no graph committed"));
        };
        self.stop_flag = Arc::new(AtomicBool::new(false));

        let wants_video = graph.has_output(CaptureOutput::Preview)
            || graph.has_output(CaptureOutput::VideoData);
        if wants_video {
            let producer = VideoProducer {
                size: graph.frame_size(),
                frame_rate: self.frame_rate,
                epoch: self.epoch,
                stop: Arc::clone(&self.stop_flag),
                handler: Arc::clone(&self.handler),
                state: Arc::clone(&self.state),
            };
            let handle = std::thread::Builder::new()
                .name("capture-video".to_string())
                .spawn(move || producer.run())?;
            self.producers.push(handle);
        }

        if graph.audio_input.is_some() && graph.has_output(CaptureOutput::AudioData) {
            let producer = AudioProducer {
                sample_rate: self.audio_sample_rate,
                channels: self.audio_channels,
                epoch: self.epoch,
                stop: Arc::clone(&self.stop_flag),
                handler: Arc::clone(&self.handler),
                state: Arc::clone(&self.state),
            };
            let handle = std::thread::Builder::new()
                .name("capture-audio".to_string())
                .spawn(move || producer.run())?;
            self.producers.push(handle);
        }
        Ok(())
    }

    fn join_producers(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        for handle in self.producers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Synthetic producer thread panicked");
            }
        }
    }
}

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn commit(&mut self, graph: &GraphConfiguration) -> AltimeterResult<()> {
        {
            let mut state = self.state.lock();
            if std::mem::take(&mut state.fail_next_commit) {
                return Err(AltimeterError::configuration("injected commit failure"));
            }
        }
        Self::validate(graph)?;

        let was_running = self.is_running();
        if was_running {
            self.join_producers();
        }
        self.committed = Some(graph.clone());
        {
            let mut state = self.state.lock();
            state.commits.push(graph.clone());
            state.connection = graph.connection;
        }
        if was_running {
            self.spawn_producers()?;
        }
        tracing::debug!(
            outputs = graph.outputs.len(),
            size = %graph.frame_size(),
            "Synthetic graph committed"
        );
        Ok(())
    }

    fn start_running(&mut self) -> AltimeterResult<()> {
        if self.is_running() {
            return Ok(());
        }
        self.spawn_producers()?;
        self.state.lock().running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        self.join_producers();
        self.state.lock().running = false;
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn lock_for_configuration<'a>(
        &'a mut self,
        device: &DeviceId,
    ) -> AltimeterResult<Box<dyn DeviceConfiguration + 'a>> {
        let camera = self
            .committed
            .as_ref()
            .and_then(|g| g.video_input.as_ref())
            .filter(|d| &d.id == device)
            .ok_or_else(|| {
                AltimeterError::device_unavailable(format!("{device} is not in the graph"))
            })?;
        if self.state.lock().fail_locks {
            return Err(AltimeterError::configuration(format!(
                "{device} is locked by another client"
            )));
        }
        Ok(Box::new(SyntheticDeviceLock {
            device: device.clone(),
            max_zoom: camera.capabilities.max_zoom_factor.max(1.0),
            state: Arc::clone(&self.state),
        }))
    }

    fn update_connection(&mut self, metadata: ConnectionMetadata) -> AltimeterResult<()> {
        if let Some(graph) = self.committed.as_mut() {
            graph.connection = metadata;
        }
        self.state.lock().connection = metadata;
        Ok(())
    }

    fn available_photo_codecs(&self) -> Vec<PhotoCodec> {
        vec![PhotoCodec::Jpeg]
    }

    fn capture_photo(&mut self, settings: PhotoSettings, completion: PhotoCallback) {
        let size = match &self.committed {
            Some(graph) if graph.has_output(CaptureOutput::Photo) => graph.frame_size(),
            _ => {
                completion(Err(AltimeterError::invalid_state(
                    "photo output is not attached",
                )));
                return;
            }
        };
        {
            let mut state = self.state.lock();
            if !state.running {
                drop(state);
                completion(Err(AltimeterError::invalid_state("session is not running")));
                return;
            }
            state.photo_settings.push(settings.clone());
            if state.fail_photos {
                drop(state);
                completion(Err(AltimeterError::capture("injected photo failure")));
                return;
            }
        }

        let spawned = std::thread::Builder::new()
            .name("capture-photo".to_string())
            .spawn(move || completion(encode_photo(size, &settings)));
        if let Err(e) = spawned {
            tracing::error!(error = %e, "Failed to spawn photo thread");
        }
    }

    fn set_frame_handler(&mut self, handler: Option<FrameHandler>) {
        *self.handler.lock() = handler;
    }
}

impl Drop for SyntheticBackend {
    fn drop(&mut self) {
        self.join_producers();
    }
}

struct SyntheticDeviceLock {
    device: DeviceId,
    max_zoom: f64,
    state: Arc<Mutex<InspectorState>>,
}

impl DeviceConfiguration for SyntheticDeviceLock {
    fn set_zoom_factor(&mut self, factor: f64) -> AltimeterResult<()> {
        if !(1.0..=self.max_zoom).contains(&factor) {
            return Err(AltimeterError::configuration(format!(
                "zoom {factor} outside [1, {}]",
                self.max_zoom
            )));
        }
        self.state.lock().zoom.insert(self.device.clone(), factor);
        Ok(())
    }

    fn focus_once_at(&mut self, point: NormalizedPoint) -> AltimeterResult<()> {
        self.state.lock().focus_requests.push(point);
        Ok(())
    }

    fn expose_once_at(&mut self, point: NormalizedPoint) -> AltimeterResult<()> {
        self.state.lock().exposure_requests.push(point);
        Ok(())
    }
}

impl Drop for SyntheticDeviceLock {
    fn drop(&mut self) {
        self.state.lock().lock_releases += 1;
    }
}

struct VideoProducer {
    size: FrameSize,
    frame_rate: u32,
    epoch: Instant,
    stop: Arc<AtomicBool>,
    handler: Arc<Mutex<Option<FrameHandler>>>,
    state: Arc<Mutex<InspectorState>>,
}

impl VideoProducer {
    fn run(self) {
        let mut rate = RateController::new(self.frame_rate);
        let mut index: u64 = 0;
        while !self.stop.load(Ordering::Acquire) {
            let now = self.epoch.elapsed();
            if !rate.should_tick(now.as_nanos() as u64) {
                std::thread::sleep(Duration::from_millis(1));
                continue;
            }
            let frame = Frame::video(MediaTime::from_duration(now), test_pattern(self.size, index));
            index += 1;
            self.state.lock().video_frames += 1;
            let handler = self.handler.lock().clone();
            if let Some(handler) = handler {
                handler(frame);
            }
        }
    }
}

struct AudioProducer {
    sample_rate: u32,
    channels: u16,
    epoch: Instant,
    stop: Arc<AtomicBool>,
    handler: Arc<Mutex<Option<FrameHandler>>>,
    state: Arc<Mutex<InspectorState>>,
}

impl AudioProducer {
    fn run(self) {
        let chunk_hz = (self.sample_rate / AUDIO_CHUNK_FRAMES).max(1);
        let mut rate = RateController::new(chunk_hz);
        let start_ns = self.epoch.elapsed().as_nanos() as u64;
        let mut produced: u64 = 0;
        while !self.stop.load(Ordering::Acquire) {
            if !rate.should_tick(self.epoch.elapsed().as_nanos() as u64) {
                std::thread::sleep(Duration::from_millis(1));
                continue;
            }
            let pts = start_ns + produced * 1_000_000_000 / self.sample_rate as u64;
            let buffer = sine_chunk(self.sample_rate, self.channels, produced);
            produced += AUDIO_CHUNK_FRAMES as u64;
            self.state.lock().audio_frames += 1;
            let handler = self.handler.lock().clone();
            if let Some(handler) = handler {
                handler(Frame::audio(MediaTime::from_nanos(pts), buffer));
            }
        }
    }
}

/// BGRA gradient with a white bar that advances one step per frame.
pub fn test_pattern(size: FrameSize, index: u64) -> PixelBuffer {
    let (w, h) = (size.width as usize, size.height as usize);
    let mut data = vec![0u8; w * h * 4];
    let bar = if w == 0 { 0 } else { (index as usize * 4) % w };
    for (y, row) in data.chunks_exact_mut(w.max(1) * 4).enumerate() {
        let green = (y * 255 / h.max(1)) as u8;
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            if x >= bar && x < bar + 4 {
                px.copy_from_slice(&[255, 255, 255, 255]);
            } else {
                let red = (x * 255 / w.max(1)) as u8;
                px.copy_from_slice(&[96, green, red, 255]);
            }
        }
    }
    match PixelBuffer::new(size.width, size.height, PixelFormat::Bgra8, data) {
        Ok(buffer) => buffer,
        Err(_) => PixelBuffer::filled(size.width, size.height, PixelFormat::Bgra8, [0, 0, 0, 255]),
    }
}

fn sine_chunk(sample_rate: u32, channels: u16, first_frame: u64) -> AudioBuffer {
    let mut samples = Vec::with_capacity(AUDIO_CHUNK_FRAMES as usize * channels as usize);
    for i in 0..AUDIO_CHUNK_FRAMES as u64 {
        let t = (first_frame + i) as f64 / sample_rate as f64;
        let value = (t * TONE_HZ * std::f64::consts::TAU).sin() * i16::MAX as f64 * 0.25;
        for _ in 0..channels {
            samples.push(value as i16);
        }
    }
    AudioBuffer::new(sample_rate, channels, samples)
}

fn encode_photo(size: FrameSize, settings: &PhotoSettings) -> AltimeterResult<Photo> {
    let pattern = test_pattern(size, 0);
    let mut rgb = Vec::with_capacity(size.width as usize * size.height as usize * 3);
    for px in pattern.data().chunks_exact(4) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    let mut jpeg = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
        .encode(&rgb, size.width, size.height, image::ExtendedColorType::Rgb8)
        .map_err(|e| AltimeterError::capture(format!("JPEG encoding failed: {e}")))?;
    Ok(Photo {
        data: jpeg.into(),
        codec: PhotoCodec::Jpeg,
        size,
        orientation: settings.orientation,
        mirrored: settings.mirrored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_has_requested_size() {
        let frame = test_pattern(FrameSize::new(16, 8), 1);
        assert_eq!(frame.size(), FrameSize::new(16, 8));
        assert_eq!(frame.pixel(4, 0), Some([255, 255, 255, 255]));
        assert_eq!(frame.pixel(0, 0), Some([96, 0, 0, 255]));
    }

    #[test]
    fn sine_chunk_is_interleaved() {
        let chunk = sine_chunk(44_100, 2, 0);
        assert_eq!(chunk.frame_count(), AUDIO_CHUNK_FRAMES as usize);
        let s = chunk.samples();
        assert_eq!(s[2], s[3]);
    }
}
