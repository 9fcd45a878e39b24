//! Recording state machine.
//!
//! `Idle -> Writing -> Finalizing -> Idle`. Start and stop arrive from one
//! control context; frames arrive on the video and audio delivery threads.
//! The state lock is held only for readiness checks and the append itself.
//! Watermarks are composited outside it, so audio never waits on video
//! rendering. A frame that reaches a recording is either appended or
//! counted as dropped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use altimeter_common::clock::MediaTime;
use altimeter_common::config::RecordingDefaults;
use altimeter_common::error::AltimeterResult;
use altimeter_compositor::{Compositor, WatermarkSlot};
use altimeter_media_model::{AudioBuffer, PixelBuffer};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::writer::{MediaWriter, VideoTrack, WriterFactory, WriterSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    Idle,
    Writing,
    Finalizing,
}

/// Per-track sample counters for the current or last recording.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderStats {
    pub video_appended: u64,
    pub video_dropped: u64,
    pub audio_appended: u64,
    pub audio_dropped: u64,
}

impl RecorderStats {
    /// Drop rate across both tracks as a percentage.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.video_dropped + self.audio_dropped;
        let total = self.video_appended + self.audio_appended + dropped;
        if total == 0 {
            return 0.0;
        }
        dropped as f64 / total as f64 * 100.0
    }

    pub fn video_drop_rate(&self) -> f64 {
        let total = self.video_appended + self.video_dropped;
        if total == 0 {
            return 0.0;
        }
        self.video_dropped as f64 / total as f64 * 100.0
    }
}

#[derive(Default)]
struct Counters {
    video_appended: AtomicU64,
    video_dropped: AtomicU64,
    audio_appended: AtomicU64,
    audio_dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RecorderStats {
        RecorderStats {
            video_appended: self.video_appended.load(Ordering::Relaxed),
            video_dropped: self.video_dropped.load(Ordering::Relaxed),
            audio_appended: self.audio_appended.load(Ordering::Relaxed),
            audio_dropped: self.audio_dropped.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.video_appended,
            &self.video_dropped,
            &self.audio_appended,
            &self.audio_dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

enum WriterState {
    Idle,
    /// The writer is being created outside the lock.
    Starting,
    Writing {
        writer: Box<dyn MediaWriter>,
        settings: WriterSettings,
        /// Capture timestamp of the first video frame; time zero in the file.
        anchor: Option<MediaTime>,
        recording: u64,
    },
    Finalizing,
}

impl WriterState {
    fn kind(&self) -> RecordingState {
        match self {
            WriterState::Idle | WriterState::Starting => RecordingState::Idle,
            WriterState::Writing { .. } => RecordingState::Writing,
            WriterState::Finalizing => RecordingState::Finalizing,
        }
    }
}

/// Serializes live frames into one movie file per recording.
pub struct Recorder {
    factory: Arc<dyn WriterFactory>,
    defaults: RecordingDefaults,
    compositor: Compositor,
    watermarks: WatermarkSlot,
    state: Arc<Mutex<WriterState>>,
    counters: Arc<Counters>,
    recordings: AtomicU64,
}

impl Recorder {
    pub fn new(
        factory: Arc<dyn WriterFactory>,
        defaults: RecordingDefaults,
        watermarks: WatermarkSlot,
    ) -> Self {
        Self {
            factory,
            compositor: Compositor::new(defaults.frame_rate),
            defaults,
            watermarks,
            state: Arc::new(Mutex::new(WriterState::Idle)),
            counters: Arc::new(Counters::default()),
            recordings: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state.lock().kind()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Writing
    }

    pub fn stats(&self) -> RecorderStats {
        self.counters.snapshot()
    }

    pub fn watermarks(&self) -> &WatermarkSlot {
        &self.watermarks
    }

    /// Begin writing to `path`, replacing any file already there.
    ///
    /// Returns `Ok(false)` without touching anything if a recording is
    /// already starting, writing, or finalizing.
    pub fn start_recording(
        &self,
        path: &Path,
        track: impl Into<VideoTrack>,
    ) -> AltimeterResult<bool> {
        {
            let mut state = self.state.lock();
            if !matches!(*state, WriterState::Idle) {
                tracing::debug!(state = ?state.kind(), "start_recording ignored; recorder is busy");
                return Ok(false);
            }
            *state = WriterState::Starting;
        }

        let settings = WriterSettings::new(&self.defaults, track);
        let writer = match self.open_writer(path, &settings) {
            Ok(writer) => writer,
            Err(e) => {
                *self.state.lock() = WriterState::Idle;
                return Err(e);
            }
        };

        let recording = self.recordings.fetch_add(1, Ordering::Relaxed) + 1;
        let size = settings.frame_size;
        let orientation = settings.orientation;
        {
            let mut state = self.state.lock();
            self.counters.reset();
            *state = WriterState::Writing {
                writer,
                settings,
                anchor: None,
                recording,
            };
        }
        tracing::info!(path = %path.display(), %size, ?orientation, "Recording started");
        Ok(true)
    }

    fn open_writer(
        &self,
        path: &Path,
        settings: &WriterSettings,
    ) -> AltimeterResult<Box<dyn MediaWriter>> {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed previous recording"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.factory.create(path, settings)
    }

    /// Append a video frame, compositing the current watermarks first.
    pub fn write_video(&self, pts: MediaTime, buffer: &PixelBuffer) {
        let (recording, items) = {
            let mut state = self.state.lock();
            let WriterState::Writing {
                writer,
                settings,
                anchor,
                recording,
            } = &mut *state
            else {
                return;
            };

            if !settings.accepts(buffer) {
                Counters::bump(&self.counters.video_dropped);
                tracing::trace!(%pts, size = %buffer.size(), "Frame does not match the video track");
                return;
            }
            if anchor.is_none() {
                writer.start_session_at(pts);
                *anchor = Some(pts);
                tracing::debug!(%pts, "Session anchored on first video frame");
            }
            if !writer.is_video_ready() {
                Counters::bump(&self.counters.video_dropped);
                tracing::trace!(%pts, "Video track not ready; dropping frame");
                return;
            }
            (*recording, self.watermarks.get())
        };

        let composited = if items.is_empty() {
            None
        } else {
            Some(self.compositor.composite(buffer, &items))
        };
        let frame = composited.as_ref().unwrap_or(buffer);

        let mut state = self.state.lock();
        match &mut *state {
            WriterState::Writing {
                writer,
                recording: current,
                ..
            } if *current == recording => {
                writer.append_video(pts, frame);
                Counters::bump(&self.counters.video_appended);
            }
            // A newer recording owns the counters now.
            WriterState::Writing { .. } | WriterState::Starting => {}
            WriterState::Idle | WriterState::Finalizing => {
                Counters::bump(&self.counters.video_dropped);
                tracing::trace!(%pts, "Recording stopped while compositing; dropping frame");
            }
        }
    }

    /// Append audio if the session is anchored and the track has room.
    pub fn write_audio(&self, pts: MediaTime, buffer: &AudioBuffer) {
        let mut state = self.state.lock();
        let WriterState::Writing { writer, anchor, .. } = &mut *state else {
            return;
        };

        let anchored = anchor.map_or(false, |anchor| pts >= anchor);
        if !anchored || !writer.is_audio_ready() {
            Counters::bump(&self.counters.audio_dropped);
            tracing::trace!(%pts, anchored, "Dropping audio");
            return;
        }
        writer.append_audio(pts, buffer);
        Counters::bump(&self.counters.audio_appended);
    }

    /// Finish the current recording on a background thread, then call
    /// `callback` with the file path, or `None` if finalizing failed.
    ///
    /// When idle, `callback(None)` runs immediately and nothing changes. A
    /// stop while already finalizing is also answered with `None`.
    pub fn stop_recording<F>(&self, callback: F)
    where
        F: FnOnce(Option<PathBuf>) + Send + 'static,
    {
        let writer = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, WriterState::Finalizing) {
                WriterState::Writing { writer, .. } => writer,
                previous => {
                    *state = previous;
                    drop(state);
                    tracing::debug!("stop_recording ignored; nothing is being written");
                    callback(None);
                    return;
                }
            }
        };

        // The job is shared so it can still be finalized inline if the
        // thread cannot be spawned.
        let job = Arc::new(Mutex::new(Some((writer, callback))));
        let thread_job = Arc::clone(&job);
        let state = Arc::clone(&self.state);
        let counters = Arc::clone(&self.counters);
        let spawned = std::thread::Builder::new()
            .name("recorder-finalize".into())
            .spawn(move || {
                if let Some((writer, callback)) = thread_job.lock().take() {
                    finalize(writer, &state, &counters, callback);
                }
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "Failed to spawn finalize thread; finalizing inline");
            if let Some((writer, callback)) = job.lock().take() {
                finalize(writer, &self.state, &self.counters, callback);
            }
        }
    }
}

fn finalize<F>(
    writer: Box<dyn MediaWriter>,
    state: &Mutex<WriterState>,
    counters: &Counters,
    callback: F,
) where
    F: FnOnce(Option<PathBuf>),
{
    let result = writer.finish();
    let stats = counters.snapshot();
    *state.lock() = WriterState::Idle;
    match result {
        Ok(path) => {
            tracing::info!(
                path = %path.display(),
                video_frames = stats.video_appended,
                audio_chunks = stats.audio_appended,
                drop_rate = stats.drop_rate(),
                "Recording finalized"
            );
            callback(Some(path));
        }
        Err(e) => {
            tracing::warn!(error = %e, drop_rate = stats.drop_rate(), "Recording failed");
            callback(None);
        }
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
