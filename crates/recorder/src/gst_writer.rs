//! GStreamer-backed QuickTime writer.
//!
//! Frames are pushed into two live `appsrc` elements feeding an H.264 and
//! an AAC encoder, muxed by `qtmux`. The connection's rotation is written
//! as an `image-orientation` tag on the muxer.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use altimeter_common::clock::MediaTime;
use altimeter_common::error::{AltimeterError, AltimeterResult};
use altimeter_media_model::{AudioBuffer, PixelBuffer};
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;

use crate::writer::{MediaWriter, WriterFactory, WriterSettings};

/// AAC encoders in order of preference.
pub const AAC_ENCODERS: &[&str] = &["fdkaacenc", "avenc_aac", "voaacenc", "faac"];

/// Elements every recording pipeline needs besides an AAC encoder.
pub const REQUIRED_ELEMENTS: &[&str] = &[
    "appsrc",
    "queue",
    "videoconvert",
    "x264enc",
    "h264parse",
    "audioconvert",
    "audioresample",
    "aacparse",
    "qtmux",
    "filesink",
];

const FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_gstreamer() -> AltimeterResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(AltimeterError::writer(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// First installed AAC encoder from [`AAC_ENCODERS`].
pub fn available_aac_encoder() -> AltimeterResult<Option<&'static str>> {
    init_gstreamer()?;
    Ok(AAC_ENCODERS
        .iter()
        .copied()
        .find(|name| gst::ElementFactory::find(name).is_some()))
}

/// Required elements that are not installed.
pub fn missing_elements() -> AltimeterResult<Vec<&'static str>> {
    init_gstreamer()?;
    Ok(REQUIRED_ELEMENTS
        .iter()
        .copied()
        .filter(|name| gst::ElementFactory::find(name).is_none())
        .collect())
}

/// Builds [`GstMediaWriter`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct GstWriterFactory;

impl WriterFactory for GstWriterFactory {
    fn create(
        &self,
        path: &Path,
        settings: &WriterSettings,
    ) -> AltimeterResult<Box<dyn MediaWriter>> {
        Ok(Box::new(GstMediaWriter::create(path, settings)?))
    }
}

#[derive(Debug, Clone, Copy)]
enum Track {
    Video,
    Audio,
}

pub struct GstMediaWriter {
    pipeline: gst::Pipeline,
    video: gst_app::AppSrc,
    audio: gst_app::AppSrc,
    path: PathBuf,
    settings: WriterSettings,
    anchor: MediaTime,
    error: Option<String>,
}

impl GstMediaWriter {
    /// Build the pipeline and set it playing. The file is created here.
    pub fn create(path: &Path, settings: &WriterSettings) -> AltimeterResult<Self> {
        init_gstreamer()?;

        if !settings.video_codec.eq_ignore_ascii_case("h264") {
            return Err(AltimeterError::unsupported(format!(
                "video codec {:?}",
                settings.video_codec
            )));
        }
        if settings.frame_size.is_empty() {
            return Err(AltimeterError::writer("video track needs a non-empty frame size"));
        }
        let aac = available_aac_encoder()?
            .ok_or_else(|| AltimeterError::writer("No AAC encoder element is installed"))?;

        let launch = launch_description(path, settings, aac);
        tracing::debug!(%launch, "Building writer pipeline");

        let element = gst::parse::launch(&launch)
            .map_err(|e| AltimeterError::writer(format!("Failed to build pipeline: {e}")))?;
        let pipeline = element
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| AltimeterError::writer("Launch string did not produce a pipeline"))?;

        let video = app_source(&pipeline, "video")?;
        let video_caps = gst::Caps::builder("video/x-raw")
            .field("format", settings.pixel_format.caps_name())
            .field("width", settings.frame_size.width as i32)
            .field("height", settings.frame_size.height as i32)
            .field("framerate", gst::Fraction::new(settings.frame_rate as i32, 1))
            .build();
        video.set_caps(Some(&video_caps));
        video.set_max_bytes(settings.video_queue_bytes);

        let audio = app_source(&pipeline, "audio")?;
        let audio_caps = gst::Caps::builder("audio/x-raw")
            .field("format", "S16LE")
            .field("layout", "interleaved")
            .field("rate", settings.audio_sample_rate as i32)
            .field("channels", settings.audio_channels as i32)
            .build();
        audio.set_caps(Some(&audio_caps));
        audio.set_max_bytes(settings.audio_queue_bytes);

        for src in [&video, &audio] {
            src.set_format(gst::Format::Time);
            src.set_is_live(true);
        }

        let orientation = image_orientation(settings);
        tag_orientation(&pipeline, orientation)?;

        // Live sources do not preroll, so no state wait here.
        pipeline.set_state(gst::State::Playing).map_err(|e| {
            let _ = pipeline.set_state(gst::State::Null);
            AltimeterError::writer(format!("Failed to start writer pipeline: {e:?}"))
        })?;

        tracing::info!(
            path = %path.display(),
            size = %settings.frame_size,
            fps = settings.frame_rate,
            orientation,
            audio_encoder = aac,
            "Writer started"
        );

        Ok(Self {
            pipeline,
            video,
            audio,
            path: path.to_path_buf(),
            settings: settings.clone(),
            anchor: MediaTime::ZERO,
            error: None,
        })
    }

    /// `image-orientation` tag currently set on the muxer.
    pub fn orientation_tag(&self) -> Option<String> {
        let setter = self
            .pipeline
            .by_name("mux")?
            .dynamic_cast::<gst::TagSetter>()
            .ok()?;
        let tags = setter.tag_list()?;
        let value = tags.get::<gst::tags::ImageOrientation>()?;
        Some(value.get().to_string())
    }

    fn ready(&self, src: &gst_app::AppSrc) -> bool {
        self.error.is_none() && src.current_level_bytes() < src.max_bytes()
    }

    fn push(&mut self, track: Track, pts: MediaTime, duration_ns: u64, data: Vec<u8>) {
        let mut buffer = gst::Buffer::from_slice(data);
        {
            let buffer = buffer.make_mut();
            buffer.set_pts(gst::ClockTime::from_nseconds(
                pts.saturating_sub(self.anchor).as_nanos(),
            ));
            buffer.set_duration(gst::ClockTime::from_nseconds(duration_ns));
        }

        let pushed = match track {
            Track::Video => self.video.push_buffer(buffer),
            Track::Audio => self.audio.push_buffer(buffer),
        };
        if let Err(e) = pushed {
            self.record_error(format!("{track:?} push failed: {e:?}"));
        }
        self.poll_bus();
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(e) = msg.view() {
                self.record_error(e.error().to_string());
            }
        }
    }

    fn record_error(&mut self, message: String) {
        if self.error.is_none() {
            tracing::warn!(path = %self.path.display(), error = %message, "Writer failed");
            self.error = Some(message);
        }
    }

    /// Wait for EOS to reach the muxer so the movie header gets written.
    fn drain(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        let start = std::time::Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= FINALIZE_TIMEOUT {
                self.record_error("finalize timed out".to_string());
                break;
            }
            let remaining = FINALIZE_TIMEOUT - elapsed;
            match bus.timed_pop(gst::ClockTime::from_nseconds(remaining.as_nanos() as u64)) {
                Some(msg) => match msg.view() {
                    gst::MessageView::Eos(_) => {
                        tracing::debug!(path = %self.path.display(), "EOS received; writer drained");
                        break;
                    }
                    gst::MessageView::Error(e) => {
                        self.record_error(e.error().to_string());
                        break;
                    }
                    _ => {}
                },
                None => {
                    self.record_error("finalize timed out".to_string());
                    break;
                }
            }
        }
    }
}

impl MediaWriter for GstMediaWriter {
    fn start_session_at(&mut self, anchor: MediaTime) {
        self.anchor = anchor;
    }

    fn is_video_ready(&self) -> bool {
        self.ready(&self.video)
    }

    fn append_video(&mut self, pts: MediaTime, buffer: &PixelBuffer) {
        if !self.settings.accepts(buffer) {
            tracing::trace!(size = %buffer.size(), "Dropping frame that does not match the track");
            return;
        }
        let duration = self.settings.frame_duration_ns();
        self.push(Track::Video, pts, duration, buffer.data().to_vec());
    }

    fn is_audio_ready(&self) -> bool {
        self.ready(&self.audio)
    }

    fn append_audio(&mut self, pts: MediaTime, buffer: &AudioBuffer) {
        let duration = buffer.duration().as_nanos();
        self.push(Track::Audio, pts, duration, buffer.to_le_bytes());
    }

    fn finish(mut self: Box<Self>) -> AltimeterResult<PathBuf> {
        let video_eos = self.video.end_of_stream();
        let audio_eos = self.audio.end_of_stream();
        if video_eos.is_err() || audio_eos.is_err() {
            tracing::warn!(path = %self.path.display(), "Failed to end a track; output may be truncated");
        }
        self.drain();

        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            self.record_error(format!("Failed to stop writer pipeline: {e:?}"));
        }

        if let Some(message) = self.error.take() {
            return Err(AltimeterError::writer(message));
        }
        let written = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(AltimeterError::writer(format!(
                "{} is empty after finalize",
                self.path.display()
            )));
        }
        tracing::info!(path = %self.path.display(), bytes = written, "Writer finalized");
        Ok(self.path.clone())
    }
}

fn app_source(pipeline: &gst::Pipeline, name: &str) -> AltimeterResult<gst_app::AppSrc> {
    pipeline
        .by_name(name)
        .and_then(|element| element.dynamic_cast::<gst_app::AppSrc>().ok())
        .ok_or_else(|| AltimeterError::writer(format!("Pipeline has no {name} appsrc")))
}

/// `image-orientation` tag value for the recorded track.
pub fn image_orientation(settings: &WriterSettings) -> &'static str {
    match (settings.mirrored, settings.orientation.rotation_degrees()) {
        (false, 0) => "rotate-0",
        (false, 90) => "rotate-90",
        (false, 180) => "rotate-180",
        (false, _) => "rotate-270",
        (true, 0) => "flip-rotate-0",
        (true, 90) => "flip-rotate-90",
        (true, 180) => "flip-rotate-180",
        (true, _) => "flip-rotate-270",
    }
}

fn tag_orientation(pipeline: &gst::Pipeline, orientation: &str) -> AltimeterResult<()> {
    let setter = pipeline
        .by_name("mux")
        .and_then(|element| element.dynamic_cast::<gst::TagSetter>().ok())
        .ok_or_else(|| AltimeterError::writer("Pipeline muxer does not accept tags"))?;
    setter.add_tag::<gst::tags::ImageOrientation>(&orientation, gst::TagMergeMode::Replace);
    Ok(())
}

fn launch_description(path: &Path, settings: &WriterSettings, aac: &str) -> String {
    let path = escape_path(path);
    let keyint = settings.frame_rate.saturating_mul(2).max(2);
    let bitrate = settings.audio_bitrate;
    format!(
        "appsrc name=video ! queue ! videoconvert ! x264enc tune=zerolatency speed-preset=veryfast key-int-max={keyint} ! h264parse ! queue ! mux. \
         appsrc name=audio ! queue ! audioconvert ! audioresample ! {aac} bitrate={bitrate} ! aacparse ! queue ! mux. \
         qtmux name=mux ! filesink location=\"{path}\""
    )
}

fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use altimeter_common::config::RecordingDefaults;
    use altimeter_media_model::{FrameSize, VideoOrientation};

    use crate::writer::VideoTrack;

    fn oriented(orientation: VideoOrientation, mirrored: bool) -> WriterSettings {
        let track = VideoTrack::new(FrameSize::new(1280, 720)).oriented(orientation, mirrored);
        WriterSettings::new(&RecordingDefaults::default(), track)
    }

    #[test]
    fn launch_uses_quicktime_mux_and_selected_encoder() {
        let settings = WriterSettings::new(&RecordingDefaults::default(), FrameSize::new(1920, 1080));
        let launch = launch_description(Path::new("/tmp/out.mov"), &settings, "avenc_aac");
        assert!(launch.contains("avenc_aac bitrate=128000"));
        assert!(launch.contains("key-int-max=60"));
        assert!(launch.contains("qtmux name=mux ! filesink location=\"/tmp/out.mov\""));
    }

    #[test]
    fn orientation_tag_follows_the_connection() {
        assert_eq!(image_orientation(&oriented(VideoOrientation::Portrait, false)), "rotate-90");
        assert_eq!(image_orientation(&oriented(VideoOrientation::LandscapeRight, false)), "rotate-0");
        assert_eq!(image_orientation(&oriented(VideoOrientation::LandscapeLeft, false)), "rotate-180");
        assert_eq!(
            image_orientation(&oriented(VideoOrientation::PortraitUpsideDown, false)),
            "rotate-270"
        );
        assert_eq!(image_orientation(&oriented(VideoOrientation::LandscapeRight, true)), "flip-rotate-0");
        assert_eq!(image_orientation(&oriented(VideoOrientation::Portrait, true)), "flip-rotate-90");
    }

    #[test]
    fn quotes_in_paths_are_escaped() {
        assert_eq!(escape_path(Path::new("/tmp/a\"b.mov")), "/tmp/a\\\"b.mov");
    }
}
