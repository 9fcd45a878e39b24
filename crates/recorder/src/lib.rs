//! Altimeter Recorder
//!
//! Muxes live camera frames and microphone audio into a QuickTime movie.
//! The [`Recorder`] owns the recording state machine and the per-frame
//! drop policy; the container itself is produced by a [`MediaWriter`],
//! normally the GStreamer-backed [`GstMediaWriter`].

pub mod gst_writer;
pub mod recorder;
pub mod writer;

pub use gst_writer::{
    available_aac_encoder, image_orientation, missing_elements, GstMediaWriter, GstWriterFactory,
};
pub use recorder::{Recorder, RecorderStats, RecordingState};
pub use writer::{MediaWriter, VideoTrack, WriterFactory, WriterSettings};
