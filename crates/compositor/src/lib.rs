//! Altimeter Compositor
//!
//! Draws text and image watermarks onto video frames on the delivery
//! thread. The current watermark list lives in a [`WatermarkSlot`] that the
//! control side replaces wholesale; the video thread takes a snapshot per
//! frame and hands it to [`Compositor::composite`].

pub mod compositor;
pub mod telemetry;
pub mod watermark;

pub use compositor::{blend_over, render_item, Compositor};
pub use telemetry::Telemetry;
pub use watermark::{
    ImageWatermark, TextWatermark, WatermarkContent, WatermarkFont, WatermarkItem, WatermarkSlot,
};
