//! Watermark items and the shared slot they are published through.

use std::sync::Arc;

use altimeter_common::error::{AltimeterError, AltimeterResult};
use image::RgbaImage;
use parking_lot::Mutex;

/// A parsed TrueType/OpenType font.
#[derive(Clone)]
pub struct WatermarkFont(Arc<rusttype::Font<'static>>);

impl WatermarkFont {
    pub fn from_bytes(data: Vec<u8>) -> AltimeterResult<Self> {
        rusttype::Font::try_from_vec(data)
            .map(|font| Self(Arc::new(font)))
            .ok_or_else(|| AltimeterError::render("font data could not be parsed"))
    }

    pub fn from_file(path: &std::path::Path) -> AltimeterResult<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    pub(crate) fn font(&self) -> &rusttype::Font<'static> {
        &self.0
    }

    fn same_as(&self, other: &WatermarkFont) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for WatermarkFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WatermarkFont({} glyphs)", self.0.glyph_count())
    }
}

/// Multi-line text drawn in a single color.
#[derive(Debug, Clone)]
pub struct TextWatermark {
    pub text: String,
    pub font: WatermarkFont,
    /// Glyph height in pixels.
    pub size_px: f32,
    /// Straight (non-premultiplied) RGBA.
    pub color: [u8; 4],
}

/// A bitmap drawn at `scale` times its natural size.
#[derive(Debug, Clone)]
pub struct ImageWatermark {
    pub image: Arc<RgbaImage>,
    pub scale: f32,
}

#[derive(Debug, Clone)]
pub enum WatermarkContent {
    Text(TextWatermark),
    Image(ImageWatermark),
}

/// One overlay and the buffer pixel its top-left corner lands on.
///
/// Positions may lie partly or wholly outside the frame; the overlay is
/// clipped.
#[derive(Debug, Clone)]
pub struct WatermarkItem {
    pub content: WatermarkContent,
    pub x: i32,
    pub y: i32,
}

impl WatermarkItem {
    pub fn text(text: TextWatermark, x: i32, y: i32) -> Self {
        Self {
            content: WatermarkContent::Text(text),
            x,
            y,
        }
    }

    pub fn image(image: Arc<RgbaImage>, scale: f32, x: i32, y: i32) -> Self {
        Self {
            content: WatermarkContent::Image(ImageWatermark { image, scale }),
            x,
            y,
        }
    }

    /// Whether two items render to the same bitmap, ignoring position.
    pub(crate) fn renders_like(&self, other: &WatermarkItem) -> bool {
        match (&self.content, &other.content) {
            (WatermarkContent::Text(a), WatermarkContent::Text(b)) => {
                a.text == b.text
                    && a.size_px == b.size_px
                    && a.color == b.color
                    && a.font.same_as(&b.font)
            }
            (WatermarkContent::Image(a), WatermarkContent::Image(b)) => {
                Arc::ptr_eq(&a.image, &b.image) && a.scale == b.scale
            }
            _ => false,
        }
    }
}

/// The current watermark list, shared between the control context that
/// sets it and the video delivery thread that reads it on every frame.
///
/// Access is guarded by a mutex; readers get a snapshot and never hold the
/// lock while compositing.
#[derive(Clone)]
pub struct WatermarkSlot {
    items: Arc<Mutex<Arc<[WatermarkItem]>>>,
}

impl WatermarkSlot {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Arc::from(Vec::new()))),
        }
    }

    pub fn get(&self) -> Arc<[WatermarkItem]> {
        Arc::clone(&self.items.lock())
    }

    pub fn set(&self, items: Vec<WatermarkItem>) {
        *self.items.lock() = items.into();
    }

    pub fn clear(&self) {
        *self.items.lock() = Arc::from(Vec::new());
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl Default for WatermarkSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WatermarkSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WatermarkSlot({} items)", self.items.lock().len())
    }
}
