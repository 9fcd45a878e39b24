//! Source-over compositing of watermark items onto pixel buffers.

use std::sync::Arc;
use std::time::Instant;

use altimeter_common::clock::FrameBudget;
use altimeter_common::error::{AltimeterError, AltimeterResult};
use altimeter_media_model::{PixelBuffer, PixelFormat};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use rusttype::{point, Scale};

use crate::watermark::{ImageWatermark, TextWatermark, WatermarkContent, WatermarkItem};

/// Rendered overlays kept between frames.
const CACHE_CAPACITY: usize = 8;

/// Largest overlay edge, in pixels, the compositor will render.
const MAX_OVERLAY_EDGE: u32 = 8192;

/// Renders watermark items and blends them onto frames.
///
/// Compositing never fails: an item that cannot be rendered is skipped, and
/// if nothing could be applied the input buffer is returned as is.
pub struct Compositor {
    budget: FrameBudget,
    cache: Mutex<Vec<(WatermarkItem, Arc<RgbaImage>)>>,
}

impl Compositor {
    /// A compositor whose work should fit in one frame at `frame_rate`.
    pub fn new(frame_rate: u32) -> Self {
        Self {
            budget: FrameBudget::for_frame_rate(frame_rate),
            cache: Mutex::new(Vec::new()),
        }
    }

    pub fn budget(&self) -> FrameBudget {
        self.budget
    }

    /// Blend `items` onto a copy of `buffer`, in list order.
    ///
    /// The result has the same size and format as the input. With no items
    /// the input itself is returned, sharing its storage.
    pub fn composite(&self, buffer: &PixelBuffer, items: &[WatermarkItem]) -> PixelBuffer {
        if items.is_empty() {
            return buffer.clone();
        }

        let started = Instant::now();
        let mut data = buffer.data().to_vec();
        let mut applied = 0usize;

        for (index, item) in items.iter().enumerate() {
            match self.rendered(item) {
                Ok(overlay) => {
                    blend_over(
                        &mut data,
                        buffer.width(),
                        buffer.height(),
                        buffer.format(),
                        &overlay,
                        item.x,
                        item.y,
                    );
                    applied += 1;
                }
                Err(e) => {
                    tracing::warn!(item = index, error = %e, "Skipping watermark item");
                }
            }
        }

        if applied == 0 {
            return buffer.clone();
        }

        let result = match PixelBuffer::new(buffer.width(), buffer.height(), buffer.format(), data)
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Compositing failed; passing frame through");
                return buffer.clone();
            }
        };

        let elapsed = started.elapsed();
        if self.budget.is_exceeded_by(elapsed) {
            tracing::warn!(
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.budget.interval().as_secs_f64() * 1000.0,
                "Compositing exceeded the frame budget"
            );
        }
        result
    }

    fn rendered(&self, item: &WatermarkItem) -> AltimeterResult<Arc<RgbaImage>> {
        if let Some(hit) = self
            .cache
            .lock()
            .iter()
            .find(|(cached, _)| cached.renders_like(item))
            .map(|(_, overlay)| Arc::clone(overlay))
        {
            return Ok(hit);
        }

        let overlay = Arc::new(render_item(item)?);
        let mut cache = self.cache.lock();
        if cache.len() >= CACHE_CAPACITY {
            cache.remove(0);
        }
        cache.push((item.clone(), Arc::clone(&overlay)));
        Ok(overlay)
    }
}

/// Render an item to a straight-alpha RGBA bitmap.
pub fn render_item(item: &WatermarkItem) -> AltimeterResult<RgbaImage> {
    match &item.content {
        WatermarkContent::Text(text) => render_text(text),
        WatermarkContent::Image(image) => scale_image(image),
    }
}

fn render_text(text: &TextWatermark) -> AltimeterResult<RgbaImage> {
    if text.text.trim().is_empty() {
        return Err(AltimeterError::render("watermark text is empty"));
    }
    if !(text.size_px.is_finite() && text.size_px > 0.0) {
        return Err(AltimeterError::render(format!(
            "invalid text size {}",
            text.size_px
        )));
    }

    let font = text.font.font();
    let scale = Scale::uniform(text.size_px);
    let v_metrics = font.v_metrics(scale);
    let line_height = (v_metrics.ascent - v_metrics.descent + v_metrics.line_gap).ceil();

    let lines: Vec<&str> = text.text.lines().collect();
    let mut glyphs = Vec::new();
    let mut width = 0.0f32;
    for (row, line) in lines.iter().enumerate() {
        let baseline = v_metrics.ascent + row as f32 * line_height;
        let laid_out: Vec<_> = font.layout(line, scale, point(0.0, baseline)).collect();
        if let Some(last) = laid_out.last() {
            let right = last.position().x + last.unpositioned().h_metrics().advance_width;
            width = width.max(right);
        }
        glyphs.extend(laid_out);
    }

    let width = width.ceil() as u32;
    let height = (line_height * lines.len() as f32).ceil() as u32;
    if width == 0 || height == 0 {
        return Err(AltimeterError::render("watermark text has no visible glyphs"));
    }
    if width > MAX_OVERLAY_EDGE || height > MAX_OVERLAY_EDGE {
        return Err(AltimeterError::render(format!(
            "text overlay {width}x{height} is too large"
        )));
    }

    let [r, g, b, a] = text.color;
    let mut bitmap = RgbaImage::new(width, height);
    for glyph in &glyphs {
        let Some(bounds) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let x = gx as i32 + bounds.min.x;
            let y = gy as i32 + bounds.min.y;
            if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                return;
            }
            let alpha = (coverage.clamp(0.0, 1.0) * a as f32).round() as u8;
            let px = bitmap.get_pixel_mut(x as u32, y as u32);
            if alpha > px[3] {
                *px = Rgba([r, g, b, alpha]);
            }
        });
    }
    Ok(bitmap)
}

fn scale_image(image: &ImageWatermark) -> AltimeterResult<RgbaImage> {
    if !(image.scale.is_finite() && image.scale > 0.0) {
        return Err(AltimeterError::render(format!(
            "invalid image scale {}",
            image.scale
        )));
    }
    let (w, h) = image.image.dimensions();
    if w == 0 || h == 0 {
        return Err(AltimeterError::render("watermark image is empty"));
    }
    if (image.scale - 1.0).abs() < f32::EPSILON {
        return Ok((*image.image).clone());
    }

    let target_w = (w as f32 * image.scale).round();
    let target_h = (h as f32 * image.scale).round();
    if target_w < 1.0 || target_h < 1.0 {
        return Err(AltimeterError::render("scaled watermark image is empty"));
    }
    if target_w > MAX_OVERLAY_EDGE as f32 || target_h > MAX_OVERLAY_EDGE as f32 {
        return Err(AltimeterError::render(format!(
            "scaled watermark {target_w}x{target_h} is too large"
        )));
    }
    Ok(image::imageops::resize(
        &*image.image,
        target_w as u32,
        target_h as u32,
        FilterType::Triangle,
    ))
}

/// Source-over blend of a straight-alpha RGBA overlay onto packed pixels,
/// with the overlay's top-left corner at `(left, top)`. Out-of-frame parts
/// are clipped.
pub fn blend_over(
    dst: &mut [u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    overlay: &RgbaImage,
    left: i32,
    top: i32,
) {
    let (ow, oh) = overlay.dimensions();
    let x0 = left.max(0) as i64;
    let y0 = top.max(0) as i64;
    let x1 = (left as i64 + ow as i64).min(width as i64);
    let y1 = (top as i64 + oh as i64).min(height as i64);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let stride = width as usize * format.bytes_per_pixel();
    for y in y0..y1 {
        let oy = (y - top as i64) as u32;
        for x in x0..x1 {
            let ox = (x - left as i64) as u32;
            let Rgba([sr, sg, sb, sa]) = *overlay.get_pixel(ox, oy);
            if sa == 0 {
                continue;
            }
            let offset = y as usize * stride + x as usize * 4;
            let Some(px) = dst.get_mut(offset..offset + 4) else {
                continue;
            };
            let src = match format {
                PixelFormat::Rgba8 => [sr, sg, sb],
                PixelFormat::Bgra8 => [sb, sg, sr],
            };
            let sa16 = sa as u16;
            let inv = 255 - sa16;
            for c in 0..3 {
                px[c] = ((src[c] as u16 * sa16 + px[c] as u16 * inv + 127) / 255) as u8;
            }
            px[3] = (sa16 + (px[3] as u16 * inv + 127) / 255).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_overlay_replaces_pixels_in_buffer_order() {
        let mut data = vec![0u8; 2 * 1 * 4];
        let overlay = RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255]));
        blend_over(&mut data, 2, 1, PixelFormat::Bgra8, &overlay, 1, 0);
        assert_eq!(&data[4..8], &[30, 20, 10, 255]);
        assert_eq!(&data[0..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn half_alpha_mixes_evenly() {
        let mut data = vec![0, 0, 0, 255];
        let overlay = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 128]));
        blend_over(&mut data, 1, 1, PixelFormat::Rgba8, &overlay, 0, 0);
        assert_eq!(data, vec![128, 128, 128, 255]);
    }

    #[test]
    fn offscreen_overlay_is_clipped() {
        let mut data = vec![0u8; 4 * 4 * 4];
        let overlay = RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255]));
        blend_over(&mut data, 4, 4, PixelFormat::Rgba8, &overlay, -2, 3);
        let painted: Vec<usize> = data
            .chunks_exact(4)
            .enumerate()
            .filter(|(_, px)| px[0] == 255)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(painted, vec![12]);

        let mut untouched = vec![7u8; 4];
        blend_over(&mut untouched, 1, 1, PixelFormat::Rgba8, &overlay, 5, 5);
        assert_eq!(untouched, vec![7u8; 4]);
    }

    #[test]
    fn invalid_scale_is_a_render_error() {
        let item = WatermarkItem::image(Arc::new(RgbaImage::new(4, 4)), 0.0, 0, 0);
        assert!(render_item(&item).is_err());
        let item = WatermarkItem::image(Arc::new(RgbaImage::new(4, 4)), f32::NAN, 0, 0);
        assert!(render_item(&item).is_err());
    }

    #[test]
    fn image_is_scaled() {
        let item = WatermarkItem::image(Arc::new(RgbaImage::new(4, 2)), 2.0, 0, 0);
        assert_eq!(render_item(&item).unwrap().dimensions(), (8, 4));
    }
}
