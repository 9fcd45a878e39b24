//! Watermark a still image.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use altimeter_compositor::{Compositor, WatermarkItem};
use altimeter_media_model::{PixelBuffer, PixelFormat};
use image::RgbaImage;

use crate::TelemetryArgs;

pub fn run(
    input: PathBuf,
    output: PathBuf,
    overlay: Option<PathBuf>,
    scale: f32,
    x: i32,
    y: i32,
    telemetry: TelemetryArgs,
) -> anyhow::Result<()> {
    let base = image::open(&input)
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", input.display()))?
        .to_rgba8();
    let (width, height) = base.dimensions();

    let mut items = Vec::new();
    if let Some(path) = &overlay {
        items.push(WatermarkItem::image(Arc::new(load_rgba(path)?), scale, x, y));
    }
    if let Some(text) = telemetry.text_watermark(chrono::Local::now().naive_local())? {
        let lines = text.text.lines().count();
        let top = super::bottom_anchored_y(height, lines, text.size_px);
        items.push(WatermarkItem::text(text, x, top));
    }
    if items.is_empty() {
        anyhow::bail!("Nothing to composite: pass --image or --font with telemetry");
    }

    let frame = PixelBuffer::new(width, height, PixelFormat::Rgba8, base.into_raw())?;
    let compositor = Compositor::new(1);
    let marked = compositor.composite(&frame, &items);

    let result = RgbaImage::from_raw(width, height, marked.data().to_vec())
        .ok_or_else(|| anyhow::anyhow!("Composited buffer has the wrong size"))?;
    result
        .save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", output.display()))?;

    println!(
        "Wrote {} ({}x{}, {} watermark{})",
        output.display(),
        width,
        height,
        items.len(),
        if items.len() == 1 { "" } else { "s" }
    );
    Ok(())
}

pub fn load_rgba(path: &Path) -> anyhow::Result<RgbaImage> {
    Ok(image::open(path)
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?
        .to_rgba8())
}
