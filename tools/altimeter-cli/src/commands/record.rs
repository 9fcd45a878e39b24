//! Record a watermarked movie from the synthetic camera.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use altimeter_common::config::AppConfig;
use altimeter_compositor::WatermarkItem;
use altimeter_media_model::{CaptureMode, FrameSize};
use altimeter_orchestrator::{CameraController, CameraEvent};
use altimeter_recorder::GstWriterFactory;

use crate::TelemetryArgs;

const MARGIN: i32 = 16;

pub async fn run(
    config: AppConfig,
    duration: f64,
    output: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    watermark: Option<PathBuf>,
    telemetry: TelemetryArgs,
) -> anyhow::Result<()> {
    let length = Duration::try_from_secs_f64(duration)
        .ok()
        .filter(|length| !length.is_zero())
        .ok_or_else(|| anyhow::anyhow!("Duration must be a positive number of seconds"))?;
    let preset = FrameSize::new(
        width.unwrap_or(config.capture.video_width),
        height.unwrap_or(config.capture.video_height),
    );
    if preset.is_empty() {
        anyhow::bail!("Video size {preset} is empty");
    }

    let session = super::synthetic_session(&config, preset)?;
    let controller = CameraController::new(session, Arc::new(GstWriterFactory), &config);

    let logo = match &watermark {
        Some(path) => Some(WatermarkItem::image(
            Arc::new(super::composite::load_rgba(path)?),
            1.0,
            MARGIN,
            MARGIN,
        )),
        None => None,
    };
    let text = telemetry.text_watermark(chrono::Local::now().naive_local())?;
    let stamp = |text_item: Option<WatermarkItem>| {
        let items: Vec<WatermarkItem> = logo.iter().cloned().chain(text_item).collect();
        controller.set_watermarks(items);
    };
    let text_item = |at: chrono::NaiveDateTime| {
        text.as_ref().map(|base| {
            let mut current = base.clone();
            current.text = telemetry.telemetry().watermark_text(at);
            let top = super::bottom_anchored_y(
                preset.height,
                current.text.lines().count(),
                current.size_px,
            );
            WatermarkItem::text(current, MARGIN, top)
        })
    };
    stamp(text_item(chrono::Local::now().naive_local()));

    println!("Recording {duration:.1}s at {preset} @ {}fps", config.recording.frame_rate);
    println!("  Output: {}", controller.output_path().display());
    println!("  Watermarks: {}", controller.watermarks().get().len());
    println!();

    let mut events = controller.subscribe_events();
    controller.set_mode(CaptureMode::Video).await?;
    controller.start_session().await?;
    if !controller.start_recording()? {
        anyhow::bail!("A recording is already in progress");
    }
    if let Ok(CameraEvent::DidStartRecording) = events.recv().await {
        tracing::info!("Recording started");
    }

    println!("Press Ctrl+C to stop early...");
    let deadline = tokio::time::sleep(length);
    tokio::pin!(deadline);
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.tick().await;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted");
                break;
            }
            _ = tick.tick() => {
                if text.is_some() {
                    stamp(text_item(chrono::Local::now().naive_local()));
                }
            }
        }
    }

    let written = controller.stop_recording().await;
    controller.stop_session().await?;

    let stats = controller.recorder_stats();
    println!();
    println!(
        "Frames: {} video ({} dropped), {} audio ({} dropped)",
        stats.video_appended, stats.video_dropped, stats.audio_appended, stats.audio_dropped
    );

    let Some(path) = written else {
        anyhow::bail!("Recording failed; see the log for the writer error");
    };
    match output {
        Some(destination) => {
            std::fs::copy(&path, &destination).map_err(|e| {
                anyhow::anyhow!("Failed to copy movie to {}: {e}", destination.display())
            })?;
            println!("Recording saved to: {}", destination.display());
        }
        None => println!("Recording saved to: {}", path.display()),
    }
    Ok(())
}
