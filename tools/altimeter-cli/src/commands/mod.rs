pub mod check;
pub mod composite;
pub mod orientation;
pub mod photo;
pub mod record;

use std::sync::Arc;

use altimeter_capture_engine::{
    CaptureSessionManager, SessionSettings, StaticDeviceRegistry, StaticPermissionBroker,
    SyntheticBackend,
};
use altimeter_common::config::AppConfig;
use altimeter_compositor::{Telemetry, TextWatermark, WatermarkFont};
use altimeter_media_model::{Device, DeviceCapabilities, DevicePosition, FrameSize};
use chrono::NaiveDateTime;

use crate::TelemetryArgs;

const WATERMARK_COLOR: [u8; 4] = [255, 255, 255, 230];

/// A capture session over the synthetic camera pair and microphone.
pub fn synthetic_session(
    config: &AppConfig,
    preset: FrameSize,
) -> anyhow::Result<CaptureSessionManager> {
    let back = Device::camera("synthetic-back", "Synthetic Back Camera", DevicePosition::Back, preset)
        .with_capabilities(DeviceCapabilities {
            max_zoom_factor: 8.0,
            has_flash: true,
            focus_point_of_interest: true,
            exposure_point_of_interest: true,
        });
    let front = Device::camera(
        "synthetic-front",
        "Synthetic Front Camera",
        DevicePosition::Front,
        preset,
    );
    let mic = Device::microphone("synthetic-mic", "Synthetic Microphone");

    let backend = SyntheticBackend::new(config.recording.frame_rate).with_audio_format(
        config.recording.audio_sample_rate,
        u16::try_from(config.recording.audio_channels).unwrap_or(2),
    );
    let session = CaptureSessionManager::new(
        Box::new(backend),
        Arc::new(StaticDeviceRegistry::new(vec![back, front, mic])),
        Arc::new(StaticPermissionBroker::granted()),
        SessionSettings {
            video_preset: preset,
        },
    )?;
    Ok(session)
}

impl TelemetryArgs {
    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            altitude: self.altitude.clone(),
            pressure: self.pressure.clone(),
            coordinate: self.coordinate.clone(),
            location: self.location.clone(),
        }
    }

    /// The telemetry watermark, or `None` when no font was given.
    pub fn text_watermark(
        &self,
        captured_at: NaiveDateTime,
    ) -> anyhow::Result<Option<TextWatermark>> {
        let Some(path) = &self.font else {
            if self.telemetry() != Telemetry::default() {
                tracing::warn!("Telemetry given without --font; text watermark skipped");
            }
            return Ok(None);
        };
        let font = WatermarkFont::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load font {}: {e}", path.display()))?;
        Ok(Some(self.telemetry().to_text_watermark(
            captured_at,
            font,
            self.font_size,
            WATERMARK_COLOR,
        )))
    }
}

/// Top edge that keeps `lines` of text of `size_px` above the bottom margin.
pub fn bottom_anchored_y(frame_height: u32, lines: usize, size_px: f32) -> i32 {
    let block = (lines as f32 * size_px * 1.25).ceil() as i32;
    (frame_height as i32 - block - 16).max(0)
}
