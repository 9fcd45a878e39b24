//! Telemetry strings formatted into a text watermark.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::watermark::{TextWatermark, WatermarkFont};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Display strings supplied by the sensor side of the application.
///
/// Every field is optional; absent or blank fields are left out of the
/// watermark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub altitude: Option<String>,
    pub pressure: Option<String>,
    pub coordinate: Option<String>,
    pub location: Option<String>,
}

impl Telemetry {
    /// One line per present field, in altitude / pressure / coordinate /
    /// location order, followed by the capture timestamp.
    pub fn watermark_text(&self, captured_at: NaiveDateTime) -> String {
        let mut lines: Vec<&str> = [
            &self.altitude,
            &self.pressure,
            &self.coordinate,
            &self.location,
        ]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

        let stamp = captured_at.format(TIMESTAMP_FORMAT).to_string();
        lines.push(&stamp);
        lines.join("\n")
    }

    pub fn watermark_text_now(&self) -> String {
        self.watermark_text(chrono::Local::now().naive_local())
    }

    pub fn to_text_watermark(
        &self,
        captured_at: NaiveDateTime,
        font: WatermarkFont,
        size_px: f32,
        color: [u8; 4],
    ) -> TextWatermark {
        TextWatermark {
            text: self.watermark_text(captured_at),
            font,
            size_px,
            color,
        }
    }
}
