//! Capture a still into a directory.

use std::path::PathBuf;
use std::sync::Arc;

use altimeter_common::config::AppConfig;
use altimeter_common::error::AltimeterResult;
use altimeter_media_model::{Coordinate, FrameSize, Photo};
use altimeter_orchestrator::{CameraController, PhotoLibrary};
use altimeter_recorder::GstWriterFactory;

/// Saves photos as files, with a JSON sidecar describing each one.
pub struct DirectoryPhotoLibrary {
    dir: PathBuf,
}

impl DirectoryPhotoLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn stem(&self) -> String {
        format!(
            "photo-{}",
            chrono::Local::now().format("%Y%m%d-%H%M%S%.3f")
        )
    }
}

impl PhotoLibrary for DirectoryPhotoLibrary {
    fn save_image(&self, photo: &Photo, coordinate: Option<Coordinate>) -> AltimeterResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let stem = self.stem();
        let image_path = self
            .dir
            .join(format!("{stem}.{}", photo.codec.file_extension()));
        std::fs::write(&image_path, &photo.data)?;

        let sidecar = serde_json::json!({
            "file": image_path.file_name().map(|n| n.to_string_lossy().into_owned()),
            "width": photo.size.width,
            "height": photo.size.height,
            "orientation": format!("{:?}", photo.orientation),
            "mirrored": photo.mirrored,
            "coordinate": coordinate,
        });
        std::fs::write(
            self.dir.join(format!("{stem}.json")),
            serde_json::to_string_pretty(&sidecar)?,
        )?;

        tracing::info!(path = %image_path.display(), bytes = photo.data.len(), "Photo saved");
        Ok(())
    }
}

pub async fn run(
    config: AppConfig,
    output: PathBuf,
    location: Option<(f64, f64)>,
) -> anyhow::Result<()> {
    let preset = FrameSize::new(config.capture.video_width, config.capture.video_height);
    let session = super::synthetic_session(&config, preset)?;
    let controller = CameraController::new(session, Arc::new(GstWriterFactory), &config);

    controller.start_session().await?;
    let photo = controller.take_photo().await?;
    println!(
        "Captured {} photo: {} ({} bytes)",
        photo.codec.file_extension(),
        photo.size,
        photo.data.len()
    );

    let coordinate = location.map(|(latitude, longitude)| Coordinate {
        latitude,
        longitude,
    });
    let library = DirectoryPhotoLibrary::new(&output);
    controller.save_photo(&library, coordinate)?;
    controller.stop_session().await?;

    println!("Saved to: {}", output.display());
    Ok(())
}
