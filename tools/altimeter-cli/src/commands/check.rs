//! Check that recording can run on this machine.

use altimeter_common::config::config_file_path;
use altimeter_recorder::{available_aac_encoder, missing_elements};

pub fn run() -> anyhow::Result<()> {
    println!("Altimeter System Check");
    println!("{}", "=".repeat(50));

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[OK] Config: defaults ({} not found)", config_path.display());
    }

    let missing = match missing_elements() {
        Ok(missing) => missing,
        Err(e) => {
            println!("[FAIL] GStreamer: {e}");
            return Ok(());
        }
    };
    println!("[OK] GStreamer initialized");

    if missing.is_empty() {
        println!("[OK] Video pipeline elements present");
    } else {
        for name in &missing {
            println!("[WARN] Missing element: {name}");
        }
    }

    let aac = available_aac_encoder()?;
    match aac {
        Some(name) => println!("[OK] AAC encoder: {name}"),
        None => println!("[WARN] AAC encoder: none found (fdkaacenc, avenc_aac, voaacenc, faac)"),
    }

    println!();
    if missing.is_empty() && aac.is_some() {
        println!("All required elements are available. Recording is ready.");
    } else {
        println!("Some elements are missing. Install gst-plugins-good/-bad/-ugly and gst-libav.");
    }

    Ok(())
}
