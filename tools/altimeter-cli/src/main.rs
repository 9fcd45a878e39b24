//! Altimeter CLI: drive the capture core from the command line.
//!
//! Usage:
//!   altimeter check                  Check GStreamer elements needed for recording
//!   altimeter record [OPTIONS]       Record a watermarked movie from the synthetic camera
//!   altimeter photo [OPTIONS]        Capture one still into a directory
//!   altimeter composite <IN> <OUT>   Watermark a PNG
//!   altimeter orientation <X> <Y> <Z> Classify a gravity vector

use std::path::PathBuf;

use altimeter_common::config::{AppConfig, LoggingConfig, OrientationStrategyName};
use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "altimeter",
    about = "Field camera core: capture, watermark, and record",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/altimeter/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Telemetry lines stamped onto frames.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TelemetryArgs {
    /// Altitude text, e.g. "1 234 m"
    #[arg(long)]
    altitude: Option<String>,

    /// Pressure text, e.g. "872 hPa"
    #[arg(long)]
    pressure: Option<String>,

    /// Coordinate text
    #[arg(long)]
    coordinate: Option<String>,

    /// Location description
    #[arg(long)]
    location: Option<String>,

    /// TrueType font used for telemetry text
    #[arg(long)]
    font: Option<PathBuf>,

    /// Text height in pixels
    #[arg(long, default_value = "24")]
    font_size: f32,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the recording pipeline can be built
    Check,

    /// Record from the synthetic camera into a QuickTime movie
    Record {
        /// Seconds to record
        #[arg(short, long, default_value = "3")]
        duration: f64,

        /// Copy the finished movie here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Video preset width
        #[arg(long)]
        width: Option<u32>,

        /// Video preset height
        #[arg(long)]
        height: Option<u32>,

        /// PNG stamped in the top-left corner
        #[arg(long)]
        watermark: Option<PathBuf>,

        #[command(flatten)]
        telemetry: TelemetryArgs,
    },

    /// Capture one still from the synthetic camera
    Photo {
        /// Directory the photo is saved into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Latitude recorded next to the photo
        #[arg(long, requires = "longitude", allow_hyphen_values = true)]
        latitude: Option<f64>,

        /// Longitude recorded next to the photo
        #[arg(long, requires = "latitude", allow_hyphen_values = true)]
        longitude: Option<f64>,
    },

    /// Apply an image or text watermark to a PNG
    Composite {
        /// Input image
        input: PathBuf,

        /// Output PNG
        output: PathBuf,

        /// Overlay image
        #[arg(long)]
        image: Option<PathBuf>,

        /// Overlay scale
        #[arg(long, default_value = "1.0")]
        scale: f32,

        /// Overlay left edge in pixels
        #[arg(long, default_value = "16", allow_hyphen_values = true)]
        x: i32,

        /// Overlay top edge in pixels
        #[arg(long, default_value = "16", allow_hyphen_values = true)]
        y: i32,

        #[command(flatten)]
        telemetry: TelemetryArgs,
    },

    /// Classify a gravity vector
    Orientation {
        #[arg(allow_hyphen_values = true)]
        x: f64,

        #[arg(allow_hyphen_values = true)]
        y: f64,

        #[arg(allow_hyphen_values = true)]
        z: f64,

        /// Classification strategy
        #[arg(long, value_enum, default_value = "system-like")]
        strategy: StrategyArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    SystemLike,
    LargestAxis,
}

impl From<StrategyArg> for OrientationStrategyName {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::SystemLike => OrientationStrategyName::SystemLike,
            StrategyArg::LargestAxis => OrientationStrategyName::LargestAxis,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let logging = if cli.verbose {
        LoggingConfig {
            level: "debug".to_string(),
            ..config.logging.clone()
        }
    } else {
        config.logging.clone()
    };
    altimeter_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Check => commands::check::run(),
        Commands::Record {
            duration,
            output,
            width,
            height,
            watermark,
            telemetry,
        } => commands::record::run(config, duration, output, width, height, watermark, telemetry).await,
        Commands::Photo {
            output,
            latitude,
            longitude,
        } => commands::photo::run(config, output, latitude.zip(longitude)).await,
        Commands::Composite {
            input,
            output,
            image,
            scale,
            x,
            y,
            telemetry,
        } => commands::composite::run(input, output, image, scale, x, y, telemetry),
        Commands::Orientation { x, y, z, strategy } => {
            commands::orientation::run(x, y, z, strategy.into())
        }
    }
}
