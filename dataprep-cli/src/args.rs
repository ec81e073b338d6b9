//! Command-line argument definitions for `dataprep`.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Prepare MNIST digits and face landmarks as text datasets.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Settings JSON. Defaults to `config/dataprep_settings.json` when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable telemetry timing logs.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Telemetry logging level (error, warn, info, debug, trace, off).
    #[arg(long, global = true, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Normalize, augment and write MNIST as array literals.
    Digits(DigitArgs),
    /// Detect face landmarks in an image folder and write train/test lists.
    Landmarks(LandmarkArgs),
}

#[derive(Debug, Default, Args)]
pub struct DigitArgs {
    /// Directory holding the MNIST IDX files.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Download MNIST into the data directory when files are missing.
    #[arg(long, action = ArgAction::SetTrue)]
    pub download: bool,

    /// Output directory for the four literal files.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Seed for the augmentation RNG.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Threads used to format literals.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Rows formatted per task.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Do not write `testingLabels.txt`.
    #[arg(long, action = ArgAction::SetTrue)]
    pub skip_test_labels: bool,
}

#[derive(Debug, Default, Args)]
pub struct LandmarkArgs {
    /// Folder of face images.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// YuNet ONNX model.
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Output directory for the four list files.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of images to scan (0 = no limit).
    #[arg(long)]
    pub limit: Option<usize>,

    /// Fraction of samples placed in the test split.
    #[arg(long)]
    pub test_size: Option<f32>,

    /// Seed for the train/test shuffle.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Minimum detection confidence.
    #[arg(long)]
    pub score_threshold: Option<f32>,

    /// Override NMS threshold.
    #[arg(long)]
    pub nms_threshold: Option<f32>,

    /// Override model input width (pixels).
    #[arg(long)]
    pub width: Option<u32>,

    /// Override model input height (pixels).
    #[arg(long)]
    pub height: Option<u32>,

    /// Resize quality mode: `quality` (Triangle) or `speed` (Nearest).
    #[arg(long, value_name = "MODE")]
    pub resize_quality: Option<dataprep_utils::config::ResizeQuality>,
}
