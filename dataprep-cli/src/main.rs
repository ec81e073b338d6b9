mod args;
mod config;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use dataprep_core::{
    FaceDetector, FormatOptions, PostprocessConfig, PreprocessConfig, prepare_digits,
    prepare_landmarks,
};
use dataprep_utils::{config::AppSettings, configure_telemetry, init_logging, telemetry_enabled};

use crate::{
    args::{Cli, Command},
    config::{apply_cli_overrides, load_settings},
};

/// Paths and labels echoed for each landmark list.
const LANDMARK_PREVIEW: usize = 5;

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_ref())?;
    apply_cli_overrides(&mut settings, &cli);
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );
    if telemetry_enabled() {
        info!(
            "Telemetry enabled at {} level",
            settings.telemetry.level_filter()
        );
    }

    match cli.command {
        Command::Digits(_) => run_digits(&settings),
        Command::Landmarks(_) => run_landmarks(&settings),
    }
}

fn run_digits(settings: &AppSettings) -> Result<()> {
    let options = FormatOptions::from(&settings.format);
    info!(
        "Preparing digits from {} into {} ({} workers, {} rows per chunk)",
        settings.digits.data_dir, settings.digits.output_dir, options.workers, options.chunk_size
    );

    let report = prepare_digits(&settings.digits, &options)?;
    info!(
        "Digits done: {} original + {} augmented training rows, {} testing rows",
        report.original_train, report.original_train, report.test_samples
    );
    for output in &report.outputs {
        info!(
            "  {} -> {} ({} rows)",
            output.name,
            output.path.display(),
            output.rows
        );
    }
    Ok(())
}

fn run_landmarks(settings: &AppSettings) -> Result<()> {
    let landmarks = &settings.landmarks;
    let model_path = Path::new(&landmarks.model_path);
    anyhow::ensure!(
        model_path.is_file(),
        "face detection model not found at {}",
        model_path.display()
    );

    let preprocess = PreprocessConfig::from(&settings.input);
    let postprocess = PostprocessConfig::from(&settings.detection);
    info!(
        "Loading face model from {} at {}x{}",
        model_path.display(),
        preprocess.input_size.width,
        preprocess.input_size.height
    );
    let detector = FaceDetector::new(model_path, preprocess, postprocess)
        .with_context(|| format!("failed to load face model {}", model_path.display()))?;

    let report = prepare_landmarks(&detector, landmarks, LANDMARK_PREVIEW)?;
    info!(
        "Landmarks done: {} scanned, {} train, {} test ({} without faces, {} failed)",
        report.scanned, report.train, report.test, report.faceless, report.failed
    );
    for path in &report.outputs {
        info!("  wrote {}", path.display());
    }
    Ok(())
}
