//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use dataprep_utils::{
    config::{AppSettings, default_settings_path},
    normalize_path,
};
use log::info;

use crate::args::{Cli, Command, DigitArgs, LandmarkArgs};

/// Load settings from `config_path`, the default settings file, or built-in defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        return Ok(settings);
    }

    let default_path = default_settings_path();
    if !default_path.exists() {
        return Ok(AppSettings::default());
    }
    let settings = AppSettings::load_from_path(&default_path).with_context(|| {
        format!(
            "failed to load default settings from {}",
            default_path.display()
        )
    })?;
    info!("Loaded settings from {}", default_path.display());
    Ok(settings)
}

/// Apply command-line arguments on top of loaded settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, cli: &Cli) {
    if cli.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = cli.telemetry_level.as_deref() {
        let level = level.trim().to_ascii_lowercase();
        if !level.is_empty() {
            if level == "off" {
                settings.telemetry.enabled = false;
            }
            settings.telemetry.level = level;
        }
    }

    match &cli.command {
        Command::Digits(args) => apply_digit_overrides(settings, args),
        Command::Landmarks(args) => apply_landmark_overrides(settings, args),
    }
    settings.sanitize();
}

fn apply_digit_overrides(settings: &mut AppSettings, args: &DigitArgs) {
    let digits = &mut settings.digits;
    if let Some(dir) = args.data_dir.as_ref() {
        digits.data_dir = dir.display().to_string();
    }
    if args.download {
        digits.download = true;
    }
    if let Some(dir) = args.output_dir.as_ref() {
        digits.output_dir = dir.display().to_string();
    }
    if let Some(seed) = args.seed {
        digits.seed = seed;
    }
    if args.skip_test_labels {
        digits.write_test_labels = false;
    }
    if let Some(workers) = args.workers {
        settings.format.workers = workers;
    }
    if let Some(chunk_size) = args.chunk_size {
        settings.format.chunk_size = chunk_size;
    }
}

fn apply_landmark_overrides(settings: &mut AppSettings, args: &LandmarkArgs) {
    let landmarks = &mut settings.landmarks;
    if let Some(dir) = args.input.as_ref() {
        landmarks.image_dir = dir.display().to_string();
    }
    if let Some(model) = args.model.as_ref() {
        landmarks.model_path = model.display().to_string();
    }
    if let Some(dir) = args.output_dir.as_ref() {
        landmarks.output_dir = dir.display().to_string();
    }
    if let Some(limit) = args.limit {
        landmarks.limit = limit;
    }
    if let Some(test_size) = args.test_size {
        landmarks.test_size = test_size;
    }
    if let Some(seed) = args.seed {
        landmarks.seed = seed;
    }

    if let Some(score) = args.score_threshold {
        settings.detection.score_threshold = score;
    }
    if let Some(nms) = args.nms_threshold {
        settings.detection.nms_threshold = nms;
    }
    if let Some(width) = args.width {
        settings.input.width = width;
    }
    if let Some(height) = args.height {
        settings.input.height = height;
    }
    if let Some(mode) = args.resize_quality {
        settings.input.resize_quality = mode;
    }
}
