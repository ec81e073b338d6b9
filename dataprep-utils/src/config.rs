//! Shared configuration types consumed across the dataprep workspace.
//!
//! Every section deserializes with `#[serde(default)]`, so a settings file only
//! needs the keys it wants to change. The defaults reproduce the fixed relative
//! paths the preparers have always used.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Output layout of the digit preparer and where MNIST is read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DigitSettings {
    /// Directory holding the four MNIST IDX files.
    pub data_dir: String,
    /// Fetch and extract the IDX files into `data_dir` before loading.
    pub download: bool,
    /// Number of training samples to read.
    pub train_len: u32,
    /// Number of test samples to read.
    pub test_len: u32,
    /// Directory receiving `trainingData.txt`, `trainingLabels.txt`, ...
    pub output_dir: String,
    /// Value written in every non-hot label position.
    pub label_epsilon: f32,
    /// Also write `testingLabels.txt`.
    pub write_test_labels: bool,
    /// Seed for the augmentation RNGs.
    pub seed: u64,
    pub augment: AugmentSettings,
}

impl Default for DigitSettings {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            download: false,
            train_len: 60_000,
            test_len: 10_000,
            output_dir: "datasets/digit_recognition".into(),
            label_epsilon: 0.001,
            write_test_labels: true,
            seed: 42,
            augment: AugmentSettings::default(),
        }
    }
}

/// Random augmentation ranges applied to each training digit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AugmentSettings {
    /// Zero padding added on every side before the random crop.
    pub padding: u32,
    /// Brightness delta is drawn from `[-max_brightness_delta, max_brightness_delta]`.
    pub max_brightness_delta: f32,
    pub contrast_lower: f32,
    pub contrast_upper: f32,
}

impl Default for AugmentSettings {
    fn default() -> Self {
        Self {
            padding: 1,
            max_brightness_delta: 0.3,
            contrast_lower: 0.9,
            contrast_upper: 1.1,
        }
    }
}

impl AugmentSettings {
    /// Clamp ranges into a usable state.
    pub fn sanitize(&mut self) {
        self.max_brightness_delta = self.max_brightness_delta.abs();
        if self.contrast_lower > self.contrast_upper {
            std::mem::swap(&mut self.contrast_lower, &mut self.contrast_upper);
        }
    }
}

/// Paths and split parameters of the landmark preparer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LandmarkSettings {
    /// Folder scanned for face images.
    pub image_dir: String,
    /// YuNet ONNX model used for detection.
    pub model_path: String,
    /// Directory receiving the four train/test list files.
    pub output_dir: String,
    /// Maximum number of images to process (0 = no limit).
    pub limit: usize,
    /// Fraction of samples assigned to the test split.
    pub test_size: f32,
    /// Seed for the train/test shuffle.
    pub seed: u64,
}

impl Default for LandmarkSettings {
    fn default() -> Self {
        Self {
            image_dir: "datasets/face_recognition/images".into(),
            model_path: "models/face_detection_yunet_2023mar_640.onnx".into(),
            output_dir: "datasets/face_recognition".into(),
            limit: 1000,
            test_size: 0.2,
            seed: 42,
        }
    }
}

impl LandmarkSettings {
    pub fn limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit)
    }

    pub fn sanitize(&mut self) {
        if !self.test_size.is_finite() {
            self.test_size = LandmarkSettings::default().test_size;
        }
        self.test_size = self.test_size.clamp(0.0, 1.0);
    }
}

/// Resize filter used when scaling images to the model input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    /// Triangle filter.
    #[default]
    Quality,
    /// Nearest-neighbour filter.
    Speed,
}

impl fmt::Display for ResizeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResizeQuality::Quality => "quality",
            ResizeQuality::Speed => "speed",
        })
    }
}

impl FromStr for ResizeQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" => Ok(ResizeQuality::Quality),
            "speed" => Ok(ResizeQuality::Speed),
            other => Err(format!(
                "invalid resize quality '{other}'; expected 'quality' or 'speed'"
            )),
        }
    }
}

/// Model input resolution in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputDimensions {
    pub width: u32,
    pub height: u32,
    pub resize_quality: ResizeQuality,
}

impl Default for InputDimensions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
            resize_quality: ResizeQuality::Quality,
        }
    }
}

/// Face detection filtering parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum confidence for a face to be kept.
    pub score_threshold: f32,
    /// IoU above which overlapping faces are suppressed.
    pub nms_threshold: f32,
    /// Maximum number of candidates kept before suppression.
    pub top_k: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.9,
            nms_threshold: 0.3,
            top_k: 5_000,
        }
    }
}

/// Parallel literal formatting parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FormatSettings {
    /// Worker threads in the formatting pool.
    pub workers: usize,
    /// Rows formatted per task.
    pub chunk_size: usize,
    /// Characters of each written file echoed to the log.
    pub preview_chars: usize,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            workers: 13,
            chunk_size: 10_000,
            preview_chars: 500,
        }
    }
}

impl FormatSettings {
    pub fn sanitize(&mut self) {
        self.workers = self.workers.max(1);
        self.chunk_size = self.chunk_size.max(1);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether timing logs are emitted.
    pub enabled: bool,
    /// Level of the timing logs (error, warn, info, debug, trace, off).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".into(),
        }
    }
}

impl TelemetrySettings {
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// All settings consumed by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub digits: DigitSettings,
    pub landmarks: LandmarkSettings,
    pub input: InputDimensions,
    pub detection: DetectionSettings,
    pub format: FormatSettings,
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file and sanitize them.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings.sanitize();
        Ok(settings)
    }

    /// Write settings as pretty-printed JSON, replacing any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))
    }

    pub fn sanitize(&mut self) {
        self.digits.augment.sanitize();
        self.landmarks.sanitize();
        self.format.sanitize();
    }
}

/// Settings file picked up when `--config` is not given (`config/dataprep_settings.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/dataprep_settings.json"))
        .unwrap_or_else(|_| PathBuf::from("config/dataprep_settings.json"))
}
