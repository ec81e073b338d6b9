//! Common helpers shared across the dataprep crates.

/// Settings shared by the digit and landmark preparers.
pub mod config;
/// Image loading, resizing, listing and tensor conversion.
pub mod image_utils;
/// Scoped timing logs for optional performance tracing.
pub mod telemetry;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::LevelFilter;

pub use image_utils::{
    IMAGE_EXTENSIONS, compute_resize_scales, list_images, load_image, resize_image, rgb_to_bgr_chw,
};
pub use telemetry::{
    TELEMETRY_TARGET, TimingGuard, configure as configure_telemetry, telemetry_enabled,
    timing_guard,
};

/// Initialize logging once for the CLI and tests.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Calling this
/// more than once is harmless.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(TELEMETRY_TARGET, LevelFilter::Trace);

    if builder.try_init().is_err() {
        log::trace!("logger already initialized");
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    path.canonicalize()
        .with_context(|| format!("failed to canonicalize {}", path.display()))
}

/// Create `dir` (and its parents) if missing and return it as an owned path.
pub fn ensure_dir<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;
    Ok(dir.to_path_buf())
}

/// Write `contents` to `path`, creating the parent directory first.
pub fn write_text<P: AsRef<Path>>(path: P, contents: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Return at most `max_chars` characters of `text`, cut on a char boundary.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
