//! Brace-delimited array literal output.
//!
//! A matrix named `trainingData` is written as
//!
//! ```text
//! trainingData = [
//!  {0.0, 0.5, 1.0},
//!  {0.25, 0.75, 0.125},
//! };
//! ```
//!
//! Consumers only look at lines that start with `{` and end with `},`, so the
//! header and trailer are decorative. Rows are formatted in chunks on a
//! dedicated thread pool and stitched back together in row order.

use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::{Context, Result};
use log::{Level, info};
use ndarray::{Array2, ArrayView1, ArrayView2, s};
use rayon::prelude::*;

use dataprep_utils::{config::FormatSettings, preview, timing_guard, write_text};

use crate::error::DataError;

/// Thread pool and chunking parameters for [`format_array`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Worker threads formatting chunks concurrently.
    pub workers: usize,
    /// Rows per chunk.
    pub chunk_size: usize,
    /// Characters kept in [`ArrayOutput::preview`].
    pub preview_chars: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatSettings::default().into()
    }
}

impl From<FormatSettings> for FormatOptions {
    fn from(settings: FormatSettings) -> Self {
        Self {
            workers: settings.workers.max(1),
            chunk_size: settings.chunk_size.max(1),
            preview_chars: settings.preview_chars,
        }
    }
}

impl From<&FormatSettings> for FormatOptions {
    fn from(settings: &FormatSettings) -> Self {
        (*settings).into()
    }
}

/// Summary of a literal written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayOutput {
    pub name: String,
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: usize,
    /// Leading characters of the written text.
    pub preview: String,
}

/// Rows between progress lines: a tenth of `total`, or every row below ten.
fn progress_step(total: usize) -> usize {
    (total / 10).max(1)
}

/// Counts formatted rows and logs every [`progress_step`] rows.
struct Progress<'a> {
    name: &'a str,
    total: usize,
    step: usize,
    done: AtomicUsize,
}

impl<'a> Progress<'a> {
    fn new(name: &'a str, total: usize) -> Self {
        Self {
            name,
            total,
            step: progress_step(total),
            done: AtomicUsize::new(0),
        }
    }

    /// Count one row; returns whether a progress line was logged.
    fn tick(&self) -> bool {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let report = done % self.step == 0;
        if report {
            info!(
                "Progress ({}): {:.2}%",
                self.name,
                done as f64 / self.total as f64 * 100.0
            );
        }
        report
    }
}

/// Append `value` using the shortest representation that still reads back as a float.
pub(crate) fn push_value(out: &mut String, value: f32) {
    // `Debug` keeps a trailing `.0` on integral values, unlike `Display`.
    let _ = write!(out, "{value:?}");
}

/// Append `values` as `{a, b, c}`.
pub(crate) fn push_braced<I>(out: &mut String, values: I)
where
    I: IntoIterator<Item = f32>,
{
    out.push('{');
    for (idx, value) in values.into_iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        push_value(out, value);
    }
    out.push('}');
}

/// Format a single row line, including the leading space and trailing `},\n`.
pub fn format_row(row: ArrayView1<'_, f32>) -> String {
    let mut line = String::with_capacity(row.len() * 8 + 4);
    line.push(' ');
    push_braced(&mut line, row.iter().copied());
    line.push_str(",\n");
    line
}

fn format_chunk(rows: ArrayView2<'_, f32>, progress: &Progress<'_>) -> String {
    let mut chunk = String::with_capacity(rows.len() * 8 + rows.nrows() * 4);
    for row in rows.outer_iter() {
        chunk.push_str(&format_row(row));
        progress.tick();
    }
    chunk
}

/// Render `rows` as a literal named `name`.
///
/// The chunks are formatted on a pool of `options.workers` threads and
/// concatenated in submission order once every chunk has finished.
pub fn format_array(
    rows: ArrayView2<'_, f32>,
    name: &str,
    options: &FormatOptions,
) -> Result<String> {
    let _guard = timing_guard(format!("dataprep_core::format_array({name})"), Level::Debug);
    let total = rows.nrows();
    let chunk_size = options.chunk_size.max(1);
    let progress = Progress::new(name, total);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .thread_name(|idx| format!("literal-{idx}"))
        .build()
        .context("failed to build formatting thread pool")?;

    let starts: Vec<usize> = (0..total).step_by(chunk_size).collect();
    let chunks: Vec<String> = pool.install(|| {
        starts
            .par_iter()
            .map(|&start| {
                let end = (start + chunk_size).min(total);
                format_chunk(rows.slice(s![start..end, ..]), &progress)
            })
            .collect()
    });

    let body_len: usize = chunks.iter().map(String::len).sum();
    let mut text = String::with_capacity(name.len() + body_len + 8);
    text.push_str(name);
    text.push_str(" = [\n");
    for chunk in &chunks {
        text.push_str(chunk);
    }
    text.push_str("};");
    Ok(text)
}

/// Format `rows` and write them to `path`, creating parent directories.
pub fn write_array<P: AsRef<Path>>(
    path: P,
    rows: ArrayView2<'_, f32>,
    name: &str,
    options: &FormatOptions,
) -> Result<ArrayOutput> {
    let path = path.as_ref();
    let text = format_array(rows, name, options)?;
    write_text(path, &text)?;
    info!(
        "Wrote {} ({} rows, {} bytes) to {}",
        name,
        rows.nrows(),
        text.len(),
        path.display()
    );
    Ok(ArrayOutput {
        name: name.to_string(),
        path: path.to_path_buf(),
        rows: rows.nrows(),
        bytes: text.len(),
        preview: preview(&text, options.preview_chars).to_string(),
    })
}

/// Read rows back from literal text.
///
/// Lines are trimmed; only those of the form `{...},` count as rows, matching
/// how the downstream trainer reads these files.
pub fn parse_array(text: &str) -> Result<Array2<f32>, DataError> {
    let mut values = Vec::new();
    let mut width = None;
    let mut rows = 0usize;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        let Some(inner) = line
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix("},"))
        else {
            continue;
        };

        let before = values.len();
        let inner = inner.trim();
        if !inner.is_empty() {
            for token in inner.split(',') {
                let token = token.trim();
                let value = token.parse::<f32>().map_err(|_| DataError::InvalidNumber {
                    line: idx + 1,
                    value: token.to_string(),
                })?;
                values.push(value);
            }
        }

        let found = values.len() - before;
        match width {
            None => width = Some(found),
            Some(expected) if expected != found => {
                return Err(DataError::RaggedRow {
                    line: idx + 1,
                    expected,
                    found,
                });
            }
            Some(_) => {}
        }
        rows += 1;
    }

    let cols = width.unwrap_or(0);
    let found = values.len();
    Array2::from_shape_vec((rows, cols), values).map_err(|_| DataError::RaggedRow {
        line: 0,
        expected: rows * cols,
        found,
    })
}
