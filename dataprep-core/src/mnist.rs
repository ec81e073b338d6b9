//! MNIST loading through the `mnist` crate.
//!
//! The crate panics on missing or malformed files and insists on the full
//! 60k/10k archives, so [`MnistSource::load`] checks that each IDX file exists
//! with the canonical header and body size before handing over. The crate
//! reads both archives as one stream, so the full splits are loaded and the
//! requested prefixes are cut here.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{Level, info};
use mnist::{Mnist, MnistBuilder};
use ndarray::Array2;

use dataprep_utils::{config::DigitSettings, timing_guard};

use crate::error::DataError;

/// Side length of an MNIST digit.
pub const IMAGE_SIDE: usize = 28;
/// Pixels per MNIST digit.
pub const IMAGE_LEN: usize = IMAGE_SIDE * IMAGE_SIDE;

pub const TRAIN_IMAGES_FILE: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS_FILE: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES_FILE: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS_FILE: &str = "t10k-labels-idx1-ubyte";

/// Samples in the full MNIST training archive.
pub const TRAIN_SAMPLES: u32 = 60_000;
/// Samples in the full MNIST test archive.
pub const TEST_SAMPLES: u32 = 10_000;

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;
const IMAGE_DIMS: [u32; 2] = [IMAGE_SIDE as u32, IMAGE_SIDE as u32];

/// Raw bytes of one MNIST split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MnistSplit {
    /// Row-major pixels, `IMAGE_LEN` bytes per sample.
    pub images: Vec<u8>,
    /// Digit class per sample.
    pub labels: Vec<u8>,
}

impl MnistSplit {
    /// Keep the first `len` samples.
    fn truncated(mut self, len: usize) -> Self {
        self.images.truncate(len * IMAGE_LEN);
        self.labels.truncate(len);
        self
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Pixels as an `(n, 784)` matrix scaled to `[0, 1]`.
    pub fn normalized(&self) -> Result<Array2<f32>, DataError> {
        let pixels = normalize(&self.images)?;
        if pixels.nrows() != self.labels.len() {
            return Err(DataError::LabelCountMismatch {
                images: pixels.nrows(),
                labels: self.labels.len(),
            });
        }
        Ok(pixels)
    }
}

/// Train and test splits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MnistData {
    pub train: MnistSplit,
    pub test: MnistSplit,
}

/// Reshape raw pixel bytes into `(n, 784)` rows divided by 255.
pub fn normalize(pixels: &[u8]) -> Result<Array2<f32>, DataError> {
    if pixels.len() % IMAGE_LEN != 0 {
        return Err(DataError::PartialImage {
            len: pixels.len(),
            sample_len: IMAGE_LEN,
        });
    }
    let scaled: Vec<f32> = pixels.iter().map(|&p| f32::from(p) / 255.0).collect();
    Array2::from_shape_vec((pixels.len() / IMAGE_LEN, IMAGE_LEN), scaled).map_err(|_| {
        DataError::PartialImage {
            len: pixels.len(),
            sample_len: IMAGE_LEN,
        }
    })
}

/// Where and how much of MNIST to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MnistSource {
    pub base_dir: PathBuf,
    pub download: bool,
    pub train_len: u32,
    pub test_len: u32,
}

impl From<&DigitSettings> for MnistSource {
    fn from(settings: &DigitSettings) -> Self {
        Self {
            base_dir: PathBuf::from(&settings.data_dir),
            download: settings.download,
            train_len: settings.train_len,
            test_len: settings.test_len,
        }
    }
}

impl MnistSource {
    /// IDX files under `base_dir` that do not exist yet.
    pub fn missing_files(&self) -> Vec<PathBuf> {
        [
            TRAIN_IMAGES_FILE,
            TRAIN_LABELS_FILE,
            TEST_IMAGES_FILE,
            TEST_LABELS_FILE,
        ]
        .iter()
        .map(|name| self.base_dir.join(name))
        .filter(|path| !path.is_file())
        .collect()
    }

    /// Load both splits, downloading first when enabled.
    pub fn load(&self) -> Result<MnistData> {
        let _guard = timing_guard("dataprep_core::mnist_load", Level::Debug);
        if self.download && !self.missing_files().is_empty() {
            self.fetch()?;
        }

        let missing = self.missing_files();
        anyhow::ensure!(
            missing.is_empty(),
            "MNIST files missing: {}",
            missing
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        anyhow::ensure!(
            (1..=TRAIN_SAMPLES).contains(&self.train_len),
            "train_len must be within 1..={TRAIN_SAMPLES}, got {}",
            self.train_len
        );
        anyhow::ensure!(
            (1..=TEST_SAMPLES).contains(&self.test_len),
            "test_len must be within 1..={TEST_SAMPLES}, got {}",
            self.test_len
        );

        let dir = &self.base_dir;
        check_idx(&dir.join(TRAIN_IMAGES_FILE), IMAGES_MAGIC, TRAIN_SAMPLES, &IMAGE_DIMS)?;
        check_idx(&dir.join(TRAIN_LABELS_FILE), LABELS_MAGIC, TRAIN_SAMPLES, &[])?;
        check_idx(&dir.join(TEST_IMAGES_FILE), IMAGES_MAGIC, TEST_SAMPLES, &IMAGE_DIMS)?;
        check_idx(&dir.join(TEST_LABELS_FILE), LABELS_MAGIC, TEST_SAMPLES, &[])?;

        let base = base_path_string(dir);
        let Mnist {
            trn_img,
            trn_lbl,
            tst_img,
            tst_lbl,
            ..
        } = MnistBuilder::new()
            .label_format_digit()
            .base_path(&base)
            .training_set_length(TRAIN_SAMPLES)
            .validation_set_length(0)
            .test_set_length(TEST_SAMPLES)
            .finalize();

        let data = MnistData {
            train: MnistSplit {
                images: trn_img,
                labels: trn_lbl,
            }
            .truncated(self.train_len as usize),
            test: MnistSplit {
                images: tst_img,
                labels: tst_lbl,
            }
            .truncated(self.test_len as usize),
        };
        info!(
            "Loaded MNIST from {}: {} train / {} test samples",
            dir.display(),
            data.train.len(),
            data.test.len()
        );
        Ok(data)
    }

    #[cfg(feature = "download")]
    fn fetch(&self) -> Result<()> {
        info!("Downloading MNIST into {}", self.base_dir.display());
        dataprep_utils::ensure_dir(&self.base_dir)?;
        let base = base_path_string(&self.base_dir);
        MnistBuilder::new()
            .base_path(&base)
            .download_and_extract()
            .finalize();
        Ok(())
    }

    #[cfg(not(feature = "download"))]
    fn fetch(&self) -> Result<()> {
        anyhow::bail!(
            "MNIST download requested for {} but dataprep-core was built without the `download` feature",
            self.base_dir.display()
        )
    }
}

/// `mnist` joins file names onto the base path as plain strings.
fn base_path_string(dir: &Path) -> String {
    let mut base = dir.display().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

/// Verify an IDX file's magic number, item count, item dimensions and size.
fn check_idx(path: &Path, magic: u32, wanted: u32, dims: &[u32]) -> Result<()> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut read_u32 = |what: &str| -> Result<u32> {
        let mut word = [0u8; 4];
        file.read_exact(&mut word).with_context(|| {
            format!("{} ends inside the IDX header ({what})", path.display())
        })?;
        Ok(u32::from_be_bytes(word))
    };

    let found_magic = read_u32("magic")?;
    anyhow::ensure!(
        found_magic == magic,
        "{} is not an IDX file of the expected kind (magic {found_magic}, wanted {magic})",
        path.display()
    );
    let count = read_u32("item count")?;
    anyhow::ensure!(
        count == wanted,
        "{} holds {count} items, expected the full archive of {wanted}",
        path.display()
    );
    for (axis, &dim) in dims.iter().enumerate() {
        let found = read_u32("dimension")?;
        anyhow::ensure!(
            found == dim,
            "{} has size {found} on item axis {axis}, expected {dim}",
            path.display()
        );
    }

    let header_len = 4 * (2 + dims.len() as u64);
    let item_len: u64 = dims.iter().map(|&d| u64::from(d)).product();
    let expected = header_len + u64::from(wanted) * item_len;
    let actual = file
        .metadata()
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    anyhow::ensure!(
        actual == expected,
        "{} is {actual} bytes, expected {expected}",
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_header(path: &Path, magic: u32, count: u32) {
        write_idx(path, magic, count, &[], &[]);
    }

    fn write_idx(path: &Path, magic: u32, count: u32, dims: &[u32], body: &[u8]) {
        let mut bytes = Vec::with_capacity(16 + body.len());
        for word in [magic, count].iter().chain(dims) {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        bytes.extend_from_slice(body);
        fs::write(path, bytes).unwrap();
    }

    /// Full-size archive whose sample `i` has label `label(i)` and every
    /// pixel set to `pixel(i)`.
    fn write_archive(
        dir: &Path,
        (images_file, labels_file): (&str, &str),
        count: u32,
        label: impl Fn(usize) -> u8,
        pixel: impl Fn(usize) -> u8,
    ) {
        let n = count as usize;
        let labels: Vec<u8> = (0..n).map(&label).collect();
        let mut images = Vec::with_capacity(n * IMAGE_LEN);
        for i in 0..n {
            images.resize(images.len() + IMAGE_LEN, pixel(i));
        }
        write_idx(
            &dir.join(images_file),
            IMAGES_MAGIC,
            count,
            &IMAGE_DIMS,
            &images,
        );
        write_idx(&dir.join(labels_file), LABELS_MAGIC, count, &[], &labels);
    }

    fn source(dir: &Path, train_len: u32, test_len: u32) -> MnistSource {
        MnistSource {
            base_dir: dir.to_path_buf(),
            download: false,
            train_len,
            test_len,
        }
    }

    #[test]
    fn normalize_scales_and_reshapes() {
        let mut pixels = vec![0u8; IMAGE_LEN * 2];
        pixels[0] = 255;
        pixels[IMAGE_LEN + 1] = 51;
        let rows = normalize(&pixels).unwrap();
        assert_eq!(rows.dim(), (2, IMAGE_LEN));
        assert_eq!(rows[(0, 0)], 1.0);
        assert_eq!(rows[(1, 1)], 0.2);
        assert_eq!(rows[(1, 0)], 0.0);
    }

    #[test]
    fn normalize_rejects_partial_images() {
        assert_eq!(
            normalize(&[0u8; IMAGE_LEN + 3]),
            Err(DataError::PartialImage {
                len: IMAGE_LEN + 3,
                sample_len: IMAGE_LEN
            })
        );
    }

    #[test]
    fn split_normalization_checks_label_count() {
        let split = MnistSplit {
            images: vec![0; IMAGE_LEN * 2],
            labels: vec![1],
        };
        assert_eq!(
            split.normalized(),
            Err(DataError::LabelCountMismatch {
                images: 2,
                labels: 1
            })
        );
    }

    #[test]
    fn missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = source(dir.path(), 3, 2).load().unwrap_err();
        assert!(format!("{err}").contains(TRAIN_IMAGES_FILE));
        assert_eq!(source(dir.path(), 3, 2).missing_files().len(), 4);
    }

    #[cfg(not(feature = "download"))]
    #[test]
    fn download_without_feature_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut src = source(dir.path(), 3, 2);
        src.download = true;
        let err = src.load().unwrap_err();
        assert!(format!("{err}").contains("`download` feature"));
    }

    #[test]
    fn truncated_archive_is_rejected_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        write_header(&dir.path().join(TRAIN_IMAGES_FILE), IMAGES_MAGIC, 3);
        write_header(&dir.path().join(TRAIN_LABELS_FILE), LABELS_MAGIC, 3);
        write_header(&dir.path().join(TEST_IMAGES_FILE), IMAGES_MAGIC, 2);
        write_header(&dir.path().join(TEST_LABELS_FILE), LABELS_MAGIC, 2);

        let err = source(dir.path(), 3, 2).load().unwrap_err();
        assert!(format!("{err}").contains("holds 3 items"));
    }

    #[test]
    fn swapped_files_fail_the_magic_check() {
        let dir = tempfile::tempdir().unwrap();
        write_header(&dir.path().join(TRAIN_IMAGES_FILE), LABELS_MAGIC, TRAIN_SAMPLES);
        write_header(&dir.path().join(TRAIN_LABELS_FILE), LABELS_MAGIC, TRAIN_SAMPLES);
        write_header(&dir.path().join(TEST_IMAGES_FILE), IMAGES_MAGIC, TEST_SAMPLES);
        write_header(&dir.path().join(TEST_LABELS_FILE), LABELS_MAGIC, TEST_SAMPLES);

        let err = source(dir.path(), 10, 10).load().unwrap_err();
        assert!(format!("{err}").contains("magic 2049"));
    }

    #[test]
    fn lengths_outside_the_archive_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            TRAIN_IMAGES_FILE,
            TRAIN_LABELS_FILE,
            TEST_IMAGES_FILE,
            TEST_LABELS_FILE,
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let err = source(dir.path(), 60_001, 10).load().unwrap_err();
        assert!(format!("{err}").contains("train_len"));
        let err = source(dir.path(), 10, 0).load().unwrap_err();
        assert!(format!("{err}").contains("test_len"));
    }

    #[test]
    fn prefixes_come_from_their_own_archive() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(
            dir.path(),
            (TRAIN_IMAGES_FILE, TRAIN_LABELS_FILE),
            TRAIN_SAMPLES,
            |i| (i % 10) as u8,
            |i| (i % 100) as u8,
        );
        write_archive(
            dir.path(),
            (TEST_IMAGES_FILE, TEST_LABELS_FILE),
            TEST_SAMPLES,
            |i| ((i + 3) % 10) as u8,
            |i| 200 + (i % 50) as u8,
        );

        let data = source(dir.path(), 5, 3).load().unwrap();
        assert_eq!(data.train.labels, vec![0, 1, 2, 3, 4]);
        assert_eq!(data.test.labels, vec![3, 4, 5]);
        assert_eq!(data.train.images.len(), 5 * IMAGE_LEN);
        assert_eq!(data.test.images.len(), 3 * IMAGE_LEN);
        assert_eq!(data.train.images[4 * IMAGE_LEN], 4);
        assert_eq!(data.test.images[0], 200);
        assert_eq!(data.test.images[2 * IMAGE_LEN + 1], 202);
    }

    #[test]
    fn wrong_image_dimensions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_idx(
            &dir.path().join(TRAIN_IMAGES_FILE),
            IMAGES_MAGIC,
            TRAIN_SAMPLES,
            &[32, 32],
            &[],
        );
        for (name, magic, count) in [
            (TRAIN_LABELS_FILE, LABELS_MAGIC, TRAIN_SAMPLES),
            (TEST_IMAGES_FILE, IMAGES_MAGIC, TEST_SAMPLES),
            (TEST_LABELS_FILE, LABELS_MAGIC, TEST_SAMPLES),
        ] {
            write_header(&dir.path().join(name), magic, count);
        }

        let err = source(dir.path(), 10, 10).load().unwrap_err();
        assert!(format!("{err}").contains("size 32 on item axis 0"));
    }

    #[test]
    fn truncated_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_idx(
            &dir.path().join(TRAIN_IMAGES_FILE),
            IMAGES_MAGIC,
            TRAIN_SAMPLES,
            &IMAGE_DIMS,
            &[0; IMAGE_LEN],
        );
        for (name, magic, count) in [
            (TRAIN_LABELS_FILE, LABELS_MAGIC, TRAIN_SAMPLES),
            (TEST_IMAGES_FILE, IMAGES_MAGIC, TEST_SAMPLES),
            (TEST_LABELS_FILE, LABELS_MAGIC, TEST_SAMPLES),
        ] {
            write_header(&dir.path().join(name), magic, count);
        }

        let err = source(dir.path(), 10, 10).load().unwrap_err();
        let expected = 16 + u64::from(TRAIN_SAMPLES) * IMAGE_LEN as u64;
        let message = format!("is {} bytes, expected {expected}", 16 + IMAGE_LEN);
        assert!(format!("{err}").contains(&message));
    }

    #[test]
    fn base_path_gets_trailing_separator() {
        assert_eq!(base_path_string(Path::new("data")), "data/");
        assert_eq!(base_path_string(Path::new("data/")), "data/");
    }
}
