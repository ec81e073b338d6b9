use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage, imageops::FilterType};
use log::debug;
use ndarray::Array3;
use walkdir::WalkDir;

/// File extensions accepted as face images.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Load an image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();
    image::open(path).with_context(|| format!("failed to open image {}", path.display()))
}

/// Resize to exactly `width` x `height` and convert to RGB8.
pub fn resize_image(image: &DynamicImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    image.resize_exact(width, height, filter).to_rgb8()
}

/// Convert an RGB image into a BGR, channel-first `f32` array (OpenCV `blobFromImage` layout).
pub fn rgb_to_bgr_chw(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
        image.get_pixel(x as u32, y as u32)[2 - c] as f32
    })
}

/// Scale factors that map model-space coordinates back onto the original image.
pub fn compute_resize_scales(original: (u32, u32), target: (u32, u32)) -> Result<(f32, f32)> {
    let (orig_w, orig_h) = original;
    let (target_w, target_h) = target;
    anyhow::ensure!(
        target_w > 0 && target_h > 0,
        "target dimensions must be non-zero"
    );
    anyhow::ensure!(
        orig_w > 0 && orig_h > 0,
        "original dimensions must be non-zero"
    );
    Ok((
        orig_w as f32 / target_w as f32,
        orig_h as f32 / target_h as f32,
    ))
}

/// List image files directly inside `dir`, sorted by path.
///
/// Only files whose extension is in [`IMAGE_EXTENSIONS`] (case-insensitive) are
/// returned. At most `limit` paths are kept when a limit is given.
pub fn list_images(dir: &Path, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    anyhow::ensure!(dir.is_dir(), "image folder not found: {}", dir.display());

    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
    {
        let entry =
            entry.with_context(|| format!("failed to read directory {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_image = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image {
            images.push(entry.into_path());
        } else {
            debug!("Skipping non-image file {}", entry.path().display());
        }
    }

    images.sort();
    if let Some(limit) = limit {
        images.truncate(limit);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn rgb_to_bgr_chw_swaps_channels() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgb([10, 20, 30]));
        image.put_pixel(1, 0, image::Rgb([255, 0, 128]));

        let array = rgb_to_bgr_chw(&image);
        assert_eq!(array.shape(), &[3, 1, 2]);
        assert_eq!(array[(0, 0, 0)], 30.0);
        assert_eq!(array[(1, 0, 0)], 20.0);
        assert_eq!(array[(2, 0, 0)], 10.0);
        assert_eq!(array[(0, 0, 1)], 128.0);
        assert_eq!(array[(2, 0, 1)], 255.0);
    }

    #[test]
    fn compute_resize_scales_maps_back_to_original() {
        let (sx, sy) = compute_resize_scales((1280, 480), (640, 640)).unwrap();
        assert_eq!(sx, 2.0);
        assert_eq!(sy, 0.75);
        assert!(compute_resize_scales((0, 10), (640, 640)).is_err());
        assert!(compute_resize_scales((10, 10), (640, 0)).is_err());
    }

    #[test]
    fn list_images_filters_sorts_and_limits() {
        let dir = tempdir().unwrap();
        for name in ["c.png", "a.JPG", "b.jpeg", "notes.txt", "d.gif"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/e.png"), b"x").unwrap();

        let all = list_images(dir.path(), None).unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.JPG", "b.jpeg", "c.png"]);

        let limited = list_images(dir.path(), Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn list_images_rejects_missing_folder() {
        assert!(list_images(Path::new("no/such/folder"), None).is_err());
    }
}
