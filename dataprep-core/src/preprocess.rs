//! Image to tensor conversion for the face model.

use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, imageops::FilterType};
use tract_onnx::prelude::Tensor;

use dataprep_utils::{
    compute_resize_scales,
    config::{InputDimensions, ResizeQuality},
    load_image, resize_image, rgb_to_bgr_chw, timing_guard,
};

/// Model input resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self::new(640, 640)
    }
}

impl From<InputDimensions> for InputSize {
    fn from(dimensions: InputDimensions) -> Self {
        Self::new(dimensions.width, dimensions.height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessConfig {
    pub input_size: InputSize,
    pub resize_quality: ResizeQuality,
}

impl PreprocessConfig {
    fn filter(&self) -> FilterType {
        match self.resize_quality {
            ResizeQuality::Quality => FilterType::Triangle,
            ResizeQuality::Speed => FilterType::Nearest,
        }
    }
}

impl From<InputDimensions> for PreprocessConfig {
    fn from(dimensions: InputDimensions) -> Self {
        Self {
            input_size: dimensions.into(),
            resize_quality: dimensions.resize_quality,
        }
    }
}

impl From<&InputDimensions> for PreprocessConfig {
    fn from(dimensions: &InputDimensions) -> Self {
        (*dimensions).into()
    }
}

/// A `[1, 3, H, W]` BGR tensor plus the factors mapping model coordinates back
/// to the source image.
#[derive(Debug)]
pub struct PreparedInput {
    pub tensor: Tensor,
    pub scale_x: f32,
    pub scale_y: f32,
    pub original_size: (u32, u32),
}

/// Resize `image` to the model input and lay it out as BGR CHW with raw 0..255 values.
pub fn prepare_image(image: &DynamicImage, config: &PreprocessConfig) -> Result<PreparedInput> {
    let _guard = timing_guard("dataprep_core::prepare_image", log::Level::Trace);
    let InputSize { width, height } = config.input_size;
    anyhow::ensure!(width > 0 && height > 0, "model input size must be non-zero");

    let original_size = image.dimensions();
    let (scale_x, scale_y) = compute_resize_scales(original_size, (width, height))?;

    let rgb = if original_size == (width, height) {
        image.to_rgb8()
    } else {
        resize_image(image, width, height, config.filter())
    };
    let chw = rgb_to_bgr_chw(&rgb);
    let data: Vec<f32> = chw.iter().copied().collect();
    let tensor = Tensor::from_shape(&[1, 3, height as usize, width as usize], &data)
        .map_err(|e| anyhow::anyhow!("failed to build input tensor: {e}"))?;

    Ok(PreparedInput {
        tensor,
        scale_x,
        scale_y,
        original_size,
    })
}

/// Load an image file and run [`prepare_image`] on it.
pub fn prepare_path<P: AsRef<Path>>(path: P, config: &PreprocessConfig) -> Result<PreparedInput> {
    let path = path.as_ref();
    let image = load_image(path)?;
    prepare_image(&image, config)
        .with_context(|| format!("failed to prepare {} for detection", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn produces_bgr_planes_and_scales() {
        let img = RgbImage::from_pixel(8, 4, Rgb([10, 20, 30]));
        let config = PreprocessConfig {
            input_size: InputSize::new(4, 2),
            resize_quality: ResizeQuality::Speed,
        };

        let prepared = prepare_image(&DynamicImage::ImageRgb8(img), &config).unwrap();
        assert_eq!(prepared.tensor.shape(), &[1, 3, 2, 4]);
        assert_eq!(prepared.original_size, (8, 4));
        assert_eq!((prepared.scale_x, prepared.scale_y), (2.0, 2.0));

        let data = prepared.tensor.as_slice::<f32>().unwrap();
        assert_eq!(data[0], 30.0);
        assert_eq!(data[8], 20.0);
        assert_eq!(data[16], 10.0);
    }

    #[test]
    fn dimensions_convert_to_config() {
        let dims = InputDimensions {
            width: 320,
            height: 240,
            resize_quality: ResizeQuality::Speed,
        };
        let config = PreprocessConfig::from(&dims);
        assert_eq!(config.input_size, InputSize::new(320, 240));
        assert_eq!(config.resize_quality, ResizeQuality::Speed);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(prepare_path("no/such/image.png", &PreprocessConfig::default()).is_err());
    }
}
