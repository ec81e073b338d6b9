//! Random pad-crop, brightness and contrast jitter for normalized digits.

use anyhow::Result;
use log::Level;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;

use dataprep_utils::{config::AugmentSettings, timing_guard};

use crate::mnist::{IMAGE_LEN, IMAGE_SIDE};

/// Applies the same random transform recipe to every sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Augmenter {
    settings: AugmentSettings,
    seed: u64,
}

impl Augmenter {
    pub fn new(settings: AugmentSettings, seed: u64) -> Self {
        let mut settings = settings;
        settings.sanitize();
        Self { settings, seed }
    }

    /// RNG for sample `index`, independent of scheduling order.
    fn rng_for(&self, index: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed.wrapping_add(index as u64))
    }

    /// Augment one flattened 28x28 image.
    pub fn augment_one<R: Rng>(
        &self,
        pixels: ArrayView1<'_, f32>,
        rng: &mut R,
    ) -> Result<Vec<f32>> {
        anyhow::ensure!(
            pixels.len() == IMAGE_LEN,
            "expected {IMAGE_LEN} pixels per image, got {}",
            pixels.len()
        );

        let pad = self.settings.padding as usize;
        let padded_side = IMAGE_SIDE + 2 * pad;
        let max_offset = padded_side - IMAGE_SIDE;
        let dy = rng.gen_range(0..=max_offset);
        let dx = rng.gen_range(0..=max_offset);

        // Crop window in padded coordinates starts at (dy, dx); pixels outside
        // the original image are the zero padding.
        let mut out = Vec::with_capacity(IMAGE_LEN);
        for y in 0..IMAGE_SIDE {
            for x in 0..IMAGE_SIDE {
                let py = y + dy;
                let px = x + dx;
                let inside = (pad..pad + IMAGE_SIDE).contains(&py)
                    && (pad..pad + IMAGE_SIDE).contains(&px);
                out.push(if inside {
                    pixels[(py - pad) * IMAGE_SIDE + (px - pad)]
                } else {
                    0.0
                });
            }
        }

        let delta = self.settings.max_brightness_delta;
        let brightness = rng.gen_range(-delta..=delta);
        out.iter_mut().for_each(|v| *v += brightness);

        let factor = rng.gen_range(self.settings.contrast_lower..=self.settings.contrast_upper);
        let mean = out.iter().sum::<f32>() / out.len() as f32;
        out.iter_mut().for_each(|v| *v = (*v - mean) * factor + mean);

        Ok(out)
    }

    /// Augment every row of `images` once, in parallel, keeping row order.
    pub fn augment_all(&self, images: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let _guard = timing_guard("dataprep_core::augment_all", Level::Debug);
        anyhow::ensure!(
            images.ncols() == IMAGE_LEN,
            "expected {IMAGE_LEN} columns, got {}",
            images.ncols()
        );

        let rows: Vec<Vec<f32>> = (0..images.nrows())
            .into_par_iter()
            .map(|idx| {
                let mut rng = self.rng_for(idx);
                self.augment_one(images.row(idx), &mut rng)
            })
            .collect::<Result<_>>()?;

        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((images.nrows(), IMAGE_LEN), flat)?)
    }
}
