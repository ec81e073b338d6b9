use std::path::Path;

use anyhow::Result;
use image::DynamicImage;
use log::debug;

use crate::{
    landmarks::{FaceLandmarks, LandmarkSource},
    model::FaceModel,
    postprocess::{Detection, PostprocessConfig, apply_postprocess},
    preprocess::{PreparedInput, PreprocessConfig, prepare_image, prepare_path},
};
use dataprep_utils::timing_guard;

/// YuNet model bundled with its pre- and postprocessing settings.
#[derive(Debug)]
pub struct FaceDetector {
    model: FaceModel,
    preprocess: PreprocessConfig,
    postprocess: PostprocessConfig,
}

impl FaceDetector {
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        preprocess: PreprocessConfig,
        postprocess: PostprocessConfig,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = FaceModel::load(model_path, preprocess.input_size)?;
        let size = model.input_size();
        debug!(
            "Loaded {} as a {:?} graph for {}x{} input",
            model_path.display(),
            model.mode(),
            size.width,
            size.height
        );
        Ok(Self {
            model,
            preprocess,
            postprocess,
        })
    }

    /// Detect faces in an image file; coordinates are in source pixels.
    pub fn detect_path<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Detection>> {
        let _guard = timing_guard("dataprep_core::detect_path", log::Level::Debug);
        self.run(prepare_path(path, &self.preprocess)?)
    }

    pub fn detect_image(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let _guard = timing_guard("dataprep_core::detect_image", log::Level::Debug);
        self.run(prepare_image(image, &self.preprocess)?)
    }

    pub fn postprocess_config(&self) -> &PostprocessConfig {
        &self.postprocess
    }

    fn run(&self, prepared: PreparedInput) -> Result<Vec<Detection>> {
        let rows = {
            let _guard = timing_guard("dataprep_core::face_inference", log::Level::Trace);
            self.model.infer(prepared.tensor)?
        };
        Ok(apply_postprocess(
            &rows,
            prepared.scale_x,
            prepared.scale_y,
            &self.postprocess,
        ))
    }
}

impl LandmarkSource for FaceDetector {
    fn faces(&self, path: &Path) -> Result<Vec<FaceLandmarks>> {
        Ok(self
            .detect_path(path)?
            .into_iter()
            .map(|det| FaceLandmarks::from(&det))
            .collect())
    }
}
