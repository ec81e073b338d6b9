//! Dataset preparation pipelines.
//!
//! Two independent preparers live here: the digit pipeline turns MNIST into
//! brace-delimited array literals, and the landmark pipeline runs a YuNet face
//! detector over an image folder and writes train/test path and landmark lists.

/// Parallel array literal formatting and parsing.
pub mod literal;
/// One-hot label encoding.
pub mod labels;
/// MNIST loading and normalization.
pub mod mnist;
/// Random pad-crop, brightness and contrast augmentation.
pub mod augment;
/// The digit preparer.
pub mod digits;
/// Seeded train/test splitting.
pub mod split;
/// ONNX model loading and raw output decoding.
pub mod model;
/// Image to tensor conversion.
pub mod preprocess;
/// Score filtering and non-maximum suppression.
pub mod postprocess;
/// Face detector combining model and processing settings.
pub mod detector;
/// The landmark preparer.
pub mod landmarks;
mod error;

pub use augment::Augmenter;
pub use detector::FaceDetector;
pub use digits::{DigitReport, prepare_digits, prepare_digits_from};
pub use error::DataError;
pub use labels::{DIGIT_CLASSES, one_hot};
pub use landmarks::{
    FaceLandmarks, LandmarkReport, LandmarkSample, LandmarkSource, format_faces, prepare_landmarks,
};
pub use literal::{ArrayOutput, FormatOptions, format_array, parse_array, write_array};
pub use mnist::{MnistData, MnistSource, MnistSplit, normalize};
pub use model::{FaceModel, GraphMode};
pub use postprocess::{BoundingBox, Detection, Landmark, PostprocessConfig, apply_postprocess};
pub use preprocess::{InputSize, PreparedInput, PreprocessConfig, prepare_image, prepare_path};
pub use split::{Split, train_test_split};
